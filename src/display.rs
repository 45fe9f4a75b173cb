/// Display presence detection and the two display variants.
///
/// The OLED is an optional accessory. At first use the resolver walks the
/// candidate I2C addresses in priority order and tries a full panel bring-up
/// at each: open a control channel, create the panel driver, reset, init,
/// switch on. The first address that gets through every step wins. If none
/// does, the board carries on with [`NoDisplay`], which accepts every render
/// call and touches no hardware.
///
/// Handles are owned values, so a failed attempt releases whatever it
/// allocated simply by dropping it before the next address is tried.
use core::fmt::{Arguments, Debug};

use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::*;
use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
use embedded_graphics::text::{Baseline, Text};
use heapless::String;

#[cfg(feature = "board-esp32c3-inmp441")]
use crate::board;

// ── Panel configuration ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PanelConfig {
    pub width: u16,
    pub height: u16,
    pub mirror_x: bool,
    pub mirror_y: bool,
}

impl PanelConfig {
    #[cfg(feature = "board-esp32c3-inmp441")]
    pub const fn for_board() -> Self {
        Self {
            width: board::DISPLAY_WIDTH,
            height: board::DISPLAY_HEIGHT,
            mirror_x: board::DISPLAY_MIRROR_X,
            mirror_y: board::DISPLAY_MIRROR_Y,
        }
    }
}

// ── Hardware seams ───────────────────────────────────────────────────

/// A panel driver bound to one control channel.
pub trait PanelDriver {
    type Error: Debug;

    fn reset(&mut self) -> Result<(), Self::Error>;
    fn init(&mut self) -> Result<(), Self::Error>;
    fn set_display_on(&mut self, on: bool) -> Result<(), Self::Error>;
    fn set_mirror(&mut self, mirror_x: bool, mirror_y: bool) -> Result<(), Self::Error>;
    /// Push the drawn frame to the panel.
    fn flush(&mut self) -> Result<(), Self::Error>;
}

/// Access to the shared control bus for panel bring-up.
///
/// Owns the bus once it has been opened, so probing cannot start before the
/// bus exists, and lends it to one candidate at a time.
pub trait PanelProbe {
    /// Control channel to one device address.
    type Io;
    type Panel: PanelDriver + DrawTarget<Color = BinaryColor>;
    type Error: Debug;

    fn open_io(&mut self, address: u8) -> Result<Self::Io, Self::Error>;

    /// Create the panel driver for `config`'s geometry. The channel is
    /// consumed, and released if this fails. A geometry the driver cannot
    /// handle is an error.
    fn new_panel(&mut self, io: Self::Io, config: &PanelConfig) -> Result<Self::Panel, Self::Error>;
}

/// Bring-up step at which a candidate address failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStage {
    OpenIo,
    NewPanel,
    Reset,
    Init,
    DisplayOn,
}

impl ProbeStage {
    pub const fn name(self) -> &'static str {
        match self {
            ProbeStage::OpenIo => "open panel io",
            ProbeStage::NewPanel => "create panel",
            ProbeStage::Reset => "reset",
            ProbeStage::Init => "init",
            ProbeStage::DisplayOn => "display on",
        }
    }
}

// ── Resolver ─────────────────────────────────────────────────────────

/// Probe `addresses` in order and return the first panel that comes up,
/// or the no-op display when none does.
pub fn resolve<P: PanelProbe>(
    probe: &mut P,
    addresses: &[u8],
    config: &PanelConfig,
) -> DisplayHandle<P::Panel> {
    for &address in addresses {
        log::info!("Trying OLED at I2C address 0x{:02X}", address);
        match bring_up(probe, address, config) {
            Ok(panel) => {
                log::info!("OLED initialized at address 0x{:02X}", address);
                return DisplayHandle::Panel(OledDisplay::new(panel, address, config));
            }
            Err(stage) => {
                log::info!("OLED at 0x{:02X}: {} failed", address, stage.name());
            }
        }
    }

    log::info!("OLED not found, continuing without display");
    DisplayHandle::None(NoDisplay)
}

fn bring_up<P: PanelProbe>(
    probe: &mut P,
    address: u8,
    config: &PanelConfig,
) -> Result<P::Panel, ProbeStage> {
    let io = probe.open_io(address).map_err(|e| {
        log::debug!("open io 0x{:02X}: {:?}", address, e);
        ProbeStage::OpenIo
    })?;

    let mut panel = probe.new_panel(io, config).map_err(|e| {
        log::debug!("new panel 0x{:02X}: {:?}", address, e);
        ProbeStage::NewPanel
    })?;

    // On any error below `panel` drops here, releasing panel and channel
    panel.reset().map_err(|_| ProbeStage::Reset)?;
    panel.init().map_err(|_| ProbeStage::Init)?;
    panel.set_display_on(true).map_err(|_| ProbeStage::DisplayOn)?;

    Ok(panel)
}

// ── Display capability ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Assistant,
    System,
}

/// Render calls the host application makes. Rendering never fails from the
/// caller's point of view.
pub trait Display {
    fn width(&self) -> u16;
    fn height(&self) -> u16;
    fn set_status(&mut self, status: &str);
    fn show_notification(&mut self, text: &str);
    fn set_emotion(&mut self, emotion: &str);
    fn set_chat_message(&mut self, role: ChatRole, content: &str);
}

/// Resolved display: a working panel or nothing.
pub enum DisplayHandle<P> {
    Panel(OledDisplay<P>),
    None(NoDisplay),
}

impl<P> DisplayHandle<P> {
    pub fn is_present(&self) -> bool {
        matches!(self, DisplayHandle::Panel(_))
    }

    /// Bus address of the panel, if one was found.
    pub fn address(&self) -> Option<u8> {
        match self {
            DisplayHandle::Panel(oled) => Some(oled.address()),
            DisplayHandle::None(_) => None,
        }
    }
}

impl<P> Display for DisplayHandle<P>
where
    P: PanelDriver + DrawTarget<Color = BinaryColor>,
{
    fn width(&self) -> u16 {
        match self {
            DisplayHandle::Panel(d) => d.width(),
            DisplayHandle::None(d) => d.width(),
        }
    }

    fn height(&self) -> u16 {
        match self {
            DisplayHandle::Panel(d) => d.height(),
            DisplayHandle::None(d) => d.height(),
        }
    }

    fn set_status(&mut self, status: &str) {
        match self {
            DisplayHandle::Panel(d) => d.set_status(status),
            DisplayHandle::None(d) => d.set_status(status),
        }
    }

    fn show_notification(&mut self, text: &str) {
        match self {
            DisplayHandle::Panel(d) => d.show_notification(text),
            DisplayHandle::None(d) => d.show_notification(text),
        }
    }

    fn set_emotion(&mut self, emotion: &str) {
        match self {
            DisplayHandle::Panel(d) => d.set_emotion(emotion),
            DisplayHandle::None(d) => d.set_emotion(emotion),
        }
    }

    fn set_chat_message(&mut self, role: ChatRole, content: &str) {
        match self {
            DisplayHandle::Panel(d) => d.set_chat_message(role, content),
            DisplayHandle::None(d) => d.set_chat_message(role, content),
        }
    }
}

/// Stand-in when no panel answered.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NoDisplay;

impl Display for NoDisplay {
    fn width(&self) -> u16 {
        0
    }
    fn height(&self) -> u16 {
        0
    }
    fn set_status(&mut self, _status: &str) {}
    fn show_notification(&mut self, _text: &str) {}
    fn set_emotion(&mut self, _emotion: &str) {}
    fn set_chat_message(&mut self, _role: ChatRole, _content: &str) {}
}

// ── OLED status screen ───────────────────────────────────────────────

const CHAR_W: i32 = 6;
const ROW_H: i32 = 10;
const HEADER_H: i32 = 12;

type StatusText = String<24>;
type MessageText = String<128>;

struct Screen<'a, D> {
    display: &'a mut D,
    width: i32,
    y: i32,
    buf: String<40>,
}

impl<'a, D: DrawTarget<Color = BinaryColor>> Screen<'a, D> {
    fn new(display: &'a mut D, width: i32) -> Self {
        Self {
            display,
            width,
            y: 0,
            buf: String::new(),
        }
    }

    fn clear(&mut self) {
        let _ = self.display.clear(BinaryColor::Off);
        self.y = 0;
    }

    fn skip(&mut self, pixels: i32) {
        self.y += pixels;
    }

    fn header(&mut self, title_args: Arguments<'_>, indicator: &str) {
        let _ = Rectangle::new(Point::new(0, self.y), Size::new(self.width as u32, HEADER_H as u32))
            .into_styled(PrimitiveStyle::with_fill(BinaryColor::On))
            .draw(self.display);

        self.buf.clear();
        let _ = core::fmt::write(&mut self.buf, title_args);
        self.emit(BinaryColor::Off, BinaryColor::On, 1);

        if !indicator.is_empty() {
            let x = self.width - indicator.chars().count() as i32 * CHAR_W - 1;
            let _ = Text::with_baseline(
                indicator,
                Point::new(x, self.y + 1),
                Self::text_style(BinaryColor::Off, BinaryColor::On),
                Baseline::Top,
            )
            .draw(self.display);
        }
        self.y += HEADER_H;
    }

    fn row(&mut self, args: Arguments<'_>) {
        self.buf.clear();
        let _ = core::fmt::write(&mut self.buf, args);
        self.emit(BinaryColor::On, BinaryColor::Off, 0);
        self.y += ROW_H;
    }

    fn centered(&mut self, args: Arguments<'_>) {
        self.buf.clear();
        let _ = core::fmt::write(&mut self.buf, args);
        let x = (self.width - self.buf.chars().count() as i32 * CHAR_W) / 2;
        self.emit(BinaryColor::On, BinaryColor::Off, x.max(0));
        self.y += ROW_H;
    }

    fn emit(&mut self, fg: BinaryColor, bg: BinaryColor, x: i32) {
        let _ = Text::with_baseline(
            &self.buf,
            Point::new(x, self.y + 1),
            Self::text_style(fg, bg),
            Baseline::Top,
        )
        .draw(self.display);
    }

    fn text_style(fg: BinaryColor, bg: BinaryColor) -> MonoTextStyle<'static, BinaryColor> {
        MonoTextStyleBuilder::new()
            .font(&FONT_6X10)
            .text_color(fg)
            .background_color(bg)
            .build()
    }
}

macro_rules! row {
    ($s:expr, $($arg:tt)*) => {
        $s.row(format_args!($($arg)*))
    };
}

macro_rules! centered {
    ($s:expr, $($arg:tt)*) => {
        $s.centered(format_args!($($arg)*))
    };
}

/// Monochrome status screen on a working panel.
///
/// Layout: an inverted header with the status (or the latest notification)
/// on the left and the emotion on the right, then the chat message
/// word-wrapped below.
pub struct OledDisplay<P> {
    panel: P,
    address: u8,
    width: u16,
    height: u16,
    status: StatusText,
    notification: Option<StatusText>,
    emotion: String<12>,
    message: MessageText,
    role: ChatRole,
}

impl<P> OledDisplay<P> {
    pub fn address(&self) -> u8 {
        self.address
    }
}

impl<P> OledDisplay<P>
where
    P: PanelDriver + DrawTarget<Color = BinaryColor>,
{
    pub fn new(mut panel: P, address: u8, config: &PanelConfig) -> Self {
        if config.mirror_x || config.mirror_y {
            if let Err(e) = panel.set_mirror(config.mirror_x, config.mirror_y) {
                log::warn!("OLED mirror setup failed: {:?}", e);
            }
        }

        let mut oled = Self {
            panel,
            address,
            width: config.width,
            height: config.height,
            status: StatusText::new(),
            notification: None,
            emotion: String::new(),
            message: MessageText::new(),
            role: ChatRole::System,
        };
        let _ = oled.status.push_str("Starting");
        oled.render();
        oled
    }

    fn cols(&self) -> usize {
        (self.width as i32 / CHAR_W) as usize
    }

    fn render(&mut self) {
        let cols = self.cols();
        let width = self.width as i32;
        let rows = ((self.height as i32 - HEADER_H - 2) / ROW_H).max(0) as usize;
        let title = self.notification.as_ref().unwrap_or(&self.status);

        let mut s = Screen::new(&mut self.panel, width);
        s.clear();
        s.header(format_args!("{}", title), &self.emotion);
        s.skip(2);

        if self.message.is_empty() {
            s.skip(ROW_H);
            centered!(s, "{}", self.emotion);
        } else {
            let prefix = if self.role == ChatRole::User { "> " } else { "" };
            let mut line = MessageText::new();
            let _ = line.push_str(prefix);
            push_truncated(&mut line, &self.message);
            for part in wrap(&line, cols).into_iter().take(rows) {
                row!(s, "{}", part);
            }
        }

        if let Err(e) = self.panel.flush() {
            log::warn!("OLED flush failed: {:?}", e);
        }
    }
}

impl<P> Display for OledDisplay<P>
where
    P: PanelDriver + DrawTarget<Color = BinaryColor>,
{
    fn width(&self) -> u16 {
        self.width
    }

    fn height(&self) -> u16 {
        self.height
    }

    fn set_status(&mut self, status: &str) {
        self.notification = None;
        self.status.clear();
        push_truncated(&mut self.status, status);
        self.render();
    }

    fn show_notification(&mut self, text: &str) {
        let mut n = StatusText::new();
        push_truncated(&mut n, text);
        self.notification = Some(n);
        self.render();
    }

    fn set_emotion(&mut self, emotion: &str) {
        self.emotion.clear();
        push_truncated(&mut self.emotion, emotion);
        self.render();
    }

    fn set_chat_message(&mut self, role: ChatRole, content: &str) {
        self.role = role;
        self.message.clear();
        push_truncated(&mut self.message, content);
        self.render();
    }
}

/// Copy as much of `src` as fits, never splitting a character.
fn push_truncated<const N: usize>(dst: &mut String<N>, src: &str) {
    for c in src.chars() {
        if dst.push(c).is_err() {
            break;
        }
    }
}

/// Greedy word wrap to `cols` characters. Words longer than a line are split.
pub(crate) fn wrap(text: &str, cols: usize) -> heapless::Vec<&str, 16> {
    let mut lines = heapless::Vec::new();
    if cols == 0 {
        return lines;
    }

    let mut rest = text.trim();
    while !rest.is_empty() {
        let mut end = rest.len();
        let mut last_space = None;
        for (count, (idx, c)) in rest.char_indices().enumerate() {
            if count == cols {
                end = idx;
                break;
            }
            if c == ' ' {
                last_space = Some(idx);
            }
        }

        let cut = if end < rest.len() {
            match last_space {
                Some(sp) if sp > 0 && !rest[end..].starts_with(' ') => sp,
                _ => end,
            }
        } else {
            end
        };

        if lines.push(rest[..cut].trim_end()).is_err() {
            break;
        }
        rest = rest[cut..].trim_start();
    }
    lines
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use core::convert::Infallible;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Shared fake I2C bus: which addresses answer, and at which stage a
    /// responding device fails.
    #[derive(Default)]
    pub(crate) struct FakeBus {
        /// (address, stage at which bring-up fails)
        pub failures: RefCell<Vec<(u8, ProbeStage)>>,
        /// Addresses with no device at all
        pub absent: RefCell<Vec<u8>>,
        pub attempts: RefCell<Vec<u8>>,
        /// Control channels and panels currently alive
        pub open_handles: Cell<i32>,
        /// Bus transactions issued by panels
        pub traffic: Cell<u32>,
        pub flushes: Cell<u32>,
    }

    impl FakeBus {
        fn fails_at(&self, address: u8, stage: ProbeStage) -> bool {
            self.failures.borrow().contains(&(address, stage))
        }
    }

    pub(crate) struct FakeProbe {
        pub bus: Rc<FakeBus>,
    }

    pub(crate) struct FakeIo {
        bus: Rc<FakeBus>,
        address: u8,
    }

    impl Drop for FakeIo {
        fn drop(&mut self) {
            self.bus.open_handles.set(self.bus.open_handles.get() - 1);
        }
    }

    pub(crate) struct FakePanel {
        io: FakeIo,
        size: Size,
        pub mirror: Option<(bool, bool)>,
        pub pixels_on: usize,
        /// Lowest row drawn to
        pub max_y: i32,
    }

    impl PanelProbe for FakeProbe {
        type Io = FakeIo;
        type Panel = FakePanel;
        type Error = &'static str;

        fn open_io(&mut self, address: u8) -> Result<FakeIo, &'static str> {
            self.bus.attempts.borrow_mut().push(address);
            // A leaked handle from an earlier attempt keeps the bus busy
            if self.bus.open_handles.get() != 0 {
                return Err("bus busy");
            }
            if self.bus.fails_at(address, ProbeStage::OpenIo) {
                return Err("io alloc");
            }
            self.bus.open_handles.set(self.bus.open_handles.get() + 1);
            Ok(FakeIo {
                bus: self.bus.clone(),
                address,
            })
        }

        fn new_panel(&mut self, io: FakeIo, config: &PanelConfig) -> Result<FakePanel, &'static str> {
            if self.bus.fails_at(io.address, ProbeStage::NewPanel) {
                return Err("panel alloc");
            }
            // SSD1306 geometries
            if !matches!((config.width, config.height), (128, 64) | (128, 32) | (96, 16)) {
                return Err("unsupported geometry");
            }
            Ok(FakePanel {
                io,
                size: Size::new(config.width as u32, config.height as u32),
                mirror: None,
                pixels_on: 0,
                max_y: -1,
            })
        }
    }

    impl FakePanel {
        fn transact(&mut self, stage: ProbeStage) -> Result<(), &'static str> {
            let bus = &self.io.bus;
            bus.traffic.set(bus.traffic.get() + 1);
            if bus.absent.borrow().contains(&self.io.address) || bus.fails_at(self.io.address, stage) {
                Err("nack")
            } else {
                Ok(())
            }
        }
    }

    impl PanelDriver for FakePanel {
        type Error = &'static str;

        fn reset(&mut self) -> Result<(), &'static str> {
            self.transact(ProbeStage::Reset)
        }
        fn init(&mut self) -> Result<(), &'static str> {
            self.transact(ProbeStage::Init)
        }
        fn set_display_on(&mut self, _on: bool) -> Result<(), &'static str> {
            self.transact(ProbeStage::DisplayOn)
        }
        fn set_mirror(&mut self, x: bool, y: bool) -> Result<(), &'static str> {
            self.mirror = Some((x, y));
            Ok(())
        }
        fn flush(&mut self) -> Result<(), &'static str> {
            let bus = &self.io.bus;
            bus.flushes.set(bus.flushes.get() + 1);
            bus.traffic.set(bus.traffic.get() + 1);
            Ok(())
        }
    }

    impl OriginDimensions for FakePanel {
        fn size(&self) -> Size {
            self.size
        }
    }

    impl DrawTarget for FakePanel {
        type Color = BinaryColor;
        type Error = Infallible;

        fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Infallible>
        where
            I: IntoIterator<Item = Pixel<BinaryColor>>,
        {
            for Pixel(point, color) in pixels {
                if color.is_on() {
                    self.pixels_on += 1;
                    self.max_y = self.max_y.max(point.y);
                }
            }
            Ok(())
        }
    }

    fn probe() -> FakeProbe {
        FakeProbe {
            bus: Rc::new(FakeBus::default()),
        }
    }

    const A: u8 = 0x3C;
    const B: u8 = 0x3D;

    fn panel_of(d: &DisplayHandle<FakePanel>) -> &FakePanel {
        match d {
            DisplayHandle::Panel(oled) => &oled.panel,
            DisplayHandle::None(_) => panic!("expected panel"),
        }
    }

    #[test]
    fn first_responding_address_wins() {
        let mut p = probe();
        let d = resolve(&mut p, &[A, B], &PanelConfig::for_board());
        assert_eq!(d.address(), Some(A));
        assert_eq!(*p.bus.attempts.borrow(), vec![A]);
    }

    #[test]
    fn falls_through_to_second_address() {
        let mut p = probe();
        p.bus.absent.borrow_mut().push(A);
        let d = resolve(&mut p, &[A, B], &PanelConfig::for_board());
        assert!(d.is_present());
        assert_eq!(d.address(), Some(B));
        assert_eq!(*p.bus.attempts.borrow(), vec![A, B]);
    }

    #[test]
    fn failed_bring_up_releases_handles() {
        for stage in [ProbeStage::NewPanel, ProbeStage::Reset, ProbeStage::Init, ProbeStage::DisplayOn] {
            let mut p = probe();
            p.bus.failures.borrow_mut().push((A, stage));
            let d = resolve(&mut p, &[A, B], &PanelConfig::for_board());
            assert_eq!(d.address(), Some(B), "after {:?}", stage);
            // Only the winning panel's channel is still open
            assert_eq!(p.bus.open_handles.get(), 1);
        }
    }

    #[test]
    fn no_candidate_gives_silent_display() {
        let mut p = probe();
        p.bus.absent.borrow_mut().extend([A, B]);
        let mut d = resolve(&mut p, &[A, B], &PanelConfig::for_board());
        assert!(!d.is_present());
        assert_eq!(d.address(), None);
        assert_eq!(p.bus.open_handles.get(), 0);

        let traffic = p.bus.traffic.get();
        d.set_status("Listening");
        d.show_notification("Volume 70");
        d.set_emotion("happy");
        d.set_chat_message(ChatRole::Assistant, "hello");
        assert_eq!(p.bus.traffic.get(), traffic);
        assert_eq!(d.width(), 0);
    }

    #[test]
    fn empty_candidate_list() {
        let mut p = probe();
        let d = resolve(&mut p, &[], &PanelConfig::for_board());
        assert!(!d.is_present());
        assert!(p.bus.attempts.borrow().is_empty());
    }

    #[test]
    fn panel_renders_and_flushes() {
        let mut p = probe();
        let mut d = resolve(&mut p, &[A], &PanelConfig::for_board());
        let after_init = p.bus.flushes.get();
        assert_eq!(after_init, 1);

        d.set_chat_message(ChatRole::User, "what is the weather like today");
        assert_eq!(p.bus.flushes.get(), 2);
        assert!(panel_of(&d).pixels_on > 0);
        assert_eq!(d.width(), 128);
        assert_eq!(d.height(), 64);
    }

    #[test]
    fn mirroring_applied_at_construction() {
        let mut p = probe();
        let mut cfg = PanelConfig::for_board();
        cfg.mirror_x = true;
        let d = resolve(&mut p, &[A], &cfg);
        assert_eq!(panel_of(&d).mirror, Some((true, false)));
    }

    #[test]
    fn panel_geometry_follows_config() {
        let mut p = probe();
        let cfg = PanelConfig {
            height: 32,
            ..PanelConfig::for_board()
        };
        let mut d = resolve(&mut p, &[A], &cfg);
        d.set_chat_message(ChatRole::Assistant, "a long reply that would need many more rows than fit");
        assert_eq!(d.height(), 32);
        assert_eq!(panel_of(&d).size, Size::new(128, 32));
        assert!(panel_of(&d).max_y < 32);
    }

    #[test]
    fn unsupported_geometry_leaves_no_display() {
        let mut p = probe();
        let cfg = PanelConfig {
            width: 200,
            ..PanelConfig::for_board()
        };
        let d = resolve(&mut p, &[A, B], &cfg);
        assert!(!d.is_present());
        assert_eq!(*p.bus.attempts.borrow(), vec![A, B]);
        assert_eq!(p.bus.open_handles.get(), 0);
    }

    #[test]
    fn wraps_on_word_boundaries() {
        let lines = wrap("the quick brown fox jumps over", 10);
        assert_eq!(&lines[..], &["the quick", "brown fox", "jumps over"]);
    }

    #[test]
    fn wraps_long_words() {
        let lines = wrap("abcdefghijkl", 5);
        assert_eq!(&lines[..], &["abcde", "fghij", "kl"]);
    }

    #[test]
    fn truncates_on_char_boundary() {
        let mut s = String::<4>::new();
        push_truncated(&mut s, "héllo");
        assert_eq!(s.as_str(), "hél");
    }
}
