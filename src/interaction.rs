/// Button gesture → session command mapping.
///
/// Push-to-talk: holding the button listens, releasing it stops. A click
/// requests configuration mode, but only while the device is still starting
/// up, so a running device cannot be knocked into provisioning by accident.
///
/// The controller keeps no state of its own. Lifecycle state is read from the
/// host and listening state is driven in the host.
use crate::button::ButtonGesture;

/// Device lifecycle, owned by the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Unknown,
    Starting,
    WifiConfiguring,
    Idle,
    Connecting,
    Listening,
    Speaking,
    Upgrading,
    Activating,
    FatalError,
}

impl DeviceState {
    pub const fn name(self) -> &'static str {
        match self {
            DeviceState::Unknown => "unknown",
            DeviceState::Starting => "starting",
            DeviceState::WifiConfiguring => "configuring",
            DeviceState::Idle => "idle",
            DeviceState::Connecting => "connecting",
            DeviceState::Listening => "listening",
            DeviceState::Speaking => "speaking",
            DeviceState::Upgrading => "upgrading",
            DeviceState::Activating => "activating",
            DeviceState::FatalError => "fatal_error",
        }
    }

    /// Stable index, for hosts that keep the state in an atomic.
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_u8(v: u8) -> Self {
        match v {
            1 => DeviceState::Starting,
            2 => DeviceState::WifiConfiguring,
            3 => DeviceState::Idle,
            4 => DeviceState::Connecting,
            5 => DeviceState::Listening,
            6 => DeviceState::Speaking,
            7 => DeviceState::Upgrading,
            8 => DeviceState::Activating,
            9 => DeviceState::FatalError,
            _ => DeviceState::Unknown,
        }
    }
}

impl core::fmt::Display for DeviceState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

/// Host application entry points.
///
/// Called from the button polling context: implementations must only
/// enqueue or signal and return quickly.
pub trait Host {
    fn device_state(&self) -> DeviceState;
    fn start_listening(&self);
    fn stop_listening(&self);
    fn enter_config_mode(&self);
}

/// Command issued to the host for one gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCommand {
    StartListening,
    StopListening,
    EnterConfigMode,
}

impl SessionCommand {
    pub const fn name(self) -> &'static str {
        match self {
            SessionCommand::StartListening => "start_listening",
            SessionCommand::StopListening => "stop_listening",
            SessionCommand::EnterConfigMode => "enter_config_mode",
        }
    }
}

pub struct InteractionController;

impl InteractionController {
    /// Deliver one gesture. Returns the command issued, if any.
    pub fn dispatch<H: Host + ?Sized>(host: &H, gesture: ButtonGesture) -> Option<SessionCommand> {
        match gesture {
            ButtonGesture::PressDown => {
                host.start_listening();
                Some(SessionCommand::StartListening)
            }
            ButtonGesture::PressUp => {
                host.stop_listening();
                Some(SessionCommand::StopListening)
            }
            ButtonGesture::Click => {
                let state = host.device_state();
                if state == DeviceState::Starting {
                    log::info!("Click during startup, entering config mode");
                    host.enter_config_mode();
                    Some(SessionCommand::EnterConfigMode)
                } else {
                    log::debug!("Click ignored in state {}", state);
                    None
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};

    struct RecordingHost {
        state: Cell<DeviceState>,
        calls: RefCell<Vec<SessionCommand>>,
    }

    impl RecordingHost {
        fn new(state: DeviceState) -> Self {
            Self {
                state: Cell::new(state),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Host for RecordingHost {
        fn device_state(&self) -> DeviceState {
            self.state.get()
        }
        fn start_listening(&self) {
            self.calls.borrow_mut().push(SessionCommand::StartListening);
        }
        fn stop_listening(&self) {
            self.calls.borrow_mut().push(SessionCommand::StopListening);
        }
        fn enter_config_mode(&self) {
            self.calls.borrow_mut().push(SessionCommand::EnterConfigMode);
        }
    }

    #[test]
    fn push_to_talk_order() {
        let host = RecordingHost::new(DeviceState::Idle);
        InteractionController::dispatch(&host, ButtonGesture::PressDown);
        InteractionController::dispatch(&host, ButtonGesture::PressUp);
        assert_eq!(
            *host.calls.borrow(),
            vec![SessionCommand::StartListening, SessionCommand::StopListening]
        );
    }

    #[test]
    fn press_ignores_lifecycle_state() {
        let host = RecordingHost::new(DeviceState::Starting);
        assert_eq!(
            InteractionController::dispatch(&host, ButtonGesture::PressDown),
            Some(SessionCommand::StartListening)
        );
        host.state.set(DeviceState::Speaking);
        assert_eq!(
            InteractionController::dispatch(&host, ButtonGesture::PressUp),
            Some(SessionCommand::StopListening)
        );
    }

    #[test]
    fn click_while_starting_enters_config_mode_once() {
        let host = RecordingHost::new(DeviceState::Starting);
        assert_eq!(
            InteractionController::dispatch(&host, ButtonGesture::Click),
            Some(SessionCommand::EnterConfigMode)
        );
        assert_eq!(*host.calls.borrow(), vec![SessionCommand::EnterConfigMode]);
    }

    #[test]
    fn click_in_other_states_is_ignored() {
        for v in 0..=9 {
            let state = DeviceState::from_u8(v);
            if state == DeviceState::Starting {
                continue;
            }
            let host = RecordingHost::new(state);
            assert_eq!(InteractionController::dispatch(&host, ButtonGesture::Click), None);
            assert!(host.calls.borrow().is_empty(), "state {}", state);
        }
    }

    #[test]
    fn state_index_round_trips() {
        assert_eq!(DeviceState::from_u8(DeviceState::Starting.to_u8()), DeviceState::Starting);
        assert_eq!(DeviceState::from_u8(200), DeviceState::Unknown);
    }
}
