/// Linear-interpolation sample rate converter for mono 16-bit PCM.
///
/// Used by the duplex bridge to move the lower-rate direction into and out
/// of the shared I2S clock domain. The converter is stateful: the read
/// position and the last input sample carry over between calls, so a stream
/// fed in arbitrary chunk sizes comes out without seams.

const FRAC_BITS: u32 = 32;
const ONE: u64 = 1 << FRAC_BITS;

#[derive(Debug, Clone)]
pub struct LinearResampler {
    from_rate: u32,
    to_rate: u32,
    /// Input samples advanced per output sample, 32.32 fixed point
    step: u64,
    /// Position of the next output over [last, input[0], input[1], ...]
    pos: u64,
    last: i16,
}

impl LinearResampler {
    /// Both rates must be non-zero.
    pub fn new(from_rate: u32, to_rate: u32) -> Self {
        debug_assert!(from_rate > 0 && to_rate > 0);
        Self {
            from_rate,
            to_rate,
            step: ((from_rate as u64) << FRAC_BITS) / to_rate as u64,
            pos: ONE,
            last: 0,
        }
    }

    pub fn from_rate(&self) -> u32 {
        self.from_rate
    }

    pub fn to_rate(&self) -> u32 {
        self.to_rate
    }

    /// Input samples needed for the next `outputs` output samples.
    pub fn input_for(&self, outputs: usize) -> usize {
        if outputs == 0 {
            return 0;
        }
        let end = self.pos + (outputs as u64 - 1) * self.step;
        (end >> FRAC_BITS) as usize + 1
    }

    /// Input samples lying wholly behind the next `outputs` output samples.
    /// Feeding exactly this many produces at most `outputs` samples.
    pub fn inputs_behind(&self, outputs: usize) -> usize {
        ((self.pos + outputs as u64 * self.step) >> FRAC_BITS) as usize
    }

    /// Convert `input`, writing into `output`. Returns the number of samples
    /// written. Samples that do not fit in `output` are lost; size it with
    /// [`input_for`](Self::input_for).
    pub fn process(&mut self, input: &[i16], output: &mut [i16]) -> usize {
        let n = input.len();
        if n == 0 {
            return 0;
        }

        let mut written = 0;
        loop {
            let i = (self.pos >> FRAC_BITS) as usize;
            if i + 1 > n {
                break;
            }
            let a = if i == 0 { self.last } else { input[i - 1] } as i64;
            let b = input[i] as i64;
            let frac = (self.pos & (ONE - 1)) as i64;
            let sample = a + (((b - a) * frac) >> FRAC_BITS);

            if written < output.len() {
                output[written] = sample as i16;
                written += 1;
            }
            self.pos += self.step;
        }

        self.pos -= (n as u64) << FRAC_BITS;
        self.last = input[n - 1];
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downsample_yields_two_thirds() {
        let mut r = LinearResampler::new(24_000, 16_000);
        let input = [1000i16; 480];
        let mut out = [0i16; 400];
        let n = r.process(&input, &mut out);
        assert_eq!(n, 320);
        assert!(out[..n].iter().all(|&s| s == 1000));
    }

    #[test]
    fn chunked_stream_matches_single_pass() {
        let input: Vec<i16> = (0..600).map(|i| (i * 7 % 2000) as i16 - 1000).collect();

        let mut whole = LinearResampler::new(24_000, 16_000);
        let mut expected = vec![0i16; 500];
        let n = whole.process(&input, &mut expected);
        expected.truncate(n);

        let mut chunked = LinearResampler::new(24_000, 16_000);
        let mut got = Vec::new();
        for chunk in input.chunks(37) {
            let mut buf = [0i16; 40];
            let k = chunked.process(chunk, &mut buf);
            got.extend_from_slice(&buf[..k]);
        }
        assert_eq!(got, expected);
    }

    #[test]
    fn upsample_yields_three_halves() {
        let mut r = LinearResampler::new(16_000, 24_000);
        let input = [-500i16; 320];
        let mut out = [0i16; 500];
        let n = r.process(&input, &mut out);
        // Output lags by one interpolation interval at the chunk edge
        assert!((478..=480).contains(&n));
        assert!(out[..n].iter().all(|&s| s == -500));
    }

    #[test]
    fn interpolates_between_samples() {
        let mut r = LinearResampler::new(24_000, 16_000);
        let input = [0i16, 300, 600, 900];
        let mut out = [0i16; 4];
        let n = r.process(&input, &mut out);
        // Positions 1.0 and 2.5 over [last=0, 0, 300, 600, 900]
        assert_eq!(&out[..n], &[0, 450]);
    }

    #[test]
    fn input_for_matches_process() {
        let mut r = LinearResampler::new(24_000, 16_000);
        for wanted in [1usize, 2, 5, 160, 161] {
            let need = r.input_for(wanted);
            let input = vec![1i16; need];
            let mut out = vec![0i16; wanted + 2];
            assert_eq!(r.process(&input, &mut out), wanted);
        }
    }

    #[test]
    fn inputs_behind_never_overshoots() {
        for (from, to) in [(16_000, 24_000), (24_000, 16_000)] {
            let mut r = LinearResampler::new(from, to);
            r.process(&[5i16; 17], &mut [0i16; 40]);
            for outputs in 0..30 {
                let m = r.inputs_behind(outputs);
                let mut copy = r.clone();
                let mut out = [0i16; 64];
                let n = copy.process(&vec![5i16; m], &mut out);
                assert!(n <= outputs, "{} -> {}: {} inputs gave {}", from, to, m, n);
                // Never more than one interval short
                assert!(n + 1 >= outputs, "{} -> {}: {} inputs gave {}", from, to, m, n);
            }
        }
    }

    #[test]
    fn empty_input_keeps_state() {
        let mut r = LinearResampler::new(24_000, 16_000);
        let mut out = [0i16; 4];
        assert_eq!(r.process(&[], &mut out), 0);
        assert_eq!(r.input_for(1), 2);
    }
}
