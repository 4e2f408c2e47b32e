//! VAG (PlayStation ADPCM) line decoder.
//!
//! A line is 16 bytes: a header byte (low nibble shift, high nibble
//! predictor), a flag byte, then 14 bytes holding 28 signed 4-bit residuals,
//! low nibble first.

pub const LINE_SIZE: usize = 0x10;
pub const SAMPLES_IN_LINE: usize = 28;

/// Flag byte value marking the end of the stream data.
const END_MARKER: u8 = 7;

const COEFFICIENTS: [[f64; 2]; 5] = [
    [0.0, 0.0],
    [60.0 / 64.0, 0.0],
    [115.0 / 64.0, -52.0 / 64.0],
    [98.0 / 64.0, -55.0 / 64.0],
    [122.0 / 64.0, -60.0 / 64.0],
];

/// Outcome of decoding one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Samples,
    /// The line carried the end marker; its output is silence.
    End,
}

/// Predictor history for one channel.
#[derive(Debug, Clone, Default)]
pub struct VagDecoder {
    s_1: f64,
    s_2: f64,
}

#[inline]
fn quantize(sample: f64) -> i16 {
    (sample + 0.5).floor().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

impl VagDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset_state(&mut self) {
        self.s_1 = 0.0;
        self.s_2 = 0.0;
    }

    /// Decode one line into `out[..SAMPLES_IN_LINE]`.
    pub fn decode_line(&mut self, line: &[u8], out: &mut [i16]) -> Line {
        let out = &mut out[..SAMPLES_IN_LINE];
        let shift = line[0] & 0x0f;
        let predictor = (line[0] >> 4) as usize;

        if line[1] == END_MARKER {
            out.fill(0);
            return Line::End;
        }

        let [f0, f1] = COEFFICIENTS.get(predictor).copied().unwrap_or(COEFFICIENTS[0]);

        for (i, &d) in line[2..LINE_SIZE].iter().enumerate() {
            let lo = ((d & 0x0f) as i16) << 12;
            let hi = ((d & 0xf0) as i16) << 8;
            for (j, residual) in [lo >> shift, hi >> shift].into_iter().enumerate() {
                let sample = residual as f64 + self.s_1 * f0 + self.s_2 * f1;
                self.s_2 = self.s_1;
                self.s_1 = sample;
                out[i * 2 + j] = quantize(sample);
            }
        }

        Line::Samples
    }

    /// Decode whole lines from `input` into `out`, stopping after an end
    /// marker. Returns the number of lines consumed (including the marker).
    pub fn decode(&mut self, input: &[u8], out: &mut [i16]) -> usize {
        let mut lines = 0;
        for (line, samples) in input
            .chunks_exact(LINE_SIZE)
            .zip(out.chunks_exact_mut(SAMPLES_IN_LINE))
        {
            lines += 1;
            if self.decode_line(line, samples) == Line::End {
                break;
            }
        }
        lines
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a line from a header byte and 28 nibbles.
    pub(crate) fn make_line(shift: u8, predictor: u8, nibbles: &[u8; SAMPLES_IN_LINE]) -> [u8; LINE_SIZE] {
        let mut line = [0u8; LINE_SIZE];
        line[0] = (predictor << 4) | (shift & 0x0f);
        for i in 0..14 {
            line[2 + i] = (nibbles[i * 2] & 0x0f) | (nibbles[i * 2 + 1] << 4);
        }
        line
    }

    #[test]
    fn test_zero_predictor_dequantizes() {
        let mut nibbles = [0u8; SAMPLES_IN_LINE];
        for (i, n) in nibbles.iter_mut().enumerate() {
            *n = (i % 16) as u8;
        }
        let line = make_line(0, 0, &nibbles);
        let mut out = [0i16; SAMPLES_IN_LINE];
        let mut dec = VagDecoder::new();
        assert_eq!(dec.decode_line(&line, &mut out), Line::Samples);

        for (i, &s) in out.iter().enumerate() {
            let n = (i % 16) as i16;
            let signed = if n >= 8 { n - 16 } else { n };
            assert_eq!(s as i32, signed as i32 * 4096, "sample {}", i);
        }
    }

    #[test]
    fn test_shift_scales_residual() {
        let mut nibbles = [0u8; SAMPLES_IN_LINE];
        nibbles[0] = 1;
        nibbles[1] = 0xf;
        let line = make_line(4, 0, &nibbles);
        let mut out = [0i16; SAMPLES_IN_LINE];
        VagDecoder::new().decode_line(&line, &mut out);
        assert_eq!(out[0], 256);
        assert_eq!(out[1], -256);
        assert_eq!(out[2], 0);
    }

    #[test]
    fn test_predictor_one_decays() {
        let mut nibbles = [0u8; SAMPLES_IN_LINE];
        nibbles[0] = 4;
        let line = make_line(0, 1, &nibbles);
        let mut out = [0i16; SAMPLES_IN_LINE];
        VagDecoder::new().decode_line(&line, &mut out);
        assert_eq!(&out[..3], &[16384, 15360, 14400]);
    }

    #[test]
    fn test_history_carries_across_lines() {
        let mut first = [0u8; SAMPLES_IN_LINE];
        first[SAMPLES_IN_LINE - 1] = 4;
        let zeros = [0u8; SAMPLES_IN_LINE];
        let mut dec = VagDecoder::new();
        let mut out = [0i16; SAMPLES_IN_LINE];
        dec.decode_line(&make_line(0, 0, &first), &mut out);
        assert_eq!(out[SAMPLES_IN_LINE - 1], 16384);

        dec.decode_line(&make_line(0, 1, &zeros), &mut out);
        assert_eq!(out[0], 15360);

        dec.reset_state();
        dec.decode_line(&make_line(0, 1, &zeros), &mut out);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn test_quantize_rounds_and_clamps() {
        assert_eq!(quantize(1.5), 2);
        assert_eq!(quantize(1.49), 1);
        assert_eq!(quantize(-1.5), -1);
        assert_eq!(quantize(40000.0), i16::MAX);
        assert_eq!(quantize(-40000.0), i16::MIN);
    }

    #[test]
    fn test_out_of_range_predictor_uses_zero() {
        let mut nibbles = [0u8; SAMPLES_IN_LINE];
        nibbles[0] = 4;
        let line = make_line(0, 9, &nibbles);
        let mut out = [0i16; SAMPLES_IN_LINE];
        VagDecoder::new().decode_line(&line, &mut out);
        assert_eq!(out[0], 16384);
        assert_eq!(out[1], 0);
    }

    #[test]
    fn test_end_marker_stops() {
        let mut nibbles = [0u8; SAMPLES_IN_LINE];
        nibbles.fill(1);
        let data = make_line(0, 0, &nibbles);
        let mut end = make_line(0, 0, &nibbles);
        end[1] = 7;

        let mut input = Vec::new();
        input.extend_from_slice(&data);
        input.extend_from_slice(&end);
        input.extend_from_slice(&data);

        let mut out = [-1i16; SAMPLES_IN_LINE * 3];
        let lines = VagDecoder::new().decode(&input, &mut out);
        assert_eq!(lines, 2);
        assert!(out[..SAMPLES_IN_LINE].iter().all(|&s| s == 4096));
        assert!(out[SAMPLES_IN_LINE..SAMPLES_IN_LINE * 2].iter().all(|&s| s == 0));
        assert!(out[SAMPLES_IN_LINE * 2..].iter().all(|&s| s == -1));
    }
}
