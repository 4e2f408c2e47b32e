//! `.vb` stream files: headerless VAG data in 0x2000-byte blocks.
//!
//! Block `b` of a file with `c` channels starts at `b * c * 0x2000` and holds
//! one 0x2000-byte chunk per channel, back to back. A trailing partial block
//! is ignored.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use tracing::warn;

use crate::decoder::{Decoder, SAMPLE_SIZE};
use crate::error::DecoderError;
use crate::vag::{Line, VagDecoder, LINE_SIZE, SAMPLES_IN_LINE};

pub const BLOCK_SIZE: usize = 0x2000;
pub const LINES_IN_BLOCK: usize = BLOCK_SIZE / LINE_SIZE;
pub const SAMPLES_IN_BLOCK: usize = LINES_IN_BLOCK * SAMPLES_IN_LINE;

pub const DEFAULT_SAMPLE_RATE: u32 = 32000;
pub const DEFAULT_CHANNELS: u32 = 2;

struct Channel {
    decoder: VagDecoder,
    block: Vec<u8>,
}

pub struct VbFile {
    file: Option<File>,
    channels: Vec<Channel>,
    sample_rate: u32,
    num_blocks: u64,
    current_block: u64,
    line_in_block: usize,
    block_loaded: bool,
}

impl VbFile {
    pub fn open(path: impl AsRef<Path>) -> Self {
        Self::with_format(path, DEFAULT_SAMPLE_RATE, DEFAULT_CHANNELS)
    }

    /// The format carries no header, so rate and channel count come from
    /// the caller.
    pub fn with_format(path: impl AsRef<Path>, sample_rate: u32, channels: u32) -> Self {
        let path = path.as_ref();
        let mut vb = Self {
            file: None,
            channels: Vec::new(),
            sample_rate,
            num_blocks: 0,
            current_block: 0,
            line_in_block: 0,
            block_loaded: false,
        };

        match Self::open_file(path, channels) {
            Ok((file, num_blocks)) => {
                vb.file = Some(file);
                vb.num_blocks = num_blocks;
                vb.channels = (0..channels)
                    .map(|_| Channel {
                        decoder: VagDecoder::new(),
                        block: vec![0; BLOCK_SIZE],
                    })
                    .collect();
            }
            Err(e) => warn!("could not open {}: {}", path.display(), e),
        }
        vb
    }

    fn open_file(path: &Path, channels: u32) -> Result<(File, u64), DecoderError> {
        if channels == 0 {
            return Err(DecoderError::Unsupported("zero channels".into()));
        }
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        let num_blocks = size / (channels as u64 * BLOCK_SIZE as u64);
        Ok((file, num_blocks))
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    fn read_block(&mut self, block: u64) -> Result<(), DecoderError> {
        let Some(file) = self.file.as_mut() else {
            return Err(DecoderError::MissingFormat("file handle"));
        };
        let offset = block * self.channels.len() as u64 * BLOCK_SIZE as u64;
        file.seek(SeekFrom::Start(offset))?;
        for channel in &mut self.channels {
            file.read_exact(&mut channel.block)?;
        }
        self.block_loaded = true;
        Ok(())
    }

    fn ensure_block(&mut self) -> bool {
        if self.block_loaded {
            return true;
        }
        match self.read_block(self.current_block) {
            Ok(()) => true,
            Err(e) => {
                warn!("vb block {} read failed: {}", self.current_block, e);
                false
            }
        }
    }

    fn remaining_lines(&self) -> usize {
        let blocks = self.num_blocks.saturating_sub(self.current_block) as usize;
        (blocks * LINES_IN_BLOCK).saturating_sub(self.line_in_block)
    }
}

impl Decoder for VbFile {
    fn is_opened(&self) -> bool {
        self.file.is_some()
    }

    fn sample_count(&self) -> u64 {
        if !self.is_opened() {
            return 0;
        }
        self.num_blocks * SAMPLES_IN_BLOCK as u64
    }

    fn sample_rate(&self) -> u32 {
        if !self.is_opened() {
            return 0;
        }
        self.sample_rate
    }

    fn channels(&self) -> u32 {
        self.channels.len() as u32
    }

    /// Snaps to the start of the containing block. Positions past the end
    /// rewind to the start of the file.
    fn seek(&mut self, milliseconds: u32) {
        if !self.is_opened() {
            return;
        }
        let mut block = self.ms_to_samples(milliseconds) / SAMPLES_IN_BLOCK as u64;
        if block > self.num_blocks {
            block = 0;
        }

        if block != self.current_block || self.line_in_block != 0 {
            self.current_block = block;
            self.line_in_block = 0;
            self.block_loaded = false;
            for channel in &mut self.channels {
                channel.decoder.reset_state();
            }
        }
    }

    fn tell(&self) -> u32 {
        if !self.is_opened() {
            return 0;
        }
        let line = self.current_block * LINES_IN_BLOCK as u64 + self.line_in_block as u64;
        self.samples_to_ms(line * SAMPLES_IN_LINE as u64)
    }

    fn decode(&mut self, buffer: &mut [i16]) -> usize {
        if !self.is_opened() || self.current_block >= self.num_blocks {
            return 0;
        }
        if !self.ensure_block() {
            return 0;
        }

        let channels = self.channels.len();
        let per_call = self.buffer_samples().min(buffer.len()) / channels / SAMPLES_IN_LINE;
        let lines = per_call.min(self.remaining_lines());
        let stride = lines * SAMPLES_IN_LINE;

        let mut written = 0;
        while written < lines {
            let start = self.line_in_block * LINE_SIZE;
            let mut ended = false;
            for (c, channel) in self.channels.iter_mut().enumerate() {
                let out = &mut buffer[c * stride + written * SAMPLES_IN_LINE..];
                let line = &channel.block[start..start + LINE_SIZE];
                ended |= channel.decoder.decode_line(line, out) == Line::End;
            }
            written += 1;

            self.line_in_block += 1;
            if self.line_in_block >= LINES_IN_BLOCK {
                self.line_in_block = 0;
                self.current_block += 1;
                self.block_loaded = false;
                if self.current_block >= self.num_blocks || !self.ensure_block() {
                    break;
                }
            }
            if ended {
                break;
            }
        }

        // Close the gap between channel runs when the call ended early.
        let run = written * SAMPLES_IN_LINE;
        if written < lines {
            for c in 1..channels {
                buffer.copy_within(c * stride..c * stride + run, c * run);
            }
        }

        run * channels * SAMPLE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vag::tests::make_line;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// Write a file where every line of (block, channel) holds one nibble.
    fn write_vb(blocks: usize, channels: usize, trailing: usize, nibble: impl Fn(usize, usize) -> u8) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for b in 0..blocks {
            for c in 0..channels {
                let line = make_line(0, 0, &[nibble(b, c); SAMPLES_IN_LINE]);
                for _ in 0..LINES_IN_BLOCK {
                    file.write_all(&line).unwrap();
                }
            }
        }
        file.write_all(&vec![0u8; trailing]).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_missing_file_not_opened() {
        let mut vb = VbFile::open("/nonexistent/track.vb");
        assert!(!vb.is_opened());
        assert_eq!(vb.sample_count(), 0);
        assert_eq!(vb.channels(), 0);
        assert_eq!(vb.sample_rate(), 0);
        assert_eq!(vb.avg_samples_per_sec(), 0);
        assert_eq!(vb.length_ms(), 0);
        let mut buf = vec![0i16; 64];
        assert_eq!(vb.decode(&mut buf), 0);
        vb.seek(1000);
        assert_eq!(vb.tell(), 0);
    }

    #[test]
    fn test_mono_single_block_bit_exact() {
        let file = write_vb(1, 1, 0, |_, _| 3);
        let mut vb = VbFile::with_format(file.path(), 32000, 1);
        assert!(vb.is_opened());
        assert_eq!(vb.sample_count(), SAMPLES_IN_BLOCK as u64);

        let mut buf = vec![0i16; vb.buffer_samples()];
        // 8000 samples per call, 285 whole lines
        let bytes = vb.decode(&mut buf);
        assert_eq!(bytes, 285 * SAMPLES_IN_LINE * 2);
        assert!(buf[..285 * SAMPLES_IN_LINE].iter().all(|&s| s == 3 * 4096));

        let bytes = vb.decode(&mut buf);
        assert_eq!(bytes, (LINES_IN_BLOCK - 285) * SAMPLES_IN_LINE * 2);
        assert_eq!(vb.decode(&mut buf), 0);
        assert_eq!(vb.tell(), vb.length_ms());
    }

    #[test]
    fn test_stereo_planar_across_blocks() {
        let file = write_vb(2, 2, 0, |b, c| (b * 2 + c + 1) as u8);
        let mut vb = VbFile::open(file.path());
        assert_eq!(vb.num_blocks(), 2);

        let mut buf = vec![0i16; vb.buffer_samples()];
        let lines = vb.buffer_samples() / 2 / SAMPLES_IN_LINE;
        assert_eq!(lines, 285);
        let run = lines * SAMPLES_IN_LINE;

        // first call stays inside block 0
        assert_eq!(vb.decode(&mut buf), run * 2 * 2);
        assert!(buf[..run].iter().all(|&s| s == 4096));
        assert!(buf[run..2 * run].iter().all(|&s| s == 2 * 4096));

        // second call: 227 lines of block 0, then 58 of block 1
        assert_eq!(vb.decode(&mut buf), run * 2 * 2);
        let cut = (LINES_IN_BLOCK - lines) * SAMPLES_IN_LINE;
        assert_eq!(cut, 227 * SAMPLES_IN_LINE);
        assert!(buf[..cut].iter().all(|&s| s == 4096));
        assert!(buf[cut..run].iter().all(|&s| s == 3 * 4096));
        assert!(buf[run..run + cut].iter().all(|&s| s == 2 * 4096));
        assert!(buf[run + cut..2 * run].iter().all(|&s| s == 4 * 4096));

        // third call is all block 1
        assert_eq!(vb.decode(&mut buf), run * 2 * 2);
        assert!(buf[..run].iter().all(|&s| s == 3 * 4096));
        assert!(buf[run..2 * run].iter().all(|&s| s == 4 * 4096));

        // 169 lines left
        let left = 2 * LINES_IN_BLOCK - 3 * lines;
        assert_eq!(left, 169);
        assert_eq!(vb.decode(&mut buf), left * SAMPLES_IN_LINE * 2 * 2);
        let run = left * SAMPLES_IN_LINE;
        assert!(buf[..run].iter().all(|&s| s == 3 * 4096));
        assert!(buf[run..2 * run].iter().all(|&s| s == 4 * 4096));
        assert_eq!(vb.decode(&mut buf), 0);
        assert_eq!(vb.tell(), vb.length_ms());
    }

    #[test]
    fn test_seek_snaps_to_block() {
        let file = write_vb(3, 2, 0, |b, _| (b + 1) as u8);
        let mut vb = VbFile::open(file.path());

        vb.seek(1000);
        // 32000 samples lands in block 2, which starts at 28672 samples
        assert_eq!(vb.tell(), 896);

        let mut buf = vec![0i16; vb.buffer_samples()];
        assert!(vb.decode(&mut buf) > 0);
        assert_eq!(buf[0], 3 * 4096);

        vb.seek(0);
        assert_eq!(vb.tell(), 0);
        vb.decode(&mut buf);
        assert_eq!(buf[0], 4096);
    }

    #[test]
    fn test_seek_past_end_rewinds() {
        let file = write_vb(1, 2, 0, |_, _| 1);
        let mut vb = VbFile::open(file.path());
        let mut buf = vec![0i16; vb.buffer_samples()];
        vb.decode(&mut buf);
        vb.seek(10_000_000);
        assert_eq!(vb.tell(), 0);
    }

    #[test]
    fn test_seek_to_end_block_decodes_nothing() {
        let file = write_vb(1, 2, 0, |_, _| 1);
        let mut vb = VbFile::open(file.path());
        // block 1 == num_blocks
        vb.seek(500);
        assert_eq!(vb.tell(), 448);
        let mut buf = vec![0i16; vb.buffer_samples()];
        assert_eq!(vb.decode(&mut buf), 0);
    }

    #[test]
    fn test_partial_trailing_block_ignored() {
        let file = write_vb(1, 2, 1000, |_, _| 1);
        let vb = VbFile::open(file.path());
        assert_eq!(vb.num_blocks(), 1);
        assert_eq!(vb.length_ms(), (SAMPLES_IN_BLOCK as u64 * 1000 / 32000) as u32);
    }

    #[test]
    fn test_sample_rate_override() {
        let file = write_vb(1, 2, 0, |_, _| 1);
        let vb = VbFile::with_format(file.path(), 22050, 2);
        assert_eq!(vb.sample_rate(), 22050);
        assert_eq!(vb.avg_samples_per_sec(), 44100);
    }

    #[test]
    fn test_end_marker_ends_call_and_compacts() {
        let mut file = NamedTempFile::new().unwrap();
        for c in 0..2u8 {
            for l in 0..LINES_IN_BLOCK {
                let mut line = make_line(0, 0, &[c + 1; SAMPLES_IN_LINE]);
                if c == 0 && l == 9 {
                    line[1] = 7;
                }
                file.write_all(&line).unwrap();
            }
        }
        file.flush().unwrap();

        let mut vb = VbFile::open(file.path());
        let mut buf = vec![0i16; vb.buffer_samples()];
        let bytes = vb.decode(&mut buf);
        assert_eq!(bytes, 10 * SAMPLES_IN_LINE * 2 * 2);

        let run = 10 * SAMPLES_IN_LINE;
        assert!(buf[..9 * SAMPLES_IN_LINE].iter().all(|&s| s == 4096));
        assert!(buf[9 * SAMPLES_IN_LINE..run].iter().all(|&s| s == 0));
        assert!(buf[run..2 * run].iter().all(|&s| s == 2 * 4096));

        // next call resumes after the marker
        assert!(vb.decode(&mut buf) > 0);
        assert_eq!(buf[0], 4096);
    }
}
