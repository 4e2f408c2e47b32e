//! Decoder capability set shared by every stream format.
//!
//! All output is 16-bit PCM. Multichannel output is planar: stereo decoders
//! run their interleaved PCM through a `StereoSplitter` before returning.

use std::path::Path;

use tracing::{debug, warn};

use crate::vb::VbFile;

/// Size in bytes of one decoded sample.
pub const SAMPLE_SIZE: usize = std::mem::size_of::<i16>();

pub trait Decoder {
    fn is_opened(&self) -> bool;

    fn sample_size(&self) -> usize {
        SAMPLE_SIZE
    }

    /// Length of the stream in sample frames.
    fn sample_count(&self) -> u64;
    fn sample_rate(&self) -> u32;
    fn channels(&self) -> u32;

    fn seek(&mut self, milliseconds: u32);
    /// Current decode cursor in milliseconds.
    fn tell(&self) -> u32;

    /// Decode up to `buffer_samples()` samples into `buffer` and return the
    /// number of bytes written. 0 means end of stream or a decode error.
    fn decode(&mut self, buffer: &mut [i16]) -> usize;

    fn avg_samples_per_sec(&self) -> u32 {
        self.channels() * self.sample_rate()
    }

    /// A quarter second of interleaved samples, rounded so that it always
    /// holds whole stereo frames.
    fn buffer_samples(&self) -> usize {
        let n = self.avg_samples_per_sec() as usize / 4;
        n + n % 4
    }

    fn buffer_size(&self) -> usize {
        self.buffer_samples() * self.sample_size()
    }

    fn length_ms(&self) -> u32 {
        self.samples_to_ms(self.sample_count())
    }

    fn ms_to_samples(&self, milliseconds: u32) -> u64 {
        milliseconds as u64 * self.sample_rate() as u64 / 1000
    }

    fn samples_to_ms(&self, samples: u64) -> u32 {
        let rate = self.sample_rate() as u64;
        if rate == 0 {
            return 0;
        }
        (samples * 1000 / rate).min(u32::MAX as u64) as u32
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Pick a decoder by file extension (case-insensitive). `override_sample_rate`
/// only applies to the headerless `.vb` format; 0 keeps its default.
///
/// Returns `None` for extensions this build cannot decode. A recognised file
/// that fails to open still yields a decoder reporting `is_opened() == false`.
pub fn open_decoder(path: impl AsRef<Path>, override_sample_rate: u32) -> Option<Box<dyn Decoder>> {
    let path = path.as_ref();

    #[cfg(feature = "lossy")]
    {
        if has_extension(path, "mp3") {
            return Some(Box::new(crate::mp3::Mp3File::open(path)));
        }
        if has_extension(path, "wav") {
            return Some(Box::new(crate::wav::WavFile::open(path)));
        }
    }

    #[cfg(feature = "opus")]
    {
        if has_extension(path, "opus") {
            return Some(Box::new(crate::opus::OpusFile::open(path)));
        }
    }

    if has_extension(path, "vb") {
        let decoder = if override_sample_rate != 0 {
            VbFile::with_format(path, override_sample_rate, crate::vb::DEFAULT_CHANNELS)
        } else {
            VbFile::open(path)
        };
        return Some(Box::new(decoder));
    }

    warn!("no decoder for {}", path.display());
    None
}

/// Log the stream parameters the player sizes its buffers from.
pub fn log_stream_info(name: &str, decoder: &dyn Decoder) {
    let buffer_secs = decoder.buffer_samples() as f32
        / decoder.channels().max(1) as f32
        / decoder.sample_rate().max(1) as f32;
    let length_s = decoder.length_ms() / 1000;
    debug!(
        "stream {}: avg samples/s {}, sample count {}, rate {}, channels {}, buffer samples {}, buffer sec {:.3}, length {:02}:{:02}",
        name,
        decoder.avg_samples_per_sec(),
        decoder.sample_count(),
        decoder.sample_rate(),
        decoder.channels(),
        decoder.buffer_samples(),
        buffer_secs,
        length_s / 60,
        length_s % 60,
    );
}
