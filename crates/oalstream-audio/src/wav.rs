use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec};
use tracing::warn;

use crate::decoder::{Decoder, SAMPLE_SIZE};
use crate::error::DecoderError;
use crate::stereo::StereoSplitter;

struct Opened {
    reader: WavReader<BufReader<File>>,
    spec: WavSpec,
    frames: u64,
    /// Read cursor in frames.
    position: u64,
}

/// RIFF WAVE file read through hound and converted to 16-bit.
pub struct WavFile {
    inner: Option<Opened>,
    splitter: StereoSplitter,
}

impl WavFile {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let inner = match Self::open_reader(path) {
            Ok(opened) => Some(opened),
            Err(e) => {
                warn!("could not open {}: {}", path.display(), e);
                None
            }
        };
        Self {
            inner,
            splitter: StereoSplitter::new(),
        }
    }

    fn open_reader(path: &Path) -> Result<Opened, DecoderError> {
        let reader = WavReader::open(path)?;
        let spec = reader.spec();
        if !(1..=2).contains(&spec.channels) {
            return Err(DecoderError::Unsupported(format!("{} channels", spec.channels)));
        }
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 1..=32) | (SampleFormat::Float, 32) => {}
            (format, bits) => {
                return Err(DecoderError::Unsupported(format!("{:?} {} bit", format, bits)));
            }
        }
        Ok(Opened {
            frames: reader.duration() as u64,
            reader,
            spec,
            position: 0,
        })
    }
}

/// Read up to `out.len()` samples, converted to 16-bit. Returns the count.
fn read_samples(opened: &mut Opened, out: &mut [i16]) -> Result<usize, hound::Error> {
    let mut n = 0;
    match opened.spec.sample_format {
        SampleFormat::Int => {
            let bits = opened.spec.bits_per_sample as i32;
            for (slot, sample) in out.iter_mut().zip(opened.reader.samples::<i32>()) {
                let sample = sample?;
                *slot = if bits <= 16 {
                    (sample << (16 - bits)) as i16
                } else {
                    (sample >> (bits - 16)) as i16
                };
                n += 1;
            }
        }
        SampleFormat::Float => {
            for (slot, sample) in out.iter_mut().zip(opened.reader.samples::<f32>()) {
                *slot = (sample?.clamp(-1.0, 1.0) * 32767.0) as i16;
                n += 1;
            }
        }
    }
    Ok(n)
}

impl Decoder for WavFile {
    fn is_opened(&self) -> bool {
        self.inner.is_some()
    }

    fn sample_count(&self) -> u64 {
        self.inner.as_ref().map_or(0, |o| o.frames)
    }

    fn sample_rate(&self) -> u32 {
        self.inner.as_ref().map_or(0, |o| o.spec.sample_rate)
    }

    fn channels(&self) -> u32 {
        self.inner.as_ref().map_or(0, |o| o.spec.channels as u32)
    }

    fn seek(&mut self, milliseconds: u32) {
        let frame = self.ms_to_samples(milliseconds).min(self.sample_count());
        let Some(opened) = self.inner.as_mut() else {
            return;
        };
        match opened.reader.seek(frame as u32) {
            Ok(()) => opened.position = frame,
            Err(e) => warn!("wav seek to frame {} failed: {}", frame, e),
        }
    }

    fn tell(&self) -> u32 {
        self.inner
            .as_ref()
            .map_or(0, |o| self.samples_to_ms(o.position))
    }

    fn decode(&mut self, buffer: &mut [i16]) -> usize {
        let limit = self.buffer_samples().min(buffer.len());
        let Some(opened) = self.inner.as_mut() else {
            return 0;
        };

        let channels = opened.spec.channels as usize;
        let want = limit / channels * channels;
        let samples = match read_samples(opened, &mut buffer[..want]) {
            Ok(n) => n / channels * channels,
            Err(e) => {
                warn!("wav decode failed: {}", e);
                return 0;
            }
        };
        opened.position += (samples / channels) as u64;

        if samples == 0 {
            return 0;
        }
        if channels == 2 && self.splitter.split(&mut buffer[..samples]).is_err() {
            return 0;
        }
        samples * SAMPLE_SIZE
    }
}
