use std::path::Path;
use std::sync::OnceLock;

use symphonia::core::codecs::CodecRegistry;
use symphonia_adapter_libopus::OpusDecoder;
use tracing::{debug, warn};

use crate::decoder::Decoder;
use crate::media::MediaStream;

/// Opus always decodes at 48 kHz.
pub const OPUS_SAMPLE_RATE: u32 = 48000;

/// Comment tag that overrides the reported playback rate.
const SAMPLE_RATE_TAG: &str = "SAMPLERATE";

fn codec_registry() -> &'static CodecRegistry {
    static CODEC_REGISTRY: OnceLock<CodecRegistry> = OnceLock::new();
    CODEC_REGISTRY.get_or_init(|| {
        let mut registry = CodecRegistry::new();
        registry.register_all::<OpusDecoder>();
        registry
    })
}

/// Parse a `SAMPLERATE` tag value. Accepts a bare number or the full
/// `SAMPLERATE=<n>` comment form.
fn parse_sample_rate(value: &str) -> Option<u32> {
    let value = value.trim();
    let value = match value.split_once('=') {
        Some((key, rest)) if key.trim().eq_ignore_ascii_case(SAMPLE_RATE_TAG) => rest.trim(),
        _ => value,
    };
    value.parse::<u32>().ok().filter(|&rate| rate > 0)
}

/// Ogg Opus stream decoded through symphonia and libopus.
pub struct OpusFile {
    stream: Option<MediaStream>,
    sample_rate: u32,
}

impl OpusFile {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match MediaStream::open(path, codec_registry()) {
            Ok(stream) => {
                let sample_rate = stream
                    .tag(SAMPLE_RATE_TAG)
                    .and_then(parse_sample_rate)
                    .unwrap_or(OPUS_SAMPLE_RATE);
                if sample_rate != OPUS_SAMPLE_RATE {
                    debug!("{}: tagged sample rate {}", path.display(), sample_rate);
                }
                Self {
                    stream: Some(stream),
                    sample_rate,
                }
            }
            Err(e) => {
                warn!("could not open {}: {}", path.display(), e);
                Self {
                    stream: None,
                    sample_rate: 0,
                }
            }
        }
    }
}

impl Decoder for OpusFile {
    fn is_opened(&self) -> bool {
        self.stream.is_some()
    }

    fn sample_count(&self) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.n_frames())
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u32 {
        self.stream.as_ref().map_or(0, |s| s.channels())
    }

    fn seek(&mut self, milliseconds: u32) {
        let frames = self.ms_to_samples(milliseconds);
        if let Some(stream) = self.stream.as_mut() {
            stream.seek_frames(frames);
        }
    }

    fn tell(&self) -> u32 {
        self.stream
            .as_ref()
            .map_or(0, |s| self.samples_to_ms(s.position()))
    }

    fn decode(&mut self, buffer: &mut [i16]) -> usize {
        let limit = self.buffer_samples();
        match self.stream.as_mut() {
            Some(stream) => stream.decode_pcm(buffer, limit),
            None => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sample_rate() {
        assert_eq!(parse_sample_rate("32000"), Some(32000));
        assert_eq!(parse_sample_rate(" 22050 "), Some(22050));
        assert_eq!(parse_sample_rate("SAMPLERATE=24000"), Some(24000));
        assert_eq!(parse_sample_rate("samplerate = 16000"), Some(16000));
        assert_eq!(parse_sample_rate("fast"), None);
        assert_eq!(parse_sample_rate("0"), None);
    }

    #[test]
    fn test_missing_file() {
        let opus = OpusFile::open("/nonexistent/radio.opus");
        assert!(!opus.is_opened());
        assert_eq!(opus.sample_rate(), 0);
        assert_eq!(opus.sample_count(), 0);
    }
}
