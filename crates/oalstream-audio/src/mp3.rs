use std::path::Path;

use tracing::warn;

use crate::decoder::Decoder;
use crate::media::MediaStream;

/// MPEG audio stream decoded through symphonia.
pub struct Mp3File {
    stream: Option<MediaStream>,
}

impl Mp3File {
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let stream = match MediaStream::open(path, symphonia::default::get_codecs()) {
            Ok(stream) => Some(stream),
            Err(e) => {
                warn!("could not open {}: {}", path.display(), e);
                None
            }
        };
        Self { stream }
    }
}

impl Decoder for Mp3File {
    fn is_opened(&self) -> bool {
        self.stream.is_some()
    }

    fn sample_count(&self) -> u64 {
        self.stream.as_ref().map_or(0, |s| s.n_frames())
    }

    fn sample_rate(&self) -> u32 {
        self.stream.as_ref().map_or(0, |s| s.sample_rate())
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
