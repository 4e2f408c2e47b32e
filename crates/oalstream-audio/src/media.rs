//! Packet-level streaming over symphonia, shared by the mp3 and opus files.
//!
//! Position is tracked in sample frames, which is also the time base of the
//! formats routed through here, so seek timestamps are frame counts.

use std::fs::File;
use std::io::ErrorKind;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CodecRegistry, Decoder as CodecDecoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision};
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::decoder::SAMPLE_SIZE;
use crate::error::DecoderError;
use crate::stereo::StereoSplitter;

// A decode error is retried on the next packet; this many in a row ends the stream.
const MAX_DECODE_RETRIES: usize = 3;

pub(crate) struct MediaStream {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn CodecDecoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u32,
    n_frames: u64,
    tags: Vec<(String, String)>,
    pending: Option<SampleBuffer<i16>>,
    pending_offset: usize,
    skip_frames: u64,
    position: u64,
    splitter: StereoSplitter,
}

fn collect_tags(revision: Option<&MetadataRevision>, tags: &mut Vec<(String, String)>) {
    if let Some(revision) = revision {
        tags.extend(revision.tags().iter().map(|t| (t.key.clone(), t.value.to_string())));
    }
}

impl MediaStream {
    pub(crate) fn open(path: &Path, codecs: &CodecRegistry) -> Result<Self, DecoderError> {
        let file = File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let format_opts = FormatOptions {
            enable_gapless: true,
            ..Default::default()
        };
        let mut probed = symphonia::default::get_probe().format(
            &hint,
            mss,
            &format_opts,
            &MetadataOptions::default(),
        )?;

        let mut tags = Vec::new();
        if let Some(metadata) = probed.metadata.get() {
            collect_tags(metadata.current(), &mut tags);
        }
        let mut format = probed.format;
        {
            let metadata = format.metadata();
            collect_tags(metadata.current(), &mut tags);
        }

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecoderError::NoTrack)?;
        let params = &track.codec_params;

        let sample_rate = params
            .sample_rate
            .ok_or(DecoderError::MissingFormat("sample rate"))?;
        let channels = params
            .channels
            .map(|c| c.count() as u32)
            .ok_or(DecoderError::MissingFormat("channel layout"))?;
        if !(1..=2).contains(&channels) {
            return Err(DecoderError::Unsupported(format!("{} channels", channels)));
        }

        let track_id = track.id;
        let n_frames = params.n_frames.unwrap_or(0);
        let decoder = codecs.make(params, &DecoderOptions::default())?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            channels,
            n_frames,
            tags,
            pending: None,
            pending_offset: 0,
            skip_frames: 0,
            position: 0,
            splitter: StereoSplitter::new(),
        })
    }

    pub(crate) fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub(crate) fn channels(&self) -> u32 {
        self.channels
    }

    pub(crate) fn n_frames(&self) -> u64 {
        self.n_frames
    }

    pub(crate) fn position(&self) -> u64 {
        self.position
    }

    /// Value of the first tag whose key matches (case-insensitive).
    pub(crate) fn tag(&self, key: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn seek_frames(&mut self, frames: u64) {
        let ts = if self.n_frames > 0 {
            frames.min(self.n_frames)
        } else {
            frames
        };

        let to = SeekTo::TimeStamp {
            ts,
            track_id: self.track_id,
        };
        match self.format.seek(SeekMode::Accurate, to) {
            Ok(seeked) => {
                self.decoder.reset();
                self.pending_offset = self.pending.as_ref().map_or(0, |b| b.len());
                self.skip_frames = seeked.required_ts.saturating_sub(seeked.actual_ts);
                self.position = seeked.required_ts;
            }
            Err(e) => warn!("seek to frame {} failed: {}", ts, e),
        }
    }

    /// Decode the next packet of our track into `pending`.
    fn next_buffer(&mut self) -> bool {
        let channels = self.channels as usize;
        let mut errors = 0;

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(e)) if e.kind() == ErrorKind::UnexpectedEof => {
                    debug!("end of stream");
                    return false;
                }
                Err(e) => {
                    warn!("error reading packet: {}", e);
                    return false;
                }
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            match self.decoder.decode(&packet) {
                Ok(decoded) => {
                    let frames = decoded.frames();
                    let skip = (self.skip_frames as usize).min(frames);
                    self.skip_frames -= skip as u64;
                    if frames == skip {
                        continue;
                    }

                    let spec = *decoded.spec();
                    if spec.channels.count() != channels {
                        warn!("channel count changed mid-stream");
                        return false;
                    }

                    let capacity = decoded.capacity();
                    if self
                        .pending
                        .as_ref()
                        .map_or(true, |b| b.capacity() < capacity * channels)
                    {
                        self.pending = Some(SampleBuffer::new(capacity as u64, spec));
                    }
                    if let Some(buffer) = self.pending.as_mut() {
                        buffer.copy_interleaved_ref(decoded);
                    }
                    self.pending_offset = skip * channels;
                    return true;
                }
                Err(Error::DecodeError(e)) => {
                    errors += 1;
                    if errors > MAX_DECODE_RETRIES {
                        warn!("giving up after {} decode errors: {}", errors, e);
                        return false;
                    }
                }
                Err(e) => {
                    warn!("decode failed: {}", e);
                    return false;
                }
            }
        }
    }

    /// Fill `out` with whole interleaved frames, returning samples written.
    fn read(&mut self, out: &mut [i16]) -> usize {
        let channels = self.channels as usize;
        let want = out.len() / channels * channels;
        let mut written = 0;

        while written < want {
            if let Some(buffer) = &self.pending {
                let samples = &buffer.samples()[self.pending_offset.min(buffer.len())..];
                if !samples.is_empty() {
                    let n = samples.len().min(want - written);
                    out[written..written + n].copy_from_slice(&samples[..n]);
                    written += n;
                    self.pending_offset += n;
                    continue;
                }
            }
            if !self.next_buffer() {
                break;
            }
        }

        self.position += (written / channels) as u64;
        written
    }

    /// Decode up to `limit` samples, planar for stereo. Returns bytes.
    pub(crate) fn decode_pcm(&mut self, buffer: &mut [i16], limit: usize) -> usize {
        let limit = limit.min(buffer.len());
        let samples = self.read(&mut buffer[..limit]);
        if samples == 0 {
            return 0;
        }
        if self.channels == 2 && self.splitter.split(&mut buffer[..samples]).is_err() {
            return 0;
        }
        samples * SAMPLE_SIZE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use tempfile::NamedTempFile;

    const RATE: u32 = 8000;
    const FRAMES: usize = 8000;

    /// Stereo ramp: left holds the frame index, right its negation.
    fn write_ramp() -> NamedTempFile {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        let spec = WavSpec {
            channels: 2,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        for f in 0..FRAMES as i16 {
            writer.write_sample(f).unwrap();
            writer.write_sample(-f).unwrap();
        }
        writer.finalize().unwrap();
        file
    }

    fn open_ramp(file: &NamedTempFile) -> MediaStream {
        MediaStream::open(file.path(), symphonia::default::get_codecs()).unwrap()
    }

    #[test]
    fn test_open_reads_format() {
        let file = write_ramp();
        let stream = open_ramp(&file);
        assert_eq!(stream.sample_rate(), RATE);
        assert_eq!(stream.channels(), 2);
        assert_eq!(stream.n_frames(), FRAMES as u64);
        assert_eq!(stream.position(), 0);
    }

    #[test]
    fn test_decode_is_planar_across_packets() {
        let file = write_ramp();
        let mut stream = open_ramp(&file);
        let mut buf = vec![0i16; 4000];

        assert_eq!(stream.decode_pcm(&mut buf, 4000), 4000 * SAMPLE_SIZE);
        assert_eq!(stream.position(), 2000);
        assert!(buf[..2000].iter().enumerate().all(|(i, &s)| s == i as i16));
        assert!(buf[2000..].iter().enumerate().all(|(i, &s)| s == -(i as i16)));

        // picks up where the last call stopped, mid-packet or not
        assert_eq!(stream.decode_pcm(&mut buf, 4000), 4000 * SAMPLE_SIZE);
        assert_eq!(buf[0], 2000);
        assert_eq!(buf[1999], 3999);
        assert_eq!(buf[2000], -2000);
    }

    #[test]
    fn test_limit_is_rounded_to_frames() {
        let file = write_ramp();
        let mut stream = open_ramp(&file);
        let mut buf = vec![0i16; 64];
        assert_eq!(stream.decode_pcm(&mut buf, 11), 10 * SAMPLE_SIZE);
        assert_eq!(&buf[..10], &[0, 1, 2, 3, 4, 0, -1, -2, -3, -4]);
    }

    #[test]
    fn test_seek_lands_on_requested_frame() {
        let file = write_ramp();
        let mut stream = open_ramp(&file);
        let mut buf = vec![0i16; 4000];
        stream.decode_pcm(&mut buf, 4000);

        stream.seek_frames(5000);
        assert_eq!(stream.position(), 5000);
        assert_eq!(stream.decode_pcm(&mut buf, 200), 200 * SAMPLE_SIZE);
        assert_eq!(buf[0], 5000);
        assert_eq!(buf[100], -5000);

        // backwards too
        stream.seek_frames(1234);
        stream.decode_pcm(&mut buf, 2);
        assert_eq!(&buf[..2], &[1234, -1234]);
    }

    #[test]
    fn test_end_of_stream_returns_zero() {
        let file = write_ramp();
        let mut stream = open_ramp(&file);
        let mut buf = vec![0i16; 4000];

        stream.seek_frames(7000);
        assert_eq!(stream.decode_pcm(&mut buf, 4000), 2000 * SAMPLE_SIZE);
        assert_eq!(buf[999], 7999);
        assert_eq!(stream.position(), FRAMES as u64);
        assert_eq!(stream.decode_pcm(&mut buf, 4000), 0);
        assert_eq!(stream.decode_pcm(&mut buf, 4000), 0);
    }

    #[test]
    fn test_more_than_two_channels_not_opened() {
        let file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        let spec = WavSpec {
            channels: 3,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(file.path(), spec).unwrap();
        for _ in 0..30 {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();

        let result = MediaStream::open(file.path(), symphonia::default::get_codecs());
        assert!(result.is_err());
    }
}
