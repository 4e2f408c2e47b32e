//! Streamed playback through a pair of mono backend sources.
//!
//! Each decoded chunk is split into a left and right half (or duplicated for
//! mono streams) and queued on the two sources as a buffer pair. `update()`
//! is polled by the caller to recycle processed pairs with fresh PCM.

use std::path::Path;

use oalstream_common::math::unit_arc_point;
use tracing::{debug, warn};

use crate::backend::{BufferId, SourceId, SourceState, StereoPair, StreamBackend};
use crate::decoder::{log_stream_info, open_decoder, Decoder};

pub const MAX_VOLUME: u32 = 127;
pub const MAX_PAN: u8 = 127;
/// Pan value that spreads the two sources symmetrically.
pub const CENTER_PAN: u8 = 63;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No decoder, or the file failed to open.
    Closed,
    Idle,
    Playing,
    Paused,
    /// Between `provider_term()` and `provider_init()`.
    Resetting,
}

pub struct StreamPlayer {
    name: String,
    decoder: Option<Box<dyn Decoder>>,
    /// Scratch for one decode call.
    buffer: Vec<i16>,
    sources: StereoPair<SourceId>,
    buffers: Vec<StereoPair<BufferId>>,
    active: bool,
    paused: bool,
    reset: bool,
    looping: bool,
    volume: u32,
    pan: u8,
    pos_before_reset: u32,
}

impl StreamPlayer {
    /// Open `filename` and bind it to the caller's sources and buffers.
    /// `buffers` is consumed in (left, right) pairs.
    pub fn new(
        filename: impl AsRef<Path>,
        sources: StereoPair<SourceId>,
        buffers: &[BufferId],
        override_sample_rate: u32,
    ) -> Self {
        let path = filename.as_ref();
        let decoder = open_decoder(path, override_sample_rate);
        Self::build(path.display().to_string(), decoder, sources, buffers)
    }

    pub fn with_decoder(
        name: &str,
        decoder: Box<dyn Decoder>,
        sources: StereoPair<SourceId>,
        buffers: &[BufferId],
    ) -> Self {
        Self::build(name.to_string(), Some(decoder), sources, buffers)
    }

    fn build(
        name: String,
        decoder: Option<Box<dyn Decoder>>,
        sources: StereoPair<SourceId>,
        buffers: &[BufferId],
    ) -> Self {
        if buffers.len() % 2 != 0 {
            warn!("stream {}: odd buffer count {}, last buffer unused", name, buffers.len());
        }
        let buffers = buffers
            .chunks_exact(2)
            .map(|pair| StereoPair::new(pair[0], pair[1]))
            .collect();

        let mut player = Self {
            name,
            decoder: None,
            buffer: Vec::new(),
            sources,
            buffers,
            active: false,
            paused: false,
            reset: false,
            looping: false,
            volume: MAX_VOLUME,
            pan: CENTER_PAN,
            pos_before_reset: 0,
        };

        debug!("stream {}", player.name);
        if let Some(decoder) = decoder.filter(|d| d.is_opened()) {
            player.buffer = vec![0; decoder.buffer_samples()];
            log_stream_info(&player.name, decoder.as_ref());
            player.decoder = Some(decoder);
        }
        player
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_opened(&self) -> bool {
        self.decoder.as_ref().is_some_and(|d| d.is_opened())
    }

    pub fn has_source(&self) -> bool {
        !self.sources.left.is_none() && !self.sources.right.is_none()
    }

    pub fn is_playing(&self, al: &dyn StreamBackend) -> bool {
        if !self.has_source() || !self.is_opened() || self.paused {
            return false;
        }
        self.active
            || self
                .sources
                .iter()
                .any(|&s| al.source_state(s) == SourceState::Playing)
    }

    pub fn state(&self, al: &dyn StreamBackend) -> StreamState {
        if !self.is_opened() {
            StreamState::Closed
        } else if self.reset {
            StreamState::Resetting
        } else if self.paused {
            StreamState::Paused
        } else if self.is_playing(al) {
            StreamState::Playing
        } else {
            StreamState::Idle
        }
    }

    /// Pause both sources without touching the play/pause flags.
    pub fn pause(&self, al: &mut dyn StreamBackend) {
        if !self.has_source() {
            return;
        }
        for &source in self.sources.iter() {
            if al.source_state(source) != SourceState::Paused {
                al.pause(source);
            }
        }
    }

    pub fn set_pause(&mut self, al: &mut dyn StreamBackend, pause: bool) {
        if !self.has_source() {
            return;
        }
        if pause {
            self.pause(al);
            self.paused = true;
        } else {
            if self.paused {
                self.set_play(al, true);
            }
            self.paused = false;
        }
    }

    pub fn set_pitch(&self, al: &mut dyn StreamBackend, pitch: f32) {
        if !self.has_source() {
            return;
        }
        for &source in self.sources.iter() {
            al.set_pitch(source, pitch);
        }
    }

    pub fn set_gain(&self, al: &mut dyn StreamBackend, gain: f32) {
        if !self.has_source() {
            return;
        }
        for &source in self.sources.iter() {
            al.set_gain(source, gain);
        }
    }

    /// Place one virtual speaker. Channel 0 is left, 1 is right.
    pub fn set_position(&self, al: &mut dyn StreamBackend, channel: usize, x: f32, y: f32, z: f32) {
        if !self.has_source() {
            return;
        }
        al.set_position(*self.sources.get(channel), [x, y, z]);
    }

    pub fn volume(&self) -> u32 {
        self.volume
    }

    pub fn set_volume(&mut self, al: &mut dyn StreamBackend, volume: u32) {
        self.volume = volume.min(MAX_VOLUME);
        self.set_gain(al, self.volume as f32 / MAX_VOLUME as f32);
    }

    pub fn pan(&self) -> u8 {
        self.pan
    }

    /// Map pan (0..=127) onto two points of the unit arc in front of the
    /// listener. The left speaker follows pan 0..63, the right one 64..127.
    pub fn set_pan(&mut self, al: &mut dyn StreamBackend, pan: u8) {
        let pan = pan.min(MAX_PAN);
        let offset = |p: i32| (p - 63) as f32 / 64.0;

        let left = unit_arc_point(offset((pan as i32 - 63).clamp(0, 63)));
        self.set_position(al, 0, left[0], left[1], left[2]);

        let right = unit_arc_point(offset((pan as i32 + 64).clamp(64, 127)));
        self.set_position(al, 1, right[0], right[1], right[2]);

        self.pan = pan;
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Rewind and keep decoding when the stream runs out.
    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Seek and drop everything already queued.
    pub fn set_pos_ms(&mut self, al: &mut dyn StreamBackend, ms: u32) {
        let Some(decoder) = self.decoder.as_mut() else {
            return;
        };
        decoder.seek(ms);
        self.clear_buffers(al);
    }

    /// Audible position: the decode cursor minus what is still queued on the
    /// left source, plus how far into its current buffer playback is.
    pub fn get_pos_ms(&self, al: &dyn StreamBackend) -> u32 {
        if !self.has_source() {
            return 0;
        }
        let Some(decoder) = self.decoder.as_deref().filter(|d| d.is_opened()) else {
            return 0;
        };

        let channels = decoder.channels().max(1) as usize;
        let buffer_ms = decoder.samples_to_ms((decoder.buffer_samples() / channels) as u64);
        let queued = al.buffers_queued(self.sources.left) as u32;
        let offset = al.byte_offset(self.sources.left) / decoder.sample_size();

        decoder
            .tell()
            .saturating_sub(queued * buffer_ms)
            .saturating_add(decoder.samples_to_ms(offset as u64))
    }

    pub fn get_length_ms(&self) -> u32 {
        self.decoder.as_ref().map_or(0, |d| d.length_ms())
    }

    /// Decode one chunk, rewinding once at the end when looping.
    fn decode_chunk(&mut self) -> usize {
        let Some(decoder) = self.decoder.as_mut() else {
            return 0;
        };
        let mut bytes = decoder.decode(&mut self.buffer);
        if bytes == 0 && self.looping {
            debug!("stream {} looping", self.name);
            decoder.seek(0);
            bytes = decoder.decode(&mut self.buffer);
        }
        bytes
    }

    /// Decode the next chunk into a buffer pair. False at end of stream.
    pub fn fill_buffer(&mut self, al: &mut dyn StreamBackend, pair: StereoPair<BufferId>) -> bool {
        if !self.has_source() || !self.is_opened() {
            return false;
        }
        if pair.iter().any(|&b| b.is_none() || !al.is_buffer(b)) {
            return false;
        }

        let bytes = self.decode_chunk();
        if bytes == 0 {
            return false;
        }

        let Some(decoder) = self.decoder.as_ref() else {
            return false;
        };
        let channels = decoder.channels() as usize;
        let rate = decoder.sample_rate();
        let channel_samples = (bytes / decoder.sample_size() / channels).min(self.buffer.len() / channels);

        let left = &self.buffer[..channel_samples];
        al.buffer_data(pair.left, left, rate);
        if channels == 1 {
            al.buffer_data(pair.right, left, rate);
        } else {
            al.buffer_data(pair.right, &self.buffer[channel_samples..channel_samples * 2], rate);
        }
        true
    }

    /// Fill and queue buffer pairs until the pool or the stream runs out.
    /// Returns the number of pairs queued.
    pub fn fill_buffers(&mut self, al: &mut dyn StreamBackend) -> usize {
        let mut filled = 0;
        for i in 0..self.buffers.len() {
            let pair = self.buffers[i];
            if !self.fill_buffer(al, pair) {
                break;
            }
            al.queue_buffer(self.sources.left, pair.left);
            al.queue_buffer(self.sources.right, pair.right);
            filled += 1;
        }
        filled
    }

    pub fn clear_buffers(&self, al: &mut dyn StreamBackend) {
        if !self.has_source() {
            return;
        }
        for &source in self.sources.iter() {
            for _ in 0..al.buffers_queued(source) {
                al.unqueue_buffer(source);
            }
        }
    }

    /// Rewind and reset pitch and looping. False if nothing is open.
    pub fn setup(&mut self, al: &mut dyn StreamBackend) -> bool {
        let Some(decoder) = self.decoder.as_mut().filter(|d| d.is_opened()) else {
            return false;
        };
        decoder.seek(0);
        self.set_pitch(al, 1.0);
        if self.has_source() {
            for &source in self.sources.iter() {
                al.set_looping(source, false);
            }
        }
        true
    }

    pub fn set_play(&mut self, al: &mut dyn StreamBackend, play: bool) {
        if !self.has_source() {
            return;
        }
        for &source in self.sources.iter() {
            let state = al.source_state(source);
            if play && state != SourceState::Playing {
                al.play(source);
            } else if !play && state != SourceState::Stopped {
                al.stop(source);
            }
        }
        self.active = play;
    }

    pub fn start(&mut self, al: &mut dyn StreamBackend) {
        if !self.has_source() {
            return;
        }
        if self.fill_buffers(al) != 0 {
            self.set_play(al, true);
        }
    }

    pub fn stop(&mut self, al: &mut dyn StreamBackend) {
        if !self.has_source() {
            return;
        }
        self.set_play(al, false);
    }

    /// Stop, release the queue and close the decoder.
    pub fn delete(&mut self, al: &mut dyn StreamBackend) {
        self.stop(al);
        self.clear_buffers(al);
        self.decoder = None;
        self.buffer = Vec::new();
    }

    /// Recycle processed buffer pairs. Call often enough that the queue
    /// never drains while the stream is active.
    pub fn update(&mut self, al: &mut dyn StreamBackend) {
        if !self.is_opened() || !self.has_source() || self.reset || self.paused {
            return;
        }

        let StereoPair { left, right } = self.sources;
        let processed = al.buffers_processed(left);
        debug_assert_eq!(
            processed,
            al.buffers_processed(right),
            "stream sources out of lockstep"
        );

        for _ in 0..processed {
            let (Some(l), Some(r)) = (al.unqueue_buffer(left), al.unqueue_buffer(right)) else {
                warn!("stream {}: processed buffer missing from queue", self.name);
                break;
            };
            let pair = StereoPair::new(l, r);
            if self.active && self.fill_buffer(al, pair) {
                al.queue_buffer(left, pair.left);
                al.queue_buffer(right, pair.right);
            }
        }

        if al.source_state(left) != SourceState::Playing {
            let resume = self.active && al.buffers_queued(left) > 0;
            self.set_play(al, resume);
        }
    }

    /// Backend context is going away: remember where we were and release
    /// every queued buffer. Decoder and flags are kept.
    pub fn provider_term(&mut self, al: &mut dyn StreamBackend) {
        self.pos_before_reset = self.get_pos_ms(al);
        self.reset = true;
        if self.has_source() {
            for &source in self.sources.iter() {
                al.stop(source);
            }
        }
        self.clear_buffers(al);
    }

    /// Backend context is back: restore settings, position and play state.
    pub fn provider_init(&mut self, al: &mut dyn StreamBackend) {
        if !self.reset {
            return;
        }
        if self.setup(al) {
            self.set_pan(al, self.pan);
            self.set_volume(al, self.volume);
            self.set_pos_ms(al, self.pos_before_reset);
            if self.active {
                self.fill_buffers(al);
            }
            self.set_play(al, self.active);
            if self.paused {
                self.pause(al);
            }
        }
        self.reset = false;
    }
}
