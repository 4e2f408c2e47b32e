//! Positional audio backend seam.
//!
//! A stream plays through two mono sources (left and right virtual speakers)
//! and a pool of buffer objects owned by the caller. The backend exposes the
//! handful of source/buffer primitives the player needs; every call is
//! best-effort and never fails.

use oalstream_common::math::Vec3;

/// Backend source handle. `SourceId::NONE` marks a missing source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceId(pub u32);

/// Backend buffer handle. `BufferId::NONE` marks a missing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferId(pub u32);

impl SourceId {
    pub const NONE: SourceId = SourceId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl BufferId {
    pub const NONE: BufferId = BufferId(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceState {
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// One value per virtual speaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StereoPair<T> {
    pub left: T,
    pub right: T,
}

impl<T> StereoPair<T> {
    pub const fn new(left: T, right: T) -> Self {
        Self { left, right }
    }

    /// Channel 0 is left, anything else is right.
    pub fn get(&self, channel: usize) -> &T {
        if channel == 0 {
            &self.left
        } else {
            &self.right
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        [&self.left, &self.right].into_iter()
    }

    pub fn map<U>(self, mut f: impl FnMut(T) -> U) -> StereoPair<U> {
        StereoPair {
            left: f(self.left),
            right: f(self.right),
        }
    }
}

pub trait StreamBackend {
    fn is_buffer(&self, buffer: BufferId) -> bool;

    fn source_state(&self, source: SourceId) -> SourceState;
    fn buffers_queued(&self, source: SourceId) -> usize;
    fn buffers_processed(&self, source: SourceId) -> usize;
    /// Playback offset in bytes into the buffer currently playing.
    fn byte_offset(&self, source: SourceId) -> usize;

    /// Upload mono 16-bit PCM into `buffer`.
    fn buffer_data(&mut self, buffer: BufferId, pcm: &[i16], sample_rate: u32);
    fn queue_buffer(&mut self, source: SourceId, buffer: BufferId);
    /// Remove the oldest processed buffer from the queue.
    fn unqueue_buffer(&mut self, source: SourceId) -> Option<BufferId>;

    fn play(&mut self, source: SourceId);
    fn stop(&mut self, source: SourceId);
    fn pause(&mut self, source: SourceId);

    fn set_gain(&mut self, source: SourceId, gain: f32);
    fn set_pitch(&mut self, source: SourceId, pitch: f32);
    fn set_position(&mut self, source: SourceId, position: Vec3);
    fn set_looping(&mut self, source: SourceId, looping: bool);
}


#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;

    #[test]
    fn test_handles_none() {
        assert!(SourceId::NONE.is_none());
        assert!(!SourceId(3).is_none());
        assert!(BufferId::default().is_none());
    }

    #[test]
    fn test_stereo_pair_helpers() {
        let pair = StereoPair::new(1, 2);
        assert_eq!(*pair.get(0), 1);
        assert_eq!(*pair.get(1), 2);
        assert_eq!(pair.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(pair.map(|v| v * 10), StereoPair::new(10, 20));
    }

    #[test]
    fn test_mock_queue_lifecycle() {
        let s = SourceId(1);
        let mut al = MockBackend::new(&[s], &[BufferId(10), BufferId(11)]);
        al.queue_buffer(s, BufferId(10));
        al.queue_buffer(s, BufferId(11));
        assert_eq!(al.unqueue_buffer(s), None);

        al.play(s);
        al.process(1);
        assert_eq!(al.buffers_processed(s), 1);
        assert_eq!(al.unqueue_buffer(s), Some(BufferId(10)));
        assert_eq!(al.source_state(s), SourceState::Playing);

        al.process(1);
        assert_eq!(al.source_state(s), SourceState::Stopped);
        assert_eq!(al.unqueue_buffer(s), Some(BufferId(11)));
        assert_eq!(al.buffers_queued(s), 0);
    }
}
