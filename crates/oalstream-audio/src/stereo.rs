//! Interleaved <-> planar reordering for 16-bit stereo PCM.
//!
//! The stream player uploads each channel to its own mono source, so stereo
//! decoders hand over `L0 L1 .. Ln R0 R1 .. Rn` instead of `L0 R0 L1 R1 ..`.

use tracing::error;

use crate::error::SplitError;

/// Reorders stereo frames in place through a scratch buffer owned by the
/// splitter. The scratch grows to the largest request seen and never shrinks.
#[derive(Debug, Default)]
pub struct StereoSplitter {
    scratch: Vec<i16>,
}

impl StereoSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current scratch capacity in samples.
    pub fn capacity(&self) -> usize {
        self.scratch.capacity()
    }

    fn reserve(&mut self, samples: usize) -> Result<(), SplitError> {
        self.scratch.clear();
        if let Err(e) = self.scratch.try_reserve(samples) {
            error!("stereo split scratch allocation failed: {}", e);
            return Err(SplitError::Alloc { requested: samples });
        }
        Ok(())
    }

    /// Interleaved to planar. A trailing odd sample is left in place.
    pub fn split(&mut self, pcm: &mut [i16]) -> Result<(), SplitError> {
        let frames = pcm.len() / 2;
        if frames == 0 {
            return Ok(());
        }
        let samples = frames * 2;
        self.reserve(samples)?;

        let (interleaved, _) = pcm.split_at_mut(samples);
        self.scratch
            .extend(interleaved.iter().step_by(2).chain(interleaved.iter().skip(1).step_by(2)));
        interleaved.copy_from_slice(&self.scratch);
        Ok(())
    }

    /// Planar to interleaved, the inverse of `split`.
    pub fn merge(&mut self, pcm: &mut [i16]) -> Result<(), SplitError> {
        let frames = pcm.len() / 2;
        if frames == 0 {
            return Ok(());
        }
        let samples = frames * 2;
        self.reserve(samples)?;

        let (planar, _) = pcm.split_at_mut(samples);
        let (left, right) = planar.split_at(frames);
        for (l, r) in left.iter().zip(right) {
            self.scratch.push(*l);
            self.scratch.push(*r);
        }
        planar.copy_from_slice(&self.scratch);
        Ok(())
    }
}
