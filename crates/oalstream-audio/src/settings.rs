//! Stream tunables backed by console variables.

use oalstream_common::cvar::{CvarContext, CvarFlags};

use crate::stream::MAX_VOLUME;
use crate::vb::{DEFAULT_CHANNELS, DEFAULT_SAMPLE_RATE};

pub const DEFAULT_BUFFER_PAIRS: usize = 4;
const MAX_BUFFER_PAIRS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamSettings {
    /// Buffer pairs per stream; each pair is one buffer per source.
    pub buffer_pairs: usize,
    /// Playback rate for `.vb` files, which carry no header.
    pub vb_sample_rate: u32,
    pub vb_channels: u32,
    pub volume: u32,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            buffer_pairs: DEFAULT_BUFFER_PAIRS,
            vb_sample_rate: DEFAULT_SAMPLE_RATE,
            vb_channels: DEFAULT_CHANNELS,
            volume: MAX_VOLUME,
        }
    }
}

impl StreamSettings {
    /// Create the stream cvars with their defaults. Existing values win.
    pub fn register(cvars: &mut CvarContext) {
        let d = Self::default();
        cvars.get("s_streambuffers", &d.buffer_pairs.to_string(), CvarFlags::ARCHIVE);
        cvars.get("s_vbrate", &d.vb_sample_rate.to_string(), CvarFlags::ARCHIVE);
        cvars.get("s_vbchannels", &d.vb_channels.to_string(), CvarFlags::empty());
        cvars.get("s_streamvolume", &d.volume.to_string(), CvarFlags::ARCHIVE);
    }

    /// Read the stream cvars, clamped to usable ranges. Missing variables
    /// fall back to the defaults.
    pub fn from_cvars(cvars: &CvarContext) -> Self {
        let d = Self::default();
        let value = |name: &str, default: f32| {
            cvars.find_var(name).map_or(default, |v| v.value)
        };

        Self {
            buffer_pairs: (value("s_streambuffers", d.buffer_pairs as f32) as usize)
                .clamp(1, MAX_BUFFER_PAIRS),
            vb_sample_rate: (value("s_vbrate", d.vb_sample_rate as f32) as u32).clamp(4000, 192_000),
            vb_channels: (value("s_vbchannels", d.vb_channels as f32) as u32).clamp(1, 2),
            volume: (value("s_streamvolume", d.volume as f32) as u32).min(MAX_VOLUME),
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.buffer_pairs * 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = StreamSettings::default();
        assert_eq!(s.buffer_pairs, 4);
        assert_eq!(s.buffer_count(), 8);
        assert_eq!(s.vb_sample_rate, 32000);
        assert_eq!(s.vb_channels, 2);
        assert_eq!(s.volume, 127);
    }

    #[test]
    fn test_register_then_read() {
        let mut cvars = CvarContext::new();
        StreamSettings::register(&mut cvars);
        assert_eq!(cvars.variable_value("s_vbrate"), 32000.0);
        assert_eq!(StreamSettings::from_cvars(&cvars), StreamSettings::default());
    }

    #[test]
    fn test_config_overrides_and_clamps() {
        let mut cvars = CvarContext::new();
        StreamSettings::register(&mut cvars);
        cvars.exec_config("set s_streambuffers 100\nset s_vbrate 22050\nset s_vbchannels 0\nset s_streamvolume 300\n");
        let s = StreamSettings::from_cvars(&cvars);
        assert_eq!(s.buffer_pairs, 32);
        assert_eq!(s.vb_sample_rate, 22050);
        assert_eq!(s.vb_channels, 1);
        assert_eq!(s.volume, 127);
    }

    #[test]
    fn test_missing_cvars_use_defaults() {
        let cvars = CvarContext::new();
        assert_eq!(StreamSettings::from_cvars(&cvars), StreamSettings::default());
    }
}
