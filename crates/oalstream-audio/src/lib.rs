//! Streamed music playback: format decoders, the VAG block codec and the
//! double-source stream player that feeds a positional audio backend.

#![allow(clippy::too_many_arguments, clippy::manual_clamp)]

pub mod backend;
pub mod decoder;
pub mod error;
pub mod settings;
pub mod stereo;
pub mod stream;
pub mod vag;
pub mod vb;

#[cfg(feature = "lossy")]
pub mod mp3;
#[cfg(feature = "opus")]
pub mod opus;
#[cfg(any(feature = "lossy", feature = "opus"))]
mod media;
#[cfg(feature = "lossy")]
pub mod wav;

#[cfg(feature = "openal")]
pub mod openal;

pub use backend::{BufferId, SourceId, SourceState, StereoPair, StreamBackend};
pub use decoder::{open_decoder, Decoder};
pub use error::{BackendError, DecoderError, SplitError};
pub use settings::StreamSettings;
pub use stream::{StreamPlayer, StreamState, MAX_VOLUME};
