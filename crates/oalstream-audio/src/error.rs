use thiserror::Error;

/// Failure while opening or reading a stream. Never crosses the `Decoder`
/// trait: variants log it and report `is_opened() == false` or 0 bytes.
#[derive(Debug, Error)]
pub enum DecoderError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "lossy")]
    #[error("wav error: {0}")]
    Wav(#[from] hound::Error),

    #[cfg(any(feature = "lossy", feature = "opus"))]
    #[error("symphonia error: {0}")]
    Symphonia(#[from] symphonia::core::errors::Error),

    #[error("no decodable audio track")]
    NoTrack,

    #[error("stream is missing {0}")]
    MissingFormat(&'static str),

    #[error("unsupported stream: {0}")]
    Unsupported(String),
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("could not allocate {requested} samples of scratch space")]
    Alloc { requested: usize },
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no audio device available")]
    NoDevice,

    #[error("could not create audio context")]
    NoContext,

    #[error("audio library error 0x{0:X}")]
    Al(i32),
}
