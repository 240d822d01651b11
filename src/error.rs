use thiserror::Error;

/// Why a single page image could not be transcoded. Never fatal for the archive.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("decode failed: {0}")]
    Decode(#[from] image::ImageError),

    #[error("encode failed: {0}")]
    Encode(String),
}

impl TranscodeError {
    pub fn stage(&self) -> &'static str {
        match self {
            TranscodeError::Decode(_) => "decode",
            TranscodeError::Encode(_) => "encode",
        }
    }
}
