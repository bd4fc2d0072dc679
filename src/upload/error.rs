use thiserror::Error;

/// Failures while turning a local file into an upload body.
/// Any of these stops the run.
#[derive(Debug, Error)]
pub enum PrepareError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("Cannot decode image {path}: {source}")]
    Decode {
        path: String,
        source: image::ImageError,
    },

    #[error("Cannot encode resized {path}: {source}")]
    Encode {
        path: String,
        source: jpeg_encoder::EncodingError,
    },

    #[error("Resized dimensions {width}x{height} out of range for {path}")]
    Dimensions {
        path: String,
        width: u32,
        height: u32,
    },

    #[error("Image worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}
