use thiserror::Error;

use crate::upload::error::PrepareError;

/// Errors from talking to the photo service. None of them are recovered
/// locally: each one ends the run.
#[derive(Debug, Error)]
pub enum UploadServiceError {
    #[error("Listing existing photos failed (HTTP {status}): {body}")]
    ListingFetch { status: u16, body: String },

    #[error("Malformed photo listing: {0}")]
    MalformedListing(#[from] serde_json::Error),

    #[error("Uploading {slug} failed (HTTP {status}): {body}")]
    Upload {
        status: u16,
        slug: String,
        body: String,
    },

    #[error("Path has no file name: {0}")]
    InvalidFilename(String),

    #[error(transparent)]
    Prepare(#[from] PrepareError),

    #[error(transparent)]
    Http(#[from] anyhow::Error),
}
