use image::ImageError;
use thiserror::Error;

use crate::storage::StorageError;

/// Anything that aborts an invocation. No variant is retried here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to check for existing output {key}: {source}")]
    ExistenceCheck {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to fetch source {key}: {source}")]
    Fetch {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to decode source image: {0}")]
    Decode(#[source] ImageError),

    #[error("failed to encode {width}px derivative: {source}")]
    Encode {
        width: u32,
        #[source]
        source: ImageError,
    },

    #[error("failed to upload {key}: {source}")]
    Upload {
        key: String,
        #[source]
        source: StorageError,
    },

    #[error("scratch storage error: {0}")]
    Scratch(#[from] std::io::Error),
}
