use thiserror::Error;

/// Errors raised by the pipeline components
#[derive(Debug, Error)]
pub enum Error {
    /// Listing or reading from the object store failed
    #[error("store access failed for `{key}`: {reason}")]
    StoreAccess { key: String, reason: String },

    /// Writing a manifest or a record failed
    #[error("store write failed for `{key}`: {reason}")]
    StoreWrite { key: String, reason: String },

    /// The job queue rejected one or more submissions
    #[error("job submission failed: {0}")]
    JobSubmission(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The worker finished but not every image was persisted
    #[error("out of `{total}` elements, only `{success}` were successfully processed")]
    IncompleteProcessing { success: usize, total: usize },

    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Malformed trigger event
    #[error("invalid event: {0}")]
    Event(#[from] serde_json::Error),

    #[error("missing mandatory setting `{0}`")]
    Config(String),
}

impl Error {
    pub fn store_access(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::StoreAccess { key: key.into(), reason: reason.to_string() }
    }

    pub fn store_write(key: impl Into<String>, reason: impl ToString) -> Self {
        Self::StoreWrite { key: key.into(), reason: reason.to_string() }
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }
}

impl From<opencv::Error> for Error {
    fn from(err: opencv::Error) -> Self {
        Self::Embedding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
