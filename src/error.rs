use thiserror::Error;

pub type Result<T, E = AmazonError> = std::result::Result<T, E>;

/// Top-level error returned by every library operation.
#[derive(Debug, Error)]
pub enum AmazonError {
    /// Missing or unusable settings (credentials, locale, endpoint).
    #[error("configuration missing: {0}")]
    Configuration(String),

    /// Empty or malformed input handed to a lookup call.
    #[error("invalid input: {0}")]
    Validation(String),

    #[error(transparent)]
    Remote(#[from] RemoteError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Transport or API-level failure talking to the product catalog.
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("catalog returned http {status}: {body}")]
    Status { status: u16, body: String },

    #[error("catalog error {code}: {message}")]
    Api { code: String, message: String },

    #[error("malformed catalog response: {0}")]
    Parse(#[from] quick_xml::DeError),

    #[error("no catalog match for {0}")]
    NotFound(String),
}

/// Persistence failure in the association store or cache.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("cache payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<reqwest::Error> for AmazonError {
    fn from(err: reqwest::Error) -> Self {
        AmazonError::Remote(RemoteError::Transport(err))
    }
}

impl From<sqlx::Error> for AmazonError {
    fn from(err: sqlx::Error) -> Self {
        AmazonError::Store(StoreError::Database(err))
    }
}

impl From<serde_json::Error> for AmazonError {
    fn from(err: serde_json::Error) -> Self {
        AmazonError::Store(StoreError::Payload(err))
    }
}

impl AmazonError {
    /// True for failures of the remote catalog (as opposed to local config or storage).
    pub fn is_remote(&self) -> bool {
        matches!(self, AmazonError::Remote(_))
    }
}
