use thiserror::Error;

/// Error kinds the pool/render core distinguishes.
///
/// Per the error handling design, only [`PoolError::PoolEmpty`] is meant to
/// cross the renderer boundary; every other variant is logged by the
/// component that produced it and either retried on the next tick or
/// silently degraded.
#[derive(Error, Debug, Clone)]
pub enum PoolError {
    #[error("pool is empty")]
    PoolEmpty,

    #[error("invalid pool type: {0}")]
    InvalidPoolType(String),

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("analysis unavailable: {0}")]
    AnalysisUnavailable(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<std::io::Error> for PoolError {
    fn from(e: std::io::Error) -> Self {
        PoolError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for PoolError {
    fn from(e: serde_json::Error) -> Self {
        PoolError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PoolError {
    fn from(e: toml::de::Error) -> Self {
        PoolError::Configuration(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
