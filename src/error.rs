use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("{0} is not a valid md5, sha1, or sha256 hash")]
    InvalidHash(String),

    #[error("invalid hash type: {0}")]
    InvalidAlgorithm(String),

    #[error("{url} answered with HTTP {status}")]
    Transport { status: StatusCode, url: String },

    #[error("sandbox reported an error: {0}")]
    Service(String),

    #[error("no matching files found")]
    NoMatchingFiles,

    #[error("invalid file pattern: {0}")]
    InvalidPattern(#[from] glob::PatternError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed JSON response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to build archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T, E = SandboxError> = std::result::Result<T, E>;
