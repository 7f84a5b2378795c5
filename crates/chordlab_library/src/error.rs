use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported binding record version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Invalid control identifier: {0:?}")]
    InvalidControl(String),

    #[error("Invalid binding for {control}: {reason}")]
    InvalidBinding { control: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
