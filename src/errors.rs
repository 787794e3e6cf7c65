use thiserror::Error;

/// Every fatal outcome of a clone run. Each variant carries a message that
/// is shown to the operator as-is.
#[derive(Error, Debug)]
pub enum CloneError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Resolution failed: {0}")]
    Resolution(String),

    #[error("Live mount failed: {0}")]
    Mount(String),

    #[error("Instance bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Restore failed: {0}")]
    Restore(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Command execution failed: {0}")]
    Command(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL parsing error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Serde JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloneError>;
