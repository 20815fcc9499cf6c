use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid tracker config: {0}")]
    InvalidConfig(String),

    #[error("Config IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config JSON Error: {0}")]
    Json(#[from] serde_json::Error),
}
