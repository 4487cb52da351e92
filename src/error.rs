use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScraperError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to parse page: {0}")]
    Parse(String),

    #[error("no logins left to use")]
    NoCredentialsLeft,

    #[error("Spider closed: {0}")]
    SpiderClosed(String),
}

pub type Result<T> = std::result::Result<T, ScraperError>;
