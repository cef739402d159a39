use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration error: {0}")]
    Invalid(String),

    #[error("DISCORD_TOKEN is required unless DRY_RUN=true")]
    MissingToken,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
