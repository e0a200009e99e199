use thiserror::Error;

use pnlbot_core::{
    ConfigError, EmailError, IdentifierConstructionError, MarketDataError, NotifyError,
    StoreError, ValidationError,
};

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Identifier(#[from] IdentifierConstructionError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    MarketData(#[from] MarketDataError),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Notify(#[from] NotifyError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) | Self::Identifier(_) | Self::Command(_) => 2,
            Self::Config(_) | Self::MarketData(MarketDataError::UnconfiguredEnvironment { .. }) => 3,
            Self::Serialization(_) => 4,
            Self::MarketData(MarketDataError::UnableToConnect { .. }) | Self::Notify(_) => 6,
            Self::MarketData(_) => 7,
            Self::Email(EmailError::NotFound { .. }) => 8,
            Self::Email(_) => 9,
            Self::Io(_) => 10,
            Self::Store(_) => 11,
        }
    }
}
