//! Error types for the min_max integration

use ha_core::EntityIdError;
use thiserror::Error;

pub type MinMaxResult<T> = Result<T, MinMaxError>;

#[derive(Debug, Error)]
pub enum MinMaxError {
    #[error("unknown sensor type '{0}'")]
    InvalidType(String),

    #[error("round_digits must be between 0 and {max}, got {value}")]
    InvalidRoundDigits { value: f64, max: u32 },

    #[error("invalid entity id '{entity_id}': {source}")]
    InvalidEntityId {
        entity_id: String,
        #[source]
        source: EntityIdError,
    },

    #[error("invalid options: {0}")]
    InvalidOptions(#[from] serde_json::Error),

    #[error("invalid platform config: {0}")]
    InvalidPlatformConfig(#[from] serde_yaml::Error),

    #[error("sensor name '{0}' does not produce a valid entity id")]
    InvalidName(String),
}
