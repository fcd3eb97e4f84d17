use crate::schema::Provenance;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetricsError {
    #[error("Tier {tier:?} unavailable: {details}")]
    TierAccess { tier: Provenance, details: String },

    #[error("Record {record_id} is missing required field '{field}'")]
    MalformedRecord { record_id: String, field: String },

    #[error("Invalid month key: {0}")]
    InvalidMonthKey(String),

    #[error("Date parsing error: {0}")]
    DateError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl MetricsError {
    pub fn tier_access(tier: Provenance, details: impl Into<String>) -> Self {
        Self::TierAccess {
            tier,
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MetricsError>;
