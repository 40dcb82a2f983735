//! Error types shared by configuration, load ingestion, and persistence.

use chrono::NaiveDateTime;
use thiserror::Error;

/// A single configuration problem with the offending field path.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("config error: {field}: {message}")]
pub struct ConfigError {
    /// Dotted field path (e.g., `"ems.peak_window.end_hour"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ConfigError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {}", join_errors(.0))]
    InvalidConfig(Vec<ConfigError>),

    #[error("load data must have columns `timestamp` and `load`; missing `{0}`")]
    MissingColumn(&'static str),

    #[error("row {row}: cannot parse timestamp {value:?}")]
    Timestamp { row: usize, value: String },

    #[error("row {row}: cannot parse load value {value:?}")]
    LoadValue { row: usize, value: String },

    #[error("load data contains no samples")]
    EmptyLoad,

    #[error("non-uniform sample spacing at {at}: expected {expected_minutes} min, found {found_minutes} min")]
    NonUniformCadence {
        at: NaiveDateTime,
        expected_minutes: i64,
        found_minutes: i64,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error stems from invalid input rather than a failure during the run.
    ///
    /// Configuration errors are meant to be surfaced before a simulation starts.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig(_)
                | Self::MissingColumn(_)
                | Self::Timestamp { .. }
                | Self::LoadValue { .. }
                | Self::EmptyLoad
                | Self::NonUniformCadence { .. }
                | Self::Toml(_)
        )
    }
}

impl From<ConfigError> for Error {
    fn from(error: ConfigError) -> Self {
        Self::InvalidConfig(vec![error])
    }
}

fn join_errors(errors: &[ConfigError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_are_flagged_as_configuration() {
        let err = Error::from(ConfigError::new("ems.peak_window", "end must be after start"));
        assert!(err.is_configuration());
        assert!(err.to_string().contains("ems.peak_window"));
    }

    #[test]
    fn io_errors_are_runtime_errors() {
        let err = Error::from(std::io::Error::other("disk gone"));
        assert!(!err.is_configuration());
    }

    #[test]
    fn multiple_config_errors_are_joined() {
        let err = Error::InvalidConfig(vec![
            ConfigError::new("a", "bad"),
            ConfigError::new("b", "worse"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("a: bad"));
        assert!(msg.contains("b: worse"));
    }
}
