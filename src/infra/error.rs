use thiserror::Error;

use crate::config::SettingsError;

#[derive(Debug, Error)]
pub enum InfraError {
    #[error("telemetry initialization failed: {0}")]
    Telemetry(String),
    #[error("configuration error: {message}")]
    Configuration { message: String },
}

impl InfraError {
    pub fn telemetry(message: impl Into<String>) -> Self {
        Self::Telemetry(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

impl From<SettingsError> for InfraError {
    fn from(err: SettingsError) -> Self {
        Self::configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_errors_surface_as_configuration() {
        let err = InfraError::from(SettingsError::Invalid {
            key: "feed.tier_timeout_ms",
            reason: "must be greater than zero".to_string(),
        });

        assert!(matches!(err, InfraError::Configuration { .. }));
        assert!(err.to_string().contains("feed.tier_timeout_ms"));
    }
}
