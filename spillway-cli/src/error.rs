//! CLI error type.

use std::fmt;

use spillway::config::ConfigError;
use spillway::logging::LoggingError;
use spillway::PipelineError;

/// Errors surfaced to the user by the `spillway` binary.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded, validated or written.
    Config(String),
    /// Logging could not be set up.
    Logging(LoggingError),
    /// The Tokio runtime could not be built.
    Runtime(std::io::Error),
    /// The pipeline aborted on a structural fault.
    Pipeline(PipelineError),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::Logging(e) => write!(f, "Logging error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
            CliError::Pipeline(e) => write!(f, "Pipeline failed: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::Config(_) => None,
            CliError::Logging(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            CliError::Pipeline(e) => Some(e),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<LoggingError> for CliError {
    fn from(e: LoggingError) -> Self {
        CliError::Logging(e)
    }
}

impl From<PipelineError> for CliError {
    fn from(e: PipelineError) -> Self {
        CliError::Pipeline(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spillway::queue::QueueError;
    use spillway::Stage;

    #[test]
    fn test_config_error_display() {
        let err: CliError = ConfigError::Invalid("bad capacity".to_string()).into();
        assert_eq!(
            err.to_string(),
            "Configuration error: invalid configuration: bad capacity"
        );
    }

    #[test]
    fn test_pipeline_error_has_source() {
        let err: CliError = PipelineError::queue(Stage::Consumer, QueueError::Closed).into();
        assert!(err.to_string().starts_with("Pipeline failed: consumer stage aborted"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
