//! Error types for the Stratum runtime.
//!
//! Uses `thiserror` for ergonomic error definitions. Configuration mistakes
//! and API misuse get their own enums so callers can match on them; both
//! propagate unchanged through every advice chain.

use thiserror::Error;

/// The top-level error type for all Stratum operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Configuration errors ---
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    // --- Usage errors ---
    #[error("Usage error: {0}")]
    Usage(#[from] UsageError),

    // --- Failures raised by advice bodies ---
    #[error("Advice '{advice}' failed: {reason}")]
    Advice { advice: String, reason: String },
}

impl Error {
    /// Build an error reported from inside an advice body.
    pub fn advice(advice: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Advice {
            advice: advice.into(),
            reason: reason.into(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error(
        "called proceed() in innermost function of '{method}': there is no base method \
         (around advice without a layer) or the base method itself calls proceed()"
    )]
    NothingToProceed { method: String },

    #[error("layer {layer} is already active")]
    LayerAlreadyActive { layer: String },

    #[error("layer {layer} is not active")]
    LayerNotActive { layer: String },

    #[error("advice kind {kind} does not accept a {expected} implementation")]
    InvalidAdviceKind { kind: String, expected: String },

    #[error("base advice cannot belong to layer {layer}")]
    BaseWithLayer { layer: String },

    #[error("no layered method named '{0}'")]
    UnknownMethod(String),

    #[error("layered method '{method}' has a different signature than requested")]
    SignatureMismatch { method: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    #[error("proceed() called outside of any layered method dispatch")]
    OutsideDispatch,

    #[error("proceed() called with a signature that does not match the current dispatch")]
    SignatureMismatch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configuration_error_displays_correctly() {
        let err = Error::from(ConfigurationError::NothingToProceed {
            method: "greet".into(),
        });
        assert!(err.to_string().contains("greet"));
        assert!(err.to_string().contains("no base method"));
    }

    #[test]
    fn usage_error_converts_into_top_level() {
        let err: Error = UsageError::OutsideDispatch.into();
        assert!(matches!(err, Error::Usage(UsageError::OutsideDispatch)));
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn advice_error_names_the_advice() {
        let err = Error::advice("audit", "disk full");
        assert_eq!(err.to_string(), "Advice 'audit' failed: disk full");
    }
}
