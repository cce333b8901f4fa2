//! Error types for the cleaning engine.
//!
//! Every fallible operation in the crate returns [`CleanerError`]. Errors are
//! serializable as `{ code, message }` so callers (CLI, orchestration layer)
//! can report them without matching on variants.
//!
//! Dirty cell values never produce errors: malformed literals and unparseable
//! dates map to sentinels. Errors are reserved for malformed action
//! descriptions and for data that cannot support the requested operation.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the cleaning engine.
#[derive(Error, Debug)]
pub enum CleanerError {
    /// Pipeline was cancelled by the caller.
    #[error("Pipeline cancelled")]
    Cancelled,

    /// Column was not found in the table.
    #[error("Column '{0}' not found in dataset")]
    ColumnNotFound(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An action needs an option that the description does not carry.
    #[error("Action '{action}' requires option '{option}'")]
    MissingOption { action: String, option: String },

    /// An action option is present but cannot be used.
    #[error("Action '{action}' has invalid option '{option}': {reason}")]
    InvalidOption {
        action: String,
        option: String,
        reason: String,
    },

    /// Imputation strategy is unknown and no literal fill value was given.
    #[error("Column '{column}' has no valid strategy: '{strategy}'")]
    UnsupportedStrategy { column: String, strategy: String },

    /// An option value is recognized but not implemented (e.g. `date_trunc` by month).
    #[error("Unsupported {option} '{value}' for '{action}'")]
    UnsupportedOption {
        action: String,
        option: String,
        value: String,
    },

    /// Random imputation found nothing to sample from.
    #[error("No donor values to sample from in column '{0}'")]
    NoDonorValues(String),

    /// Query text could not be parsed.
    #[error("Query syntax error at position {position}: {message}")]
    QuerySyntax { position: usize, message: String },

    /// Type conversion failed.
    #[error("Failed to convert column '{column}' to {target_type}: {reason}")]
    TypeConversionFailed {
        column: String,
        target_type: String,
        reason: String,
    },

    /// A `custom` action ran with no executor registered.
    #[error("No custom action executor registered")]
    CustomActionUnavailable,

    /// User-supplied transformation code failed.
    #[error("Custom action failed: {0}")]
    CustomActionFailed(String),

    /// Internal error (e.g., thread pool construction failure).
    #[error("Internal error: {0}")]
    Internal(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CleanerError>,
    },
}

impl CleanerError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        CleanerError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Shorthand for [`CleanerError::MissingOption`].
    pub fn missing_option(action: impl Into<String>, option: impl Into<String>) -> Self {
        Self::MissingOption {
            action: action.into(),
            option: option.into(),
        }
    }

    /// Shorthand for [`CleanerError::InvalidOption`].
    pub fn invalid_option(
        action: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidOption {
            action: action.into(),
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Get a stable error code for callers.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Cancelled => "CANCELLED",
            Self::ColumnNotFound(_) => "COLUMN_NOT_FOUND",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::MissingOption { .. } => "MISSING_OPTION",
            Self::InvalidOption { .. } => "INVALID_OPTION",
            Self::UnsupportedStrategy { .. } => "UNSUPPORTED_STRATEGY",
            Self::UnsupportedOption { .. } => "UNSUPPORTED_OPTION",
            Self::NoDonorValues(_) => "NO_DONOR_VALUES",
            Self::QuerySyntax { .. } => "QUERY_SYNTAX",
            Self::TypeConversionFailed { .. } => "TYPE_CONVERSION_FAILED",
            Self::CustomActionUnavailable => "CUSTOM_ACTION_UNAVAILABLE",
            Self::CustomActionFailed(_) => "CUSTOM_ACTION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error represents a cancellation.
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::Cancelled => true,
            Self::WithContext { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }

    /// Whether the caller can fix this by editing the action description.
    pub fn is_configuration_error(&self) -> bool {
        match self {
            Self::InvalidConfig(_)
            | Self::MissingOption { .. }
            | Self::InvalidOption { .. }
            | Self::UnsupportedStrategy { .. }
            | Self::UnsupportedOption { .. }
            | Self::QuerySyntax { .. }
            | Self::ColumnNotFound(_) => true,
            Self::WithContext { source, .. } => source.is_configuration_error(),
            _ => false,
        }
    }
}

impl Serialize for CleanerError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("CleanerError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for cleaning operations.
pub type Result<T> = std::result::Result<T, CleanerError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| CleanerError::Polars(e).with_context(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(CleanerError::Cancelled.error_code(), "CANCELLED");
        assert_eq!(
            CleanerError::NoDonorValues("age".to_string()).error_code(),
            "NO_DONOR_VALUES"
        );
    }

    #[test]
    fn test_missing_option_names_action_and_option() {
        let error = CleanerError::missing_option("string_replace", "pattern");
        let message = error.to_string();
        assert!(message.contains("string_replace"));
        assert!(message.contains("pattern"));
        assert!(error.is_configuration_error());
    }

    #[test]
    fn test_unsupported_strategy_message() {
        let error = CleanerError::UnsupportedStrategy {
            column: "age".to_string(),
            strategy: "magic".to_string(),
        };
        assert!(error.to_string().contains("no valid strategy"));
    }

    #[test]
    fn test_error_serialization() {
        let error = CleanerError::ColumnNotFound("Age".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("COLUMN_NOT_FOUND"));
        assert!(json.contains("Age"));
    }

    #[test]
    fn test_with_context_preserves_code() {
        let error = CleanerError::Cancelled.with_context("During transform");
        assert!(error.to_string().contains("During transform"));
        assert_eq!(error.error_code(), "CANCELLED");
        assert!(error.is_cancelled());
    }
}
