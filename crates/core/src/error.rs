use std::time::Duration;
use thiserror::Error;

/// Everything the analysis action can fail with.
///
/// Each variant maps to one user-facing category; drivers render
/// [`AnalysisError::category`] and [`AnalysisError::guidance`] next to the
/// error message instead of letting the error escape the session.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("unsupported file '{file_name}': {reason}")]
    UnsupportedFormat { file_name: String, reason: String },

    #[error("model request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("model response is not valid JSON: {detail}")]
    MalformedResponse {
        detail: String,
        raw_output: String,
    },

    #[error("model response does not match the report schema: {0}")]
    Validation(#[from] ValidationError),
}

impl AnalysisError {
    pub fn unsupported(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UnsupportedFormat {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => "unsupported_format",
            Self::Transport(_) => "transport",
            Self::MalformedResponse { .. } => "malformed_response",
            Self::Validation(_) => "validation",
        }
    }

    pub fn guidance(&self) -> &'static str {
        match self {
            Self::UnsupportedFormat { .. } => {
                "Upload an .xlsx or .csv file, or a .png/.jpg screenshot of your portfolio."
            }
            Self::Transport(TransportError::Timeout { .. }) => {
                "The AI service took too long to answer. Check your connection and try again."
            }
            Self::Transport(_) => {
                "Common issues include an incorrect API key or network problems. Please verify your key and try again."
            }
            Self::MalformedResponse { .. } | Self::Validation(_) => {
                "The AI returned an incomplete analysis. Please run the analysis again."
            }
        }
    }

    pub fn is_user_correctable(&self) -> bool {
        matches!(self, Self::UnsupportedFormat { .. } | Self::Transport(_))
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out after {}s", after.as_secs())]
    Timeout { after: Duration },

    #[error("could not connect to the model endpoint: {0}")]
    Connect(String),

    #[error("model endpoint rejected the credentials (status {status}): {body}")]
    Auth { status: u16, body: String },

    #[error("model endpoint returned status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("{0}")]
    Request(String),
}

/// A structured description of where a model response departs from the
/// report schema. Field paths are dotted (`recommendations.summary`).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("response must be a JSON object")]
    NotAnObject,

    #[error("missing required field `{field}`")]
    MissingField { field: String },

    #[error("field `{field}` must be {expected}")]
    WrongType {
        field: String,
        expected: &'static str,
    },

    #[error("sector_allocation[{index}] is invalid: {reason}")]
    BadSectorEntry { index: usize, reason: String },

    #[error("recommendations.action_items[{index}] must be a string")]
    BadActionItem { index: usize },

    #[error("recommendations.{field}[{index}] is invalid: {reason}")]
    BadSuggestion {
        field: &'static str,
        index: usize,
        reason: String,
    },
}

impl ValidationError {
    /// The offending field path, for diagnostics.
    pub fn field(&self) -> String {
        match self {
            Self::NotAnObject => "$".to_string(),
            Self::MissingField { field } | Self::WrongType { field, .. } => field.clone(),
            Self::BadSectorEntry { index, .. } => format!("sector_allocation[{index}]"),
            Self::BadActionItem { index } => format!("recommendations.action_items[{index}]"),
            Self::BadSuggestion { field, index, .. } => format!("recommendations.{field}[{index}]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_are_stable_and_distinct() {
        let errs = [
            AnalysisError::unsupported("a.pdf", "not supported"),
            TransportError::Connect("refused".into()).into(),
            AnalysisError::MalformedResponse {
                detail: "eof".into(),
                raw_output: String::new(),
            },
            ValidationError::NotAnObject.into(),
        ];
        let cats: Vec<_> = errs.iter().map(|e| e.category()).collect();
        assert_eq!(
            cats,
            ["unsupported_format", "transport", "malformed_response", "validation"]
        );
    }

    #[test]
    fn only_input_and_transport_errors_are_user_correctable() {
        assert!(AnalysisError::unsupported("a.txt", "x").is_user_correctable());
        assert!(AnalysisError::from(TransportError::Timeout {
            after: Duration::from_secs(60)
        })
        .is_user_correctable());
        assert!(!AnalysisError::from(ValidationError::NotAnObject).is_user_correctable());
    }

    #[test]
    fn timeout_message_names_the_duration() {
        let err = TransportError::Timeout {
            after: Duration::from_secs(60),
        };
        assert_eq!(err.to_string(), "request timed out after 60s");
    }

    #[test]
    fn validation_field_paths() {
        let err = ValidationError::BadSuggestion {
            field: "suggested_etfs",
            index: 2,
            reason: "ticker must be non-empty".into(),
        };
        assert_eq!(err.field(), "recommendations.suggested_etfs[2]");
    }
}
