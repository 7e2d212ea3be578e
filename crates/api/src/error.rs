use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rebalancer_core::error::{AnalysisError, TransportError};
use serde::Serialize;

#[derive(Debug)]
pub enum ApiError {
    SessionNotFound,
    NotConfigured,
    BadRequest(String),
    PayloadTooLarge { limit: usize },
    Analysis(AnalysisError),
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub category: &'static str,
    pub message: String,
    pub guidance: &'static str,
}

impl From<AnalysisError> for ApiError {
    fn from(value: AnalysisError) -> Self {
        ApiError::Analysis(value)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound => StatusCode::NOT_FOUND,
            ApiError::NotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::Analysis(err) => match err {
                AnalysisError::UnsupportedFormat { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                AnalysisError::Transport(TransportError::Auth { .. }) => StatusCode::UNAUTHORIZED,
                AnalysisError::Transport(TransportError::Timeout { .. }) => {
                    StatusCode::GATEWAY_TIMEOUT
                }
                AnalysisError::Transport(_)
                | AnalysisError::MalformedResponse { .. }
                | AnalysisError::Validation(_) => StatusCode::BAD_GATEWAY,
            },
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            ApiError::SessionNotFound => ErrorBody {
                category: "session",
                message: "Session not found or expired.".to_string(),
                guidance: "Start a new session and upload your portfolio again.",
            },
            ApiError::NotConfigured => ErrorBody {
                category: "configuration",
                message: "Cannot proceed without a configured Gemini API key.".to_string(),
                guidance: "Set GEMINI_API_KEY for the service and restart it.",
            },
            ApiError::BadRequest(msg) => ErrorBody {
                category: "bad_request",
                message: msg.clone(),
                guidance: "Provide a portfolio file and a risk profile (conservative, moderate or aggressive).",
            },
            ApiError::PayloadTooLarge { limit } => ErrorBody {
                category: "payload_too_large",
                message: format!("The upload exceeds the {} size limit.", human_size(*limit)),
                guidance: "Upload a smaller file, for example a trimmed CSV or a cropped screenshot.",
            },
            ApiError::Analysis(err) => ErrorBody {
                category: err.category(),
                message: err.to_string(),
                guidance: err.guidance(),
            },
        }
    }
}

fn human_size(bytes: usize) -> String {
    const KIB: usize = 1024;
    const MIB: usize = 1024 * KIB;
    match bytes {
        b if b >= MIB && b % MIB == 0 => format!("{} MiB", b / MIB),
        b if b >= KIB && b % KIB == 0 => format!("{} KiB", b / KIB),
        b => format!("{b} bytes"),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Analysis(err) = &self {
            if err.is_user_correctable() {
                tracing::info!(category = err.category(), error = %err, "analysis rejected");
            } else {
                tracing::warn!(category = err.category(), error = %err, "analysis failed");
                sentry::capture_error(err);
            }
        }
        (self.status(), Json(self.body())).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn analysis_errors_map_to_distinct_statuses() {
        let cases = [
            (
                ApiError::from(AnalysisError::unsupported("x.pdf", "nope")),
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
            ),
            (
                ApiError::from(AnalysisError::from(TransportError::Timeout {
                    after: Duration::from_secs(60),
                })),
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                ApiError::from(AnalysisError::from(TransportError::Auth {
                    status: 403,
                    body: String::new(),
                })),
                StatusCode::UNAUTHORIZED,
            ),
            (ApiError::NotConfigured, StatusCode::SERVICE_UNAVAILABLE),
            (
                ApiError::PayloadTooLarge { limit: 1024 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (ApiError::SessionNotFound, StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err:?}");
        }
    }

    #[test]
    fn body_carries_category_and_guidance() {
        let body = ApiError::from(AnalysisError::MalformedResponse {
            detail: "expected value".into(),
            raw_output: "garbage".into(),
        })
        .body();
        assert_eq!(body.category, "malformed_response");
        assert!(!body.message.contains("garbage"));
        assert!(body.guidance.contains("again"));
    }

    #[test]
    fn size_limit_is_reported_in_readable_units() {
        let message = |limit| ApiError::PayloadTooLarge { limit }.body().message;
        assert!(message(10 * 1024 * 1024).contains("10 MiB"));
        assert!(message(512 * 1024).contains("512 KiB"));
        assert!(message(64).contains("64 bytes"));
    }
}
