use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use vocad_gen::GenError;
use vocad_speech::SpeechError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
}

/// JSON error envelope. The trace is only populated in debug mode.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorBody {
                error: message.into(),
                trace: None,
            },
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// Missing external credential: explicit "not configured", never a crash.
    pub fn not_configured(credential: &str) -> Self {
        Self::new(
            StatusCode::NOT_IMPLEMENTED,
            format!("{credential} not configured"),
        )
    }

    pub fn from_gen(err: GenError, debug: bool) -> Self {
        let status = match &err {
            GenError::NotConfigured(_) => StatusCode::NOT_IMPLEMENTED,
            GenError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            GenError::NotFound => StatusCode::NOT_FOUND,
            GenError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GenError::GenerationFailed | GenError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            body: ErrorBody {
                error: err.to_string(),
                trace: debug.then(|| format!("{err:?}")),
            },
        }
    }

    pub fn from_speech(err: SpeechError, debug: bool) -> Self {
        Self {
            status: StatusCode::BAD_GATEWAY,
            body: ErrorBody {
                error: err.to_string(),
                trace: debug.then(|| format!("{err:?}")),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen_errors_map_to_expected_statuses() {
        let cases = [
            (GenError::NotConfigured("X"), StatusCode::NOT_IMPLEMENTED),
            (GenError::InvalidArgument("y"), StatusCode::BAD_REQUEST),
            (GenError::NotFound, StatusCode::NOT_FOUND),
            (GenError::Upstream("z".into()), StatusCode::BAD_GATEWAY),
            (GenError::GenerationFailed, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from_gen(err, false).status, status);
        }
    }

    #[test]
    fn trace_only_in_debug_mode() {
        assert!(ApiError::from_gen(GenError::NotFound, false).body.trace.is_none());
        assert!(ApiError::from_gen(GenError::NotFound, true).body.trace.is_some());
    }
}
