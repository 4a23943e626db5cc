use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized - token may be expired")]
    Unauthorized,

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unexpected API error (code {status})")]
    Status { status: u16, message: Option<String> },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Wait timeout, {0} seconds elapsed")]
    WaitTimeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

impl ApiError {
    /// Truncate a response body to avoid dumping excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            format!(
                "{}... (truncated, {} total bytes)",
                &body[..MAX_ERROR_BODY_LENGTH],
                body.len()
            )
        }
    }

    /// Map a non-success status and its (optional) JSON body to an error.
    ///
    /// The service wraps messages as `{"error":{"message":...}}`; anything
    /// else is quoted truncated.
    pub fn from_status(status: reqwest::StatusCode, body: Option<&serde_json::Value>) -> Self {
        let message = body.and_then(|body| {
            body.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(|m| m.to_string())
                .or_else(|| Some(Self::truncate_body(&body.to_string())))
        });

        match status.as_u16() {
            401 => ApiError::Unauthorized,
            403 => ApiError::AccessDenied(message.unwrap_or_default()),
            404 => ApiError::NotFound(message.unwrap_or_default()),
            _ => ApiError::Status {
                status: status.as_u16(),
                message,
            },
        }
    }

    /// Server-reported message, for variants whose display omits it.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Status { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_from_status_maps_common_codes() {
        assert!(matches!(
            ApiError::from_status(StatusCode::UNAUTHORIZED, None),
            ApiError::Unauthorized
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::NOT_FOUND, None),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, None),
            ApiError::Status { status: 500, .. }
        ));
    }

    #[test]
    fn test_from_status_extracts_error_message() {
        let body = serde_json::json!({"error": {"message": "report expired"}});
        let err = ApiError::from_status(StatusCode::GONE, Some(&body));
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 410);
                assert_eq!(message.as_deref(), Some("report expired"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_truncate_body_limits_length() {
        let long = "x".repeat(2_000);
        let truncated = ApiError::truncate_body(&long);
        assert!(truncated.len() < 600);
        assert!(truncated.contains("truncated"));
    }
}
