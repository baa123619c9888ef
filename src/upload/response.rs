use crate::common::ApiError;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

/// Result of a request that stored at least one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    /// Public paths of the stored files, in submission order.
    pub paths: Vec<String>,
    pub redirect: bool,
}

impl UploadOutcome {
    /// Redirect target: the last file stored by the request.
    pub fn location(&self) -> Option<&str> {
        self.paths.last().map(String::as_str)
    }
}

impl IntoResponse for UploadOutcome {
    fn into_response(self) -> Response {
        if !self.redirect {
            return (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                self.paths.join("\n"),
            )
                .into_response();
        }
        let Some(location) = self.location() else {
            return ApiError::bad_request("No file uploaded").into_response();
        };
        match HeaderValue::from_str(location) {
            Ok(location) => (StatusCode::FOUND, [(header::LOCATION, location)]).into_response(),
            Err(err) => ApiError::Internal(anyhow::Error::new(err).context(format!(
                "Stored path {location:?} is not a valid Location header"
            )))
            .into_response(),
        }
    }
}
