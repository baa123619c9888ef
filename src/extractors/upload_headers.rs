use crate::common::ApiError;
use axum::extract::FromRequestParts;
use axum::http::HeaderMap;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;

const FORM_DATA: &str = "multipart/form-data";

/// Headers an upload needs before its body is read.
#[derive(Debug, Clone)]
pub struct UploadHeaders {
    pub boundary: String,
    /// Declared body size, absent for chunked bodies.
    pub content_length: Option<u64>,
}

impl UploadHeaders {
    pub fn try_from_headers(headers: &HeaderMap) -> Result<Self, ApiError> {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|it| it.to_str().ok())
            .unwrap_or_default();
        let is_form_data = content_type
            .split(';')
            .next()
            .is_some_and(|it| it.trim().eq_ignore_ascii_case(FORM_DATA));
        if !is_form_data {
            return Err(ApiError::bad_request(
                "Expected a multipart/form-data request body",
            ));
        }
        let boundary = multer::parse_boundary(content_type)
            .map_err(|err| ApiError::bad_request(format!("Malformed multipart body: {err}")))?;
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|it| it.to_str().ok())
            .and_then(|it| it.parse::<u64>().ok());
        Ok(Self {
            boundary,
            content_length,
        })
    }
}

impl<S> FromRequestParts<S> for UploadHeaders
where
    S: Send + Sync,
{
    type Rejection = ApiError;
    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Self::try_from_headers(&parts.headers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(content_type: &str, length: Option<&str>) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert(CONTENT_TYPE, HeaderValue::from_str(content_type).unwrap());
        if let Some(length) = length {
            map.insert(CONTENT_LENGTH, HeaderValue::from_str(length).unwrap());
        }
        map
    }

    #[test]
    fn test_form_data() {
        let parsed = UploadHeaders::try_from_headers(&headers(
            "multipart/form-data; boundary=abc123",
            Some("42"),
        ))
        .unwrap();
        assert_eq!(parsed.boundary, "abc123");
        assert_eq!(parsed.content_length, Some(42));
    }

    #[test]
    fn test_chunked_body() {
        let parsed = UploadHeaders::try_from_headers(&headers(
            "Multipart/Form-Data; boundary=\"quoted\"",
            None,
        ))
        .unwrap();
        assert_eq!(parsed.boundary, "quoted");
        assert_eq!(parsed.content_length, None);
    }

    #[test]
    fn test_rejects_other_types() {
        assert!(UploadHeaders::try_from_headers(&headers("application/json", None)).is_err());
        assert!(
            UploadHeaders::try_from_headers(&headers("multipart/mixed; boundary=x", None))
                .is_err()
        );
        assert!(UploadHeaders::try_from_headers(&headers("multipart/form-data", None)).is_err());
        assert!(UploadHeaders::try_from_headers(&HeaderMap::new()).is_err());
    }
}
