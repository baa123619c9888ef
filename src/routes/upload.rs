use crate::common::{ApiError, ApiResult};
use crate::extractors::UploadHeaders;
use crate::state::AppState;
use crate::upload::{UploadOutcome, UploadPipeline};
use axum::extract::{Request, State};

/// Store the files of a `multipart/form-data` upload.
pub async fn upload(
    State(state): State<AppState>,
    headers: UploadHeaders,
    request: Request,
) -> ApiResult<UploadOutcome> {
    let config = &state.config;
    // declared oversize bodies are refused before a single byte is read
    if headers
        .content_length
        .is_some_and(|length| length > config.upload.max_upload_bytes())
    {
        return Err(ApiError::PayloadTooLarge {
            limit_mb: config.upload.max_upload_size_mb,
        });
    }
    let stream = request.into_body().into_data_stream();
    UploadPipeline::new(&config.upload, &config.storage.dir)
        .process(stream, &headers.boundary)
        .await
}
