use super::naming::{extension_of, generate_name};
use super::part::{KEY_FIELD, PartKind, classify, is_redirect_flag};
use super::pending_file::PendingFile;
use super::response::UploadOutcome;
use crate::common::{ApiError, ApiResult};
use crate::config::UploadConfig;
use axum::body::Bytes;
use futures::Stream;
use multer::{Constraints, Field, Multipart, SizeLimit};
use std::path::Path;

pub const BAD_KEY: &str = "Bad key";
pub const NO_KEY: &str = "No key provided as first field";
pub const NO_FILE: &str = "No file uploaded";

/// Upper bound for the in-memory key value.
const KEY_VALUE_LIMIT: u64 = 1024;

/// Per-request progress. Only the two open states read further parts;
/// `Aborted` and `Completed` end the request.
#[derive(Debug)]
enum PipelineState {
    AwaitingKey,
    KeyAccepted,
    Aborted(ApiError),
    Completed,
}

/// What the request has produced so far.
struct UploadSession {
    redirect: bool,
    stored: Vec<PendingFile>,
}

impl UploadSession {
    fn new() -> Self {
        Self {
            redirect: true,
            stored: Vec::new(),
        }
    }

    fn complete(self, public_root: &str) -> ApiResult<UploadOutcome> {
        let UploadSession { redirect, stored } = self;
        if stored.is_empty() {
            return Err(ApiError::bad_request(NO_FILE));
        }
        let paths = stored
            .into_iter()
            .map(|file| {
                let path = format!("{}{}", public_root, file.name());
                file.commit();
                path
            })
            .collect();
        Ok(UploadOutcome { paths, redirect })
    }
}

pub struct UploadPipeline<'a> {
    config: &'a UploadConfig,
    storage_dir: &'a Path,
}

impl<'a> UploadPipeline<'a> {
    pub fn new(config: &'a UploadConfig, storage_dir: &'a Path) -> Self {
        Self {
            config,
            storage_dir,
        }
    }

    fn constraints(&self) -> Constraints {
        let key_limit = KEY_VALUE_LIMIT.max(self.config.key.len() as u64);
        Constraints::new().size_limit(
            SizeLimit::new()
                .whole_stream(self.config.max_upload_bytes())
                .for_field(KEY_FIELD, key_limit),
        )
    }

    /// Consume a multipart body part by part and store every file it
    /// carries.
    ///
    /// The key must arrive before the first file. Any failure removes the
    /// files this request already wrote.
    pub async fn process<S, O, E>(&self, stream: S, boundary: &str) -> ApiResult<UploadOutcome>
    where
        S: Stream<Item = Result<O, E>> + Send + 'static,
        O: Into<Bytes> + 'static,
        E: Into<Box<dyn std::error::Error + Send + Sync>> + 'static,
    {
        let mut multipart = Multipart::with_constraints(stream, boundary, self.constraints());
        let mut session = UploadSession::new();
        let mut state = PipelineState::AwaitingKey;
        loop {
            state = match state {
                PipelineState::Completed => {
                    return session.complete(&self.config.public_root);
                }
                PipelineState::Aborted(err) => return Err(err),
                open => match multipart.next_field().await {
                    Ok(Some(field)) => self.advance(open, field, &mut session).await,
                    Ok(None) => PipelineState::Completed,
                    Err(err) => PipelineState::Aborted(self.reject(err)),
                },
            };
        }
    }

    async fn advance(
        &self,
        state: PipelineState,
        field: Field<'_>,
        session: &mut UploadSession,
    ) -> PipelineState {
        if is_redirect_flag(field.name()) {
            session.redirect = false;
        }
        match classify(field.name(), field.file_name()) {
            PartKind::AuthKey => match field.bytes().await {
                Ok(value) if self.key_matches(&value) => PipelineState::KeyAccepted,
                Ok(_) => PipelineState::Aborted(ApiError::Unauthorized(BAD_KEY)),
                Err(err) => PipelineState::Aborted(self.reject(err)),
            },
            PartKind::RedirectFlag | PartKind::Ignore => state,
            PartKind::FilePayload => match state {
                PipelineState::KeyAccepted => match self.store(field).await {
                    Ok(file) => {
                        session.stored.push(file);
                        state
                    }
                    Err(err) => PipelineState::Aborted(err),
                },
                _ => PipelineState::Aborted(ApiError::Unauthorized(NO_KEY)),
            },
        }
    }

    async fn store(&self, mut field: Field<'_>) -> ApiResult<PendingFile> {
        let suffix = extension_of(field.file_name().unwrap_or_default());
        if suffix.chars().any(char::is_control) {
            return Err(ApiError::bad_request("Invalid file name"));
        }
        let name = generate_name(self.config.filename_length, &suffix)?;
        let mut file = PendingFile::create(self.storage_dir, name).await?;
        while let Some(chunk) = field.chunk().await.map_err(|err| self.reject(err))? {
            file.write(&chunk).await?;
        }
        file.finish().await?;
        tracing::info!("Uploaded {}, {} KB", file.name(), file.written() >> 10);
        Ok(file)
    }

    /// Byte-for-byte comparison that does not stop at the first mismatch.
    fn key_matches(&self, value: &[u8]) -> bool {
        let expected = self.config.key.as_bytes();
        value.len() == expected.len()
            && value
                .iter()
                .zip(expected)
                .fold(0u8, |acc, (a, b)| acc | (a ^ b))
                == 0
    }

    fn reject(&self, err: multer::Error) -> ApiError {
        match err {
            multer::Error::StreamSizeExceeded { .. } => ApiError::PayloadTooLarge {
                limit_mb: self.config.max_upload_size_mb,
            },
            // an oversized key can never equal the secret
            multer::Error::FieldSizeExceeded { .. } => ApiError::Unauthorized(BAD_KEY),
            multer::Error::StreamReadFailed(err) => {
                tracing::debug!(reason = ?err, "request body stream failed");
                ApiError::bad_request("Failed to read request body")
            }
            err => ApiError::bad_request(format!("Malformed multipart body: {err}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::test_support::{BOUNDARY, Part, multipart_body};
    use std::path::PathBuf;

    fn config() -> UploadConfig {
        UploadConfig {
            key: "s3cret".to_string(),
            public_root: "https://files.example.com/".to_string(),
            filename_length: 8,
            max_upload_size_mb: 1,
        }
    }

    fn chunked(body: Vec<u8>) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send {
        let size = (body.len() / 16).max(7);
        let chunks = body
            .chunks(size)
            .map(|it| Ok(Bytes::copy_from_slice(it)))
            .collect::<Vec<_>>();
        futures::stream::iter(chunks)
    }

    async fn run(dir: &Path, config: &UploadConfig, body: Vec<u8>) -> ApiResult<UploadOutcome> {
        UploadPipeline::new(config, dir)
            .process(chunked(body), BOUNDARY)
            .await
    }

    fn stored_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|it| it.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn test_store_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = config();
        let body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::File("file", "holiday.jpg", b"\xff\xd8jpeg bytes"),
        ]);
        let outcome = run(dir.path(), &config, body).await.unwrap();
        assert!(outcome.redirect);
        assert_eq!(outcome.paths.len(), 1);
        let location = outcome.location().unwrap();
        let name = location.strip_prefix("https://files.example.com/").unwrap();
        assert_eq!(name.len(), 16 + ".jpg".len());
        assert!(name.ends_with(".jpg"));
        let content = std::fs::read(dir.path().join(name)).unwrap();
        assert_eq!(content, b"\xff\xd8jpeg bytes");
    }

    #[tokio::test]
    async fn test_noredirect_after_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::File("file", "notes.txt", b"notes"),
            Part::Field("noredirect", "1"),
        ]);
        let outcome = run(dir.path(), &config(), body).await.unwrap();
        assert!(!outcome.redirect);
    }

    #[tokio::test]
    async fn test_noredirect_part_with_file_is_stored() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::File("noredirect", "a.txt", b"hello"),
        ]);
        let outcome = run(dir.path(), &config(), body).await.unwrap();
        assert!(!outcome.redirect);
        assert_eq!(outcome.paths.len(), 1);
        let files = stored_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with(".txt"));
        assert_eq!(std::fs::read(&files[0]).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_file_before_key() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            Part::File("file", "notes.txt", b"notes"),
            Part::Field("key", "s3cret"),
        ]);
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(NO_KEY)));
        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[Part::File("file", "notes.txt", b"notes")]);
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(NO_KEY)));
    }

    #[tokio::test]
    async fn test_bad_key() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            Part::Field("key", "guess"),
            Part::File("file", "notes.txt", b"notes"),
        ]);
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(BAD_KEY)));
        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_bad_key_stops_reading() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = multipart_body(&[Part::Field("key", "guess")]);
        // a following part with broken headers fails only if it is parsed
        body.truncate(body.len() - format!("--{BOUNDARY}--\r\n").len());
        body.extend_from_slice(format!("--{BOUNDARY}\r\nthis is not a header\r\n\r\n").as_bytes());
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(BAD_KEY)));
    }

    #[tokio::test]
    async fn test_second_key_mismatch_removes_earlier_files() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::File("file", "one.txt", b"first"),
            Part::Field("key", "wrong"),
            Part::File("file", "two.txt", b"second"),
        ]);
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(BAD_KEY)));
        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_oversized_key() {
        let dir = tempfile::tempdir().unwrap();
        let long_key = "k".repeat(4096);
        let body = multipart_body(&[
            Part::Field("key", &long_key),
            Part::File("file", "notes.txt", b"notes"),
        ]);
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(BAD_KEY)));
    }

    #[tokio::test]
    async fn test_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::Field("comment", "nothing attached"),
            Part::File("file", "", b""),
        ]);
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(&err, ApiError::BadRequest(message) if message == NO_FILE));
    }

    #[tokio::test]
    async fn test_multiple_files() {
        let dir = tempfile::tempdir().unwrap();
        let body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::File("a", "one.txt", b"first"),
            Part::File("b", "two.md", b"second"),
        ]);
        let outcome = run(dir.path(), &config(), body).await.unwrap();
        assert_eq!(outcome.paths.len(), 2);
        assert!(outcome.paths[0].ends_with(".txt"));
        assert!(outcome.paths[1].ends_with(".md"));
        assert_eq!(outcome.location(), Some(outcome.paths[1].as_str()));
        assert_eq!(stored_files(dir.path()).len(), 2);
    }

    #[tokio::test]
    async fn test_body_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let content = vec![b'x'; 2 << 20];
        let body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::File("file", "big.bin", &content),
        ]);
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::PayloadTooLarge { limit_mb: 1 }));
        assert!(stored_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let dir = tempfile::tempdir().unwrap();
        let body = b"this is not multipart at all".to_vec();
        let err = run(dir.path(), &config(), body).await.unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_interrupted_stream_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut body = multipart_body(&[
            Part::Field("key", "s3cret"),
            Part::File("file", "cut.bin", &[7u8; 4096]),
        ]);
        body.truncate(body.len() - 2048);
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from(body)),
            Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "client went away",
            )),
        ]);
        let config = config();
        let err = UploadPipeline::new(&config, dir.path())
            .process(stream, BOUNDARY)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(stored_files(dir.path()).is_empty());
    }

    #[test]
    fn test_key_matches() {
        let config = config();
        let pipeline = UploadPipeline::new(&config, Path::new("/tmp"));
        assert!(pipeline.key_matches(b"s3cret"));
        assert!(!pipeline.key_matches(b"s3cre"));
        assert!(!pipeline.key_matches(b"s3cret "));
        assert!(!pipeline.key_matches(b"S3CRET"));
        assert!(!pipeline.key_matches(b""));
    }
}
