use crate::common::InternalError;
use anyhow::Context;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncWriteExt, BufWriter};

/// Capacity of the buffer between the request stream and the disk.
pub const TRANSFER_BUFFER_SIZE: usize = 1 << 20;

/// A file being written for the current request.
///
/// The file is removed when the guard is dropped unless [`commit`] was
/// called, so an aborted or cancelled request leaves nothing behind.
///
/// [`commit`]: PendingFile::commit
#[derive(Debug)]
pub struct PendingFile {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<fs::File>>,
    written: u64,
    committed: bool,
}

impl PendingFile {
    /// Create `dir/name`, failing if it already exists.
    pub async fn create(dir: &Path, name: String) -> anyhow::Result<Self> {
        let path = dir.join(&name);
        let file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .with_context(|| InternalError::CreateFileError { path: path.clone() })?;
        Ok(Self {
            name,
            path,
            writer: Some(BufWriter::with_capacity(TRANSFER_BUFFER_SIZE, file)),
            written: 0,
            committed: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn write(&mut self, chunk: &[u8]) -> anyhow::Result<()> {
        let Some(writer) = self.writer.as_mut() else {
            anyhow::bail!(InternalError::WriteFileError {
                path: self.path.clone()
            });
        };
        writer
            .write_all(chunk)
            .await
            .with_context(|| InternalError::WriteFileError {
                path: self.path.clone(),
            })?;
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Flush buffered bytes and close the handle.
    pub async fn finish(&mut self) -> anyhow::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .shutdown()
                .await
                .with_context(|| InternalError::WriteFileError {
                    path: self.path.clone(),
                })?;
        }
        Ok(())
    }

    /// Keep the file on disk.
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        drop(self.writer.take());
        // Drop cannot await, so this single unlink runs synchronously
        match std::fs::remove_file(&self.path) {
            Ok(_) => tracing::debug!("removed unfinished upload {:?}", self.path),
            Err(err) => tracing::error!(
                reason = ?err,
                "{}",
                InternalError::DeleteFileError {
                    path: self.path.clone()
                }
            ),
        }
    }
}
