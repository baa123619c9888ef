use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum InternalError {
    #[error("Failed to read bytes from the system random source")]
    RandomSourceError,

    #[error("Failed to create file {path:?}")]
    CreateFileError { path: PathBuf },

    #[error("Failed to write to file {path:?}")]
    WriteFileError { path: PathBuf },

    #[error("Failed to delete file {path:?}")]
    DeleteFileError { path: PathBuf },
}
