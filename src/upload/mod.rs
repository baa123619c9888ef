//! Multipart upload handling: part classification, random naming, and the
//! streaming pipeline that writes files to the storage directory.

pub mod naming;
pub mod part;
pub mod pending_file;
pub mod pipeline;
pub mod response;

#[cfg(test)]
pub(crate) mod test_support;

pub use pipeline::UploadPipeline;
pub use response::UploadOutcome;
