mod upload_headers;

pub use upload_headers::UploadHeaders;
