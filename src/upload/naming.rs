use crate::common::InternalError;
use rand::TryRngCore;
use rand::rngs::OsRng;

/// Build a file name from `length` bytes of OS randomness, hex encoded,
/// followed by `suffix` as given.
///
/// A failing random source is reported as an error; there is no fallback
/// to a weaker generator.
pub fn generate_name(length: usize, suffix: &str) -> Result<String, InternalError> {
    let mut bytes = vec![0u8; length];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|_| InternalError::RandomSourceError)?;
    let mut name = hex::encode(bytes);
    name.push_str(suffix);
    Ok(name)
}

/// The extension of an uploaded file name including the leading dot, or an
/// empty string. Only the final component of the name is considered.
pub fn extension_of(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.rfind('.') {
        Some(index) => base[index..].to_string(),
        None => String::new(),
    }
}
