/// Field carrying the shared secret.
pub const KEY_FIELD: &str = "key";
/// Field whose presence turns the redirect into a plain-text reply.
pub const NO_REDIRECT_FIELD: &str = "noredirect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartKind {
    AuthKey,
    RedirectFlag,
    FilePayload,
    Ignore,
}

/// Classify one multipart part from its field name and file name.
///
/// A `noredirect` part that carries a file is still a file; the caller
/// flips the redirect preference from the field name alone.
pub fn classify(field_name: Option<&str>, file_name: Option<&str>) -> PartKind {
    match field_name {
        Some(KEY_FIELD) => PartKind::AuthKey,
        _ if file_name.is_some_and(|it| !it.is_empty()) => PartKind::FilePayload,
        Some(NO_REDIRECT_FIELD) => PartKind::RedirectFlag,
        _ => PartKind::Ignore,
    }
}

pub fn is_redirect_flag(field_name: Option<&str>) -> bool {
    field_name == Some(NO_REDIRECT_FIELD)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify() {
        assert_eq!(classify(Some("key"), None), PartKind::AuthKey);
        assert_eq!(classify(Some("key"), Some("a.txt")), PartKind::AuthKey);
        assert_eq!(classify(Some("noredirect"), None), PartKind::RedirectFlag);
        assert_eq!(classify(Some("noredirect"), Some("")), PartKind::RedirectFlag);
        assert_eq!(
            classify(Some("noredirect"), Some("a.txt")),
            PartKind::FilePayload
        );
        assert_eq!(classify(Some("file"), Some("a.txt")), PartKind::FilePayload);
        assert_eq!(classify(None, Some("a.txt")), PartKind::FilePayload);
        assert_eq!(classify(Some("file"), Some("")), PartKind::Ignore);
        assert_eq!(classify(Some("comment"), None), PartKind::Ignore);
        assert_eq!(classify(None, None), PartKind::Ignore);
    }

    #[test]
    fn test_is_redirect_flag() {
        assert!(is_redirect_flag(Some("noredirect")));
        assert!(!is_redirect_flag(Some("file")));
        assert!(!is_redirect_flag(None));
    }

    #[test]
    fn test_field_names_are_case_sensitive() {
        assert_eq!(classify(Some("Key"), None), PartKind::Ignore);
        assert_eq!(classify(Some("NOREDIRECT"), None), PartKind::Ignore);
    }
}
