//! Utility functions shared across crates.

/// Reduce an uploaded filename to a safe scratch filename.
///
/// Keeps ASCII alphanumerics plus `.`, `_` and `-`, then lower-cases the
/// result. Path separators and any other characters are dropped, so the
/// output can never leave the scratch directory.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        .collect::<String>()
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_keeps_safe_subset() {
        assert_eq!(sanitize_filename("Cat Photo (1).JPG"), "catphoto1.jpg");
        assert_eq!(sanitize_filename("my_clip-02.mp4"), "my_clip-02.mp4");
    }

    #[test]
    fn test_sanitize_strips_separators() {
        assert_eq!(sanitize_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(sanitize_filename("C:\\uploads\\x.png"), "cuploadsx.png");
        assert!(!sanitize_filename("a/b\\c").contains(['/', '\\']));
    }

    #[test]
    fn test_sanitize_drops_non_ascii() {
        assert_eq!(sanitize_filename("tigre_ñ.jpg"), "tigre_.jpg");
        assert_eq!(sanitize_filename("🐅"), "");
    }
}
