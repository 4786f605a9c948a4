//! Helpers for cleaning client-supplied names before they reach paths or spans.

const MAX_SEGMENT_LEN: usize = 128;
const FALLBACK_NAME: &str = "upload.csv";

/// Final path component of a client-supplied file name.
///
/// Both `/` and `\` count as separators. Control characters are dropped.
pub fn redact_name(name: &str) -> String {
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// True when `value` can be used verbatim as one directory name.
pub fn is_safe_segment(value: &str) -> bool {
    !value.is_empty()
        && value.len() <= MAX_SEGMENT_LEN
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Lower-case extension of `name` when it is short and alphanumeric.
pub fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 10 {
        return None;
    }
    if !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// `name` without its extension.
pub fn stem_of(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_name_strips_directories() {
        assert_eq!(redact_name("/home/jane/contacts.csv"), "contacts.csv");
        assert_eq!(redact_name("C:\\Users\\jane\\contacts.csv"), "contacts.csv");
        assert_eq!(redact_name("contacts.csv"), "contacts.csv");
    }

    #[test]
    fn test_redact_name_fallback() {
        assert_eq!(redact_name(""), FALLBACK_NAME);
        assert_eq!(redact_name("../"), FALLBACK_NAME);
        assert_eq!(redact_name(".."), FALLBACK_NAME);
        assert_eq!(redact_name("a\nb.csv"), "ab.csv");
    }

    #[test]
    fn test_safe_segment() {
        assert!(is_safe_segment("user_42-a"));
        assert!(!is_safe_segment(""));
        assert!(!is_safe_segment(".."));
        assert!(!is_safe_segment("a/b"));
        assert!(!is_safe_segment(&"a".repeat(MAX_SEGMENT_LEN + 1)));
    }

    #[test]
    fn test_extension_and_stem() {
        assert_eq!(extension_of("Contacts.CSV").as_deref(), Some("csv"));
        assert_eq!(extension_of("noext"), None);
        assert_eq!(extension_of(".hidden"), None);
        assert_eq!(extension_of("a.c$v"), None);
        assert_eq!(stem_of("contacts.csv"), "contacts");
        assert_eq!(stem_of("archive.tar.gz"), "archive.tar");
        assert_eq!(stem_of("noext"), "noext");
    }
}
