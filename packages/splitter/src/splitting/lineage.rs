//! Lineage generation from path-like identifiers.

/// Separator between path segments of an identifier.
pub const LINEAGE_SEPARATOR: char = '/';

/// Generate the ancestor paths of an identifier, most specific last.
///
/// The identifier is treated as a `/`-separated path. Empty segments
/// (leading, trailing or doubled separators) are skipped, so `"/a//b/"`
/// yields the same lineage as `"a/b"`.
///
/// # Examples
/// ```
/// use lineage_splitter::splitting::generate_lineage;
///
/// assert_eq!(generate_lineage("a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
/// assert_eq!(generate_lineage("solo"), vec!["/solo"]);
/// assert!(generate_lineage("").is_empty());
/// ```
pub fn generate_lineage(id: &str) -> Vec<String> {
    let mut lineage = Vec::new();
    let mut prefix = String::new();

    for segment in id.split(LINEAGE_SEPARATOR).filter(|s| !s.is_empty()) {
        prefix.push(LINEAGE_SEPARATOR);
        prefix.push_str(segment);
        lineage.push(prefix.clone());
    }

    lineage
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_entry_extends_the_previous() {
        let lineage = generate_lineage("root/folder/sub/file.pdf");
        assert_eq!(lineage.len(), 4);
        for pair in lineage.windows(2) {
            assert!(pair[1].starts_with(&pair[0]));
        }
        assert_eq!(lineage.last().unwrap(), "/root/folder/sub/file.pdf");
    }

    #[test]
    fn test_empty_segments_are_skipped() {
        assert_eq!(generate_lineage("/a//b/"), vec!["/a", "/a/b"]);
        assert!(generate_lineage("///").is_empty());
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(generate_lineage("x/y"), generate_lineage("x/y"));
    }
}
