//! Consumer side of the delete log.
//!
//! The splitter only appends to the log. A separate job reads it back and
//! deletes each listed folder together with every document whose lineage
//! contains the folder's path. Entries may repeat across runs; readers
//! de-duplicate.

use std::collections::HashSet;
use std::io;
use std::path::Path;

use crate::error::{Result, SplitError};
use crate::splitting::generate_lineage;

/// Deletes a folder and its descendants, addressed by lineage value.
pub trait FolderDeleter {
    /// Delete every document whose lineage contains `lineage`.
    fn delete_by_lineage(&mut self, lineage: &str) -> Result<()>;
}

/// Read all entries of a delete log in file order.
///
/// A missing log file has no entries. Blank lines are skipped and trailing
/// carriage returns are removed.
pub fn read_delete_log(path: &Path) -> Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => {
            return Err(SplitError::DeleteLog {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    Ok(content
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// De-duplicate entries, keeping the first occurrence of each.
///
/// # Examples
/// ```
/// use lineage_splitter::deletion::pending_folders;
///
/// let entries = vec!["a".to_string(), "b".to_string(), "a".to_string()];
/// assert_eq!(pending_folders(&entries), vec!["a", "b"]);
/// ```
pub fn pending_folders(entries: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.as_str()))
        .cloned()
        .collect()
}

/// Drive a deleter with every pending folder of a log.
///
/// Each folder is passed as its most specific lineage value, the form in
/// which it appears on derived documents. Returns the number of folders
/// handed to the deleter.
pub fn apply_delete_log(path: &Path, deleter: &mut dyn FolderDeleter) -> Result<usize> {
    let folders = pending_folders(&read_delete_log(path)?);
    let mut applied = 0;

    for folder in &folders {
        let Some(lineage) = generate_lineage(folder).pop() else {
            tracing::warn!(entry = %folder, "Delete log entry has no path segments, skipping");
            continue;
        };
        deleter.delete_by_lineage(&lineage)?;
        tracing::info!(folder = %folder, lineage = %lineage, "Deleted folder and descendants");
        applied += 1;
    }

    Ok(applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[derive(Default)]
    struct RecordingDeleter {
        deleted: Vec<String>,
    }

    impl FolderDeleter for RecordingDeleter {
        fn delete_by_lineage(&mut self, lineage: &str) -> Result<()> {
            self.deleted.push(lineage.to_string());
            Ok(())
        }
    }

    #[test]
    fn test_read_missing_log_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_delete_log(&dir.path().join("none.txt")).unwrap().is_empty());
    }

    #[test]
    fn test_read_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deletePaths.txt");
        std::fs::write(&path, "a/b\r\n\nc\n").unwrap();

        assert_eq!(read_delete_log(&path).unwrap(), vec!["a/b", "c"]);
    }

    #[test]
    fn test_apply_uses_last_lineage_value_once_per_folder() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("deletePaths.txt");
        std::fs::write(&path, "root/a\nroot/b\nroot/a\n/\n").unwrap();

        let mut deleter = RecordingDeleter::default();
        let applied = apply_delete_log(&path, &mut deleter).unwrap();

        assert_eq!(applied, 2);
        assert_eq!(deleter.deleted, vec!["/root/a", "/root/b"]);
    }
}
