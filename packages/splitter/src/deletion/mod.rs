//! Delete-flag detection and the delete log.
//!
//! The detector records folder assets flagged for deletion in an
//! append-only log, one identifier per line. The log is a one-way handoff to
//! a separate deletion job; [`apply_delete_log`] is that job's entry point.

mod detector;
mod handoff;
mod log;

pub use detector::{file_extension, find_flagged, is_folder_identifier, DeleteDetector, Flagged};
pub use handoff::{apply_delete_log, pending_folders, read_delete_log, FolderDeleter};
pub use log::{open_log, LogSink, PersistentLog, ReopenLog};
