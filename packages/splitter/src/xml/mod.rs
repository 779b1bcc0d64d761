//! XML utilities for navigating and serializing payload trees.

mod utils;
mod writer;

pub use utils::{get_tag_name, node_path, text_content};
pub use writer::serialize_subtree;
