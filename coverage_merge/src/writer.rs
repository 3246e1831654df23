use std::{fs, path::Path};

use tracing::debug;

use crate::error::{MergeError, MergeResult};

/// Creates the immediate parent of `dest` when it is missing.
///
/// Only one level is created; a missing grand-parent surfaces as a write error.
pub fn ensure_parent_dir(dest: &Path) -> MergeResult<()> {
    let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };

    if parent.exists() {
        return Ok(());
    }

    debug!(dir = %parent.display(), "Creating output directory");
    fs::create_dir(parent).map_err(|err| MergeError::write(parent, err))
}

/// Replaces `dest` with `contents`.
pub fn write_output(dest: &Path, contents: &str) -> MergeResult<()> {
    ensure_parent_dir(dest)?;
    fs::write(dest, contents).map_err(|err| MergeError::write(dest, err))
}
