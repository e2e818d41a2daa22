//! Atomic file output
//!
//! Everything AutoSmoke writes goes through here so a failed run never
//! leaves a truncated proposal, evidence file, or report behind.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};

/// Write `contents` to `path` via a temp file in the same directory and a rename.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| Error::Persist {
        path: path.to_path_buf(),
        reason: e.error.to_string(),
    })?;

    debug!("Wrote {} ({} bytes)", path.display(), contents.len());
    Ok(())
}

/// Serialize `value` as pretty JSON and write it atomically.
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    write_atomic(path, json.as_bytes())
}
