//! Atomic JSON artifact writes
//!
//! Artifacts are written to `<target>.tmp` and renamed over the target so a
//! reader never observes a half-written file.

use crate::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Serialise `value` and atomically replace `target`
///
/// Parent directories are created as needed. Returns the number of bytes
/// written.
pub fn write_json_atomic<T: Serialize + ?Sized>(value: &T, target: &Path, pretty: bool) -> Result<u64> {
    let content = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let temp = temp_path(target);
    std::fs::write(&temp, &content)?;
    if let Err(e) = std::fs::rename(&temp, target) {
        let _ = std::fs::remove_file(&temp);
        return Err(e.into());
    }

    Ok(content.len() as u64)
}

fn temp_path(target: &Path) -> PathBuf {
    let mut name = target.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    target.with_file_name(name)
}
