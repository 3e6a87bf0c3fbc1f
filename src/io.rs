//! Artifact persistence
//!
//! All artifacts are JSON and written with write-to-temp + rename, so a
//! crash mid-write leaves either the previous artifact or the new one.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{HookError, Result};
use crate::model::{lock, SharedModel, SharedOptimizer};

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize `value` as pretty JSON to `path`, replacing any previous file.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| HookError::io(format!("creating {}", parent.display()), e))?;
    }

    let temp = temp_path(path);
    let file = File::create(&temp)
        .map_err(|e| HookError::io(format!("creating {}", temp.display()), e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer
        .flush()
        .map_err(|e| HookError::io(format!("writing {}", temp.display()), e))?;
    drop(writer);

    fs::rename(&temp, path)
        .map_err(|e| HookError::io(format!("renaming {} to {}", temp.display(), path.display()), e))?;
    log::debug!("wrote {}", path.display());
    Ok(())
}

/// Read a JSON artifact written by [`write_json_atomic`].
pub fn load_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let file =
        File::open(path).map_err(|e| HookError::io(format!("opening {}", path.display()), e))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

/// Snapshot model and optimizer state into a single weights artifact.
///
/// The artifact is `{"model": .., "optimizer": ..}`; an existing file is overwritten.
pub fn save_weights(
    model: &SharedModel,
    optimizer: &SharedOptimizer,
    path: impl AsRef<Path>,
) -> Result<()> {
    let model_state = lock(&**model, "model")?.state_dict();
    let optimizer_state = lock(&**optimizer, "optimizer")?.state_dict();
    let artifact = serde_json::json!({
        "model": model_state,
        "optimizer": optimizer_state,
    });
    write_json_atomic(path, &artifact)
}

/// Create or truncate an empty marker file.
pub fn touch(path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    File::create(path).map_err(|e| HookError::io(format!("creating {}", path.display()), e))?;
    Ok(())
}
