use std::path::Path;

use anyhow::{Context, Result};
use fs_err::File;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Creates the parent directory if needed.
pub fn write_json<P: AsRef<Path>, T: Serialize>(path: P, obj: &T) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs_err::create_dir_all(parent)?;
        }
    }
    let file = File::create(path)?;
    serde_json::to_writer_pretty(file, obj)
        .with_context(|| format!("serializing {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}

pub fn read_json<P: AsRef<Path>, T: DeserializeOwned>(path: P) -> Result<T> {
    let path = path.as_ref();
    let contents = fs_err::read_to_string(path)?;
    let obj = serde_json::from_str(&contents)
        .with_context(|| format!("deserializing {}", path.display()))?;
    Ok(obj)
}

pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().exists()
}
