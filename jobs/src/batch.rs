use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{Map, Value};

/// Evaluations written by a batch of rollouts as `0.json`, `1.json`, and so on.
pub struct Batch {
    pub paths: Vec<PathBuf>,
    pub evaluations: Vec<Map<String, Value>>,
}

/// Reads `0.json`, `1.json`, ... from a batch directory, stopping at the first missing index.
pub fn load_batch<P: AsRef<Path>>(dir: P) -> Result<Batch> {
    let dir = dir.as_ref();
    let mut batch = Batch {
        paths: Vec::new(),
        evaluations: Vec::new(),
    };
    loop {
        let path = dir.join(format!("{}.json", batch.paths.len()));
        if !abstutil::file_exists(&path) {
            break;
        }
        let evaluation = match abstutil::read_json::<_, Value>(&path)? {
            Value::Object(map) => map,
            _ => bail!("{} doesn't contain a JSON object", path.display()),
        };
        batch.paths.push(path);
        batch.evaluations.push(evaluation);
    }
    if batch.paths.is_empty() {
        bail!("{} has no evaluations (0.json, 1.json, ...)", dir.display());
    }
    info!(
        "Loaded {} evaluations from {}",
        batch.paths.len(),
        dir.display()
    );
    Ok(batch)
}

/// Moves files that live in the same directory into a new subdirectory named by the current
/// time, like `20200923143012.123456`. Returns that subdirectory.
pub fn archive(paths: &[PathBuf]) -> Result<PathBuf> {
    let parent = common_parent(paths)?;
    let timestamp = chrono::Local::now().format("%Y%m%d%H%M%S%.6f").to_string();
    let dst_dir = parent.join(timestamp);
    fs_err::create_dir_all(&dst_dir)?;

    for src in paths {
        let name = src
            .file_name()
            .ok_or_else(|| anyhow!("{} isn't a file", src.display()))?;
        let dst = dst_dir.join(name);
        fs_err::rename(src, &dst)
            .with_context(|| format!("archiving {} into {}", src.display(), dst_dir.display()))?;
    }
    info!("Archived {} files into {}", paths.len(), dst_dir.display());
    Ok(dst_dir)
}

fn common_parent(paths: &[PathBuf]) -> Result<&Path> {
    let mut parents = paths.iter().map(|p| p.parent().unwrap_or_else(|| Path::new("")));
    let first = parents
        .next()
        .ok_or_else(|| anyhow!("there's nothing to archive"))?;
    for other in parents {
        if other != first {
            bail!(
                "Directories {} and {} must have the same root",
                first.display(),
                other.display()
            );
        }
    }
    Ok(first)
}
