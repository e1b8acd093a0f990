use std::path::{Path, PathBuf};

/// Where network files live. Every network gets its own directory, holding files named after it:
/// `{base_dir}/{id}/{id}.net.xml`, `{base_dir}/{id}/{id}.rou.xml`, and so on.
#[derive(Clone, Debug, PartialEq)]
pub struct NetworkPaths {
    pub base_dir: PathBuf,
}

impl NetworkPaths {
    pub fn new<P: Into<PathBuf>>(base_dir: P) -> NetworkPaths {
        NetworkPaths {
            base_dir: base_dir.into(),
        }
    }

    /// Uses `$ILURL_HOME/data/networks` if the variable is set, or `data/networks` relative to the
    /// working directory otherwise.
    pub fn from_env() -> NetworkPaths {
        match std::env::var("ILURL_HOME") {
            Ok(home) => NetworkPaths::new(Path::new(&home).join("data").join("networks")),
            Err(_) => NetworkPaths::new(Path::new("data").join("networks")),
        }
    }

    pub fn network_dir(&self, network_id: &str) -> PathBuf {
        self.base_dir.join(network_id)
    }

    /// `file_type` is the part between the network ID and `.xml`, like `net` or `rou`.
    pub fn file(&self, network_id: &str, file_type: &str) -> PathBuf {
        self.network_dir(network_id)
            .join(format!("{}.{}.xml", network_id, file_type))
    }
}
