use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Persisted set of job ids that have already been delivered. Grows only;
/// there is no eviction. Single-threaded by design, the orchestrator is the
/// sole caller.
pub struct SeenSet {
    path: PathBuf,
    ids: HashSet<String>,
}

impl SeenSet {
    /// Loads the set from disk. A missing file is a normal first run and a
    /// corrupt file is downgraded to a warning; neither is fatal.
    pub fn load(path: &Path) -> Self {
        let ids = match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str::<Vec<String>>(&raw) {
                Ok(list) => {
                    info!(count = list.len(), "loaded seen jobs from {}", path.display());
                    list.into_iter().collect()
                }
                Err(e) => {
                    warn!("seen-jobs file {} is corrupt, starting empty: {}", path.display(), e);
                    HashSet::new()
                }
            },
            Err(_) => {
                info!("no seen-jobs file at {}, starting empty", path.display());
                HashSet::new()
            }
        };
        Self {
            path: path.to_path_buf(),
            ids,
        }
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.ids.contains(job_id)
    }

    /// In-memory only; call `flush` to persist.
    pub fn mark_seen(&mut self, job_id: &str) {
        self.ids.insert(job_id.to_string());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Rewrites the file with the full current set. Sorted so the file is
    /// stable across runs.
    pub fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let mut list: Vec<&String> = self.ids.iter().collect();
        list.sort();
        let json = serde_json::to_string_pretty(&list)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
