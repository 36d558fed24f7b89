//! Durable single-file persistence for the chain (write-then-rename).

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::Block;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("chain file i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("chain serialization: {0}")]
    Serde(#[from] serde_json::Error),
}

/// On-disk layout: a single JSON object wrapping the block sequence.
#[derive(Serialize, Deserialize)]
struct ChainFile {
    blocks: Vec<Block>,
}

/// Store for the canonical chain file. All writes go through a temp file
/// and an atomic rename, so the canonical file is never left half-written.
#[derive(Debug, Clone)]
pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ChainStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_owned();
        os.push(".tmp");
        PathBuf::from(os)
    }

    /// Serialize the whole block sequence and atomically replace the
    /// canonical file. On any failure the previous canonical state is kept.
    pub fn save(&self, blocks: &[Block]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.tmp_path();
        let json = serde_json::to_string_pretty(&ChainFile {
            blocks: blocks.to_vec(),
        })?;
        let mut f = File::create(&tmp)?;
        f.write_all(json.as_bytes())?;
        f.sync_all()?;
        drop(f);

        // Some platforms refuse to rename over an existing target.
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Read the canonical file. Absent, unreadable, or corrupt files all
    /// report `None`; the caller falls back to a fresh genesis chain.
    pub fn load(&self) -> Option<Vec<Block>> {
        let data = match fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not read chain file");
                return None;
            }
        };
        match serde_json::from_str::<ChainFile>(&data) {
            Ok(file) => Some(file.blocks),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "could not parse chain file");
                None
            }
        }
    }
}
