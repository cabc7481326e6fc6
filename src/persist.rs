//! # History Persistence
//! Load and store the serialized snapshot history as one blob.
//!
//! Load order: remote mirror first, local file on ANY remote failure,
//! empty store if neither exists — a broken mirror must never abort a
//! collection run. Persist order: local file first (the copy we own),
//! then a best-effort push to the mirror.

use std::path::Path;

use anyhow::{Context, Result};
use tokio::fs;

use crate::backup::RemoteBackup;
use crate::history::SnapshotStore;

/// Key of the blob on the remote mirror.
pub const HISTORY_KEY: &str = "viewtrack_history.json";

/// Default location of the local copy.
pub const DEFAULT_LOCAL_PATH: &str = "state/viewtrack_history.json";

/// A loaded store plus the mirror version token to reuse on persist.
#[derive(Debug, Default)]
pub struct LoadedHistory {
    pub store: SnapshotStore,
    pub remote_version: Option<String>,
}

/// Load the history. Never fails: every degraded path bottoms out at an
/// empty store with a warning.
pub async fn load_history(backup: Option<&dyn RemoteBackup>, local_path: &Path) -> LoadedHistory {
    if let Some(backup) = backup {
        match backup.fetch(HISTORY_KEY).await {
            Ok(Some(blob)) => match serde_json::from_slice::<SnapshotStore>(&blob.bytes) {
                Ok(store) => {
                    tracing::info!(bytes = blob.bytes.len(), "history loaded from mirror");
                    return LoadedHistory {
                        store,
                        remote_version: blob.version,
                    };
                }
                Err(e) => {
                    tracing::warn!(error = ?e, "mirror blob unreadable; falling back to local copy");
                }
            },
            Ok(None) => {
                tracing::info!("no history on mirror yet; falling back to local copy");
            }
            Err(e) => {
                tracing::warn!(error = ?e, "mirror fetch failed; falling back to local copy");
            }
        }
    }

    match fs::read(local_path).await {
        Ok(bytes) => match serde_json::from_slice::<SnapshotStore>(&bytes) {
            Ok(store) => LoadedHistory {
                store,
                remote_version: None,
            },
            Err(e) => {
                tracing::warn!(error = ?e, path = %local_path.display(), "local history unreadable; starting empty");
                LoadedHistory::default()
            }
        },
        Err(_) => LoadedHistory::default(),
    }
}

/// Persist the history: local first, mirror best-effort. Returns an
/// error only when even the local copy could not be written.
pub async fn persist_history(
    store: &SnapshotStore,
    backup: Option<&dyn RemoteBackup>,
    remote_version: Option<&str>,
    local_path: &Path,
) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(store).context("serializing history")?;

    if let Some(dir) = local_path.parent() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("creating {}", dir.display()))?;
    }
    fs::write(local_path, &bytes)
        .await
        .with_context(|| format!("writing {}", local_path.display()))?;

    if let Some(backup) = backup {
        if let Err(e) = backup.store(HISTORY_KEY, &bytes, remote_version).await {
            tracing::warn!(error = ?e, "mirror push failed; history kept local-only this run");
        } else {
            tracing::info!(bytes = bytes.len(), "history mirrored");
        }
    }
    Ok(())
}
