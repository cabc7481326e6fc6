// src/backup/mod.rs
pub mod github;

use anyhow::Result;

/// A remote copy of the history blob plus the version token needed to
/// replace it without clobbering a concurrent writer.
#[derive(Debug, Clone)]
pub struct RemoteBlob {
    pub bytes: Vec<u8>,
    pub version: Option<String>,
}

/// Remote mirror for the serialized history. `fetch` returning
/// `Ok(None)` means the key does not exist yet; `store` with a stale
/// version token fails and implementations retry once with a fresh
/// token before giving up.
#[async_trait::async_trait]
pub trait RemoteBackup: Send + Sync {
    async fn fetch(&self, key: &str) -> Result<Option<RemoteBlob>>;
    async fn store(&self, key: &str, bytes: &[u8], version: Option<&str>) -> Result<()>;
}

// --- Test helper ---
/// In-memory backup used by tests and local experiments.
#[derive(Default)]
pub struct MemoryBackup {
    inner: std::sync::Mutex<std::collections::HashMap<String, (Vec<u8>, u64)>>,
}

impl MemoryBackup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, key: &str, bytes: Vec<u8>) {
        self.inner
            .lock()
            .unwrap()
            .insert(key.to_string(), (bytes, 1));
    }
}

#[async_trait::async_trait]
impl RemoteBackup for MemoryBackup {
    async fn fetch(&self, key: &str) -> Result<Option<RemoteBlob>> {
        Ok(self.inner.lock().unwrap().get(key).map(|(bytes, rev)| {
            RemoteBlob {
                bytes: bytes.clone(),
                version: Some(rev.to_string()),
            }
        }))
    }

    async fn store(&self, key: &str, bytes: &[u8], _version: Option<&str>) -> Result<()> {
        let mut map = self.inner.lock().unwrap();
        let rev = map.get(key).map(|(_, r)| r + 1).unwrap_or(1);
        map.insert(key.to_string(), (bytes.to_vec(), rev));
        Ok(())
    }
}
