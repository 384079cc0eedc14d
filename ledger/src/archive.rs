use async_trait::async_trait;
use dashmap::DashMap;
use dg_utxo_core::errors::LedgerError;
use dg_utxo_core::traits::services::ArchiveStore;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

#[derive(Default)]
pub struct MemoryArchive {
    objects: DashMap<String, Vec<u8>>,
}
impl MemoryArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
#[async_trait]
impl ArchiveStore for MemoryArchive {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        Ok(self.objects.get(key).map(|v| v.value().clone()))
    }
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), LedgerError> {
        self.objects.insert(key.to_string(), bytes);
        Ok(())
    }
}

/// Objects stored as files below `root`, one file per key.
pub struct FsArchive {
    root: PathBuf,
}
impl FsArchive {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, LedgerError> {
        let relative = Path::new(key);
        if !relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(LedgerError::Config(format!("Invalid archive key: {key}")));
        }
        Ok(self.root.join(relative))
    }
}
#[async_trait]
impl ArchiveStore for FsArchive {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, LedgerError> {
        match fs::read(self.path_for(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LedgerError::remote("archive", e)),
        }
    }
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), LedgerError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| LedgerError::remote("archive", e))?;
        }
        fs::write(&path, bytes)
            .await
            .map_err(|e| LedgerError::remote("archive", e))
    }
}
