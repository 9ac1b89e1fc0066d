//! Persistent storage for tenant key pairs.
//!
//! Two backends: an in-memory map for tests and single-node deployments,
//! and a directory tree holding one JSON file per pair at
//! `{base}/{virtual_server}/{algorithm}/{kid}`.

use async_trait::async_trait;
use keyline_core::VirtualServerId;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::algorithm::KeyAlgorithm;
use crate::error::KeysError;
use crate::pair::{ExportedKeyPair, KeyPair};
use crate::strategy::strategy_for;

/// Storage for key pairs, scoped by virtual server and algorithm.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Fetch one pair by kid.
    async fn get(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
        kid: &str,
    ) -> Result<Option<KeyPair>, KeysError>;

    /// All pairs of a virtual server, every algorithm.
    async fn get_all(&self, virtual_server: VirtualServerId) -> Result<Vec<KeyPair>, KeysError>;

    /// All pairs of a virtual server for one algorithm.
    async fn get_all_for_algorithm(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
    ) -> Result<Vec<KeyPair>, KeysError>;

    /// Persist a pair.
    async fn add(&self, virtual_server: VirtualServerId, pair: &KeyPair)
        -> Result<(), KeysError>;

    /// Delete a pair. Removing a pair that does not exist is not an error.
    async fn remove(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
        kid: &str,
    ) -> Result<(), KeysError>;
}

fn pair_key(virtual_server: VirtualServerId, algorithm: KeyAlgorithm, kid: &str) -> String {
    format!("{virtual_server}:{algorithm}:{kid}")
}

/// In-memory key store.
#[derive(Default)]
pub struct MemoryKeyStore {
    pairs: RwLock<HashMap<String, KeyPair>>,
}

impl MemoryKeyStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
        kid: &str,
    ) -> Result<Option<KeyPair>, KeysError> {
        let pairs = self.pairs.read().await;
        Ok(pairs.get(&pair_key(virtual_server, algorithm, kid)).cloned())
    }

    async fn get_all(&self, virtual_server: VirtualServerId) -> Result<Vec<KeyPair>, KeysError> {
        let prefix = format!("{virtual_server}:");
        let pairs = self.pairs.read().await;
        Ok(pairs
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, pair)| pair.clone())
            .collect())
    }

    async fn get_all_for_algorithm(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
    ) -> Result<Vec<KeyPair>, KeysError> {
        let prefix = format!("{virtual_server}:{algorithm}:");
        let pairs = self.pairs.read().await;
        Ok(pairs
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(_, pair)| pair.clone())
            .collect())
    }

    async fn add(
        &self,
        virtual_server: VirtualServerId,
        pair: &KeyPair,
    ) -> Result<(), KeysError> {
        let mut pairs = self.pairs.write().await;
        pairs.insert(
            pair_key(virtual_server, pair.algorithm, &pair.kid),
            pair.clone(),
        );
        Ok(())
    }

    async fn remove(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
        kid: &str,
    ) -> Result<(), KeysError> {
        let mut pairs = self.pairs.write().await;
        pairs.remove(&pair_key(virtual_server, algorithm, kid));
        Ok(())
    }
}

/// Filesystem-backed key store. One JSON file per pair.
pub struct DirectoryKeyStore {
    base: PathBuf,
}

impl DirectoryKeyStore {
    /// Creates a store rooted at `base`. The directory is created lazily.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    fn algorithm_dir(&self, virtual_server: VirtualServerId, algorithm: KeyAlgorithm) -> PathBuf {
        self.base
            .join(virtual_server.to_string())
            .join(algorithm.to_string())
    }

    async fn read_pair(path: &Path) -> Result<KeyPair, KeysError> {
        let contents = tokio::fs::read(path).await?;
        let exported: ExportedKeyPair = serde_json::from_slice(&contents)?;
        strategy_for(exported.algorithm).import(&exported)
    }

    async fn read_algorithm_dir(&self, dir: &Path) -> Result<Vec<KeyPair>, KeysError> {
        let mut pairs = Vec::new();
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(pairs),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                pairs.push(Self::read_pair(&entry.path()).await?);
            }
        }
        Ok(pairs)
    }
}

#[async_trait]
impl KeyStore for DirectoryKeyStore {
    async fn get(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
        kid: &str,
    ) -> Result<Option<KeyPair>, KeysError> {
        let path = self.algorithm_dir(virtual_server, algorithm).join(kid);
        match tokio::fs::metadata(&path).await {
            Ok(_) => Ok(Some(Self::read_pair(&path).await?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn get_all(&self, virtual_server: VirtualServerId) -> Result<Vec<KeyPair>, KeysError> {
        let mut pairs = Vec::new();
        for algorithm in KeyAlgorithm::ALL {
            let dir = self.algorithm_dir(virtual_server, algorithm);
            pairs.extend(self.read_algorithm_dir(&dir).await?);
        }
        Ok(pairs)
    }

    async fn get_all_for_algorithm(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
    ) -> Result<Vec<KeyPair>, KeysError> {
        let dir = self.algorithm_dir(virtual_server, algorithm);
        self.read_algorithm_dir(&dir).await
    }

    async fn add(
        &self,
        virtual_server: VirtualServerId,
        pair: &KeyPair,
    ) -> Result<(), KeysError> {
        let dir = self.algorithm_dir(virtual_server, pair.algorithm);
        tokio::fs::create_dir_all(&dir).await?;

        let exported = strategy_for(pair.algorithm).export(pair);
        let contents = serde_json::to_vec_pretty(&exported)?;
        tokio::fs::write(dir.join(&pair.kid), contents).await?;
        Ok(())
    }

    async fn remove(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
        kid: &str,
    ) -> Result<(), KeysError> {
        let path = self.algorithm_dir(virtual_server, algorithm).join(kid);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
