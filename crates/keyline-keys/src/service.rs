//! Key lifecycle service: generation, lookup and rotation.

use chrono::{DateTime, Utc};
use keyline_core::{Clock, VirtualServerId};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::algorithm::KeyAlgorithm;
use crate::cache::KeyCache;
use crate::error::KeysError;
use crate::pair::KeyPair;
use crate::store::KeyStore;
use crate::strategy::strategy_for;

/// Manages tenant signing keys on top of a [`KeyStore`] with a read-through
/// cache for the current key.
#[derive(Clone)]
pub struct KeyService {
    store: Arc<dyn KeyStore>,
    cache: Arc<KeyCache>,
    clock: Arc<dyn Clock>,
}

impl KeyService {
    /// Creates a service over `store` using `clock` for lifecycle decisions.
    #[must_use]
    pub fn new(store: Arc<dyn KeyStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            cache: Arc::new(KeyCache::new()),
            clock,
        }
    }

    /// Generate, persist and cache a fresh pair for a tenant.
    ///
    /// # Errors
    ///
    /// Fails if generation or persistence fails.
    pub async fn generate(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
    ) -> Result<KeyPair, KeysError> {
        let pair = strategy_for(algorithm).generate(self.clock.now())?;
        self.store.add(virtual_server, &pair).await?;
        self.cache.put(virtual_server, pair.clone());
        info!(
            virtual_server = %virtual_server,
            algorithm = %algorithm,
            kid = %pair.kid,
            "generated signing key"
        );
        Ok(pair)
    }

    /// The current signing key for a tenant and algorithm.
    ///
    /// Never returns an expired pair. Keys are provisioned at tenant
    /// creation and by rotation, so a missing key escalates to the caller.
    ///
    /// # Errors
    ///
    /// Returns [`KeysError::KeyPairNotFound`] when no non-expired pair
    /// exists.
    pub async fn current_key(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
    ) -> Result<KeyPair, KeysError> {
        let now = self.clock.now();
        if let Some(pair) = self.cache.get(virtual_server, algorithm) {
            if !pair.is_expired(now) {
                return Ok(pair);
            }
            self.cache.invalidate(virtual_server);
        }

        let pair = self
            .freshest_pair(virtual_server, algorithm, now)
            .await?
            .ok_or(KeysError::KeyPairNotFound { virtual_server })?;
        self.cache.put(virtual_server, pair.clone());
        Ok(pair)
    }

    /// Every non-expired pair of a tenant, across algorithms. Pairs past
    /// their rotation deadline stay here until expiry so existing tokens
    /// keep verifying.
    ///
    /// # Errors
    ///
    /// Fails if the backing store fails.
    pub async fn verification_keys(
        &self,
        virtual_server: VirtualServerId,
    ) -> Result<Vec<KeyPair>, KeysError> {
        let now = self.clock.now();
        let mut pairs: Vec<KeyPair> = self
            .store
            .get_all(virtual_server)
            .await?
            .into_iter()
            .filter(|pair| !pair.is_expired(now))
            .collect();
        pairs.sort_by_key(|pair| pair.created_at);
        Ok(pairs)
    }

    /// Look up a non-expired pair by kid, for token verification.
    ///
    /// # Errors
    ///
    /// Returns [`KeysError::KeyPairNotFound`] when the kid is unknown or
    /// the pair has expired.
    pub async fn key_by_kid(
        &self,
        virtual_server: VirtualServerId,
        kid: &str,
    ) -> Result<KeyPair, KeysError> {
        let now = self.clock.now();
        for algorithm in KeyAlgorithm::ALL {
            if let Some(pair) = self.store.get(virtual_server, algorithm, kid).await? {
                if !pair.is_expired(now) {
                    return Ok(pair);
                }
            }
        }
        Err(KeysError::KeyPairNotFound { virtual_server })
    }

    /// Rotate a tenant's keys.
    ///
    /// Expired pairs are deleted; each algorithm the tenant has keys for
    /// gets a fresh pair unless one exists whose rotation deadline is still
    /// in the future. Running twice at the same instant is a no-op the
    /// second time.
    ///
    /// # Errors
    ///
    /// Fails if the store or generation fails.
    pub async fn rotate_virtual_server(
        &self,
        virtual_server: VirtualServerId,
    ) -> Result<(), KeysError> {
        let now = self.clock.now();
        let pairs = self.store.get_all(virtual_server).await?;

        // Every algorithm present needs a successor unless some pair is
        // still before its rotation deadline.
        let mut needs_rotation: HashSet<KeyAlgorithm> =
            pairs.iter().map(|pair| pair.algorithm).collect();

        for pair in &pairs {
            if pair.is_expired(now) {
                debug!(
                    virtual_server = %virtual_server,
                    kid = %pair.kid,
                    "deleting expired signing key"
                );
                self.store
                    .remove(virtual_server, pair.algorithm, &pair.kid)
                    .await?;
                self.cache.invalidate(virtual_server);
            } else if !pair.is_due_for_rotation(now) {
                needs_rotation.remove(&pair.algorithm);
            }
        }

        for algorithm in needs_rotation {
            self.generate(virtual_server, algorithm).await?;
        }
        Ok(())
    }

    async fn freshest_pair(
        &self,
        virtual_server: VirtualServerId,
        algorithm: KeyAlgorithm,
        now: DateTime<Utc>,
    ) -> Result<Option<KeyPair>, KeysError> {
        let pairs = self
            .store
            .get_all_for_algorithm(virtual_server, algorithm)
            .await?;
        Ok(pairs
            .into_iter()
            .filter(|pair| !pair.is_expired(now))
            .max_by_key(|pair| pair.created_at))
    }
}
