//! Authorization cache.
//!
//! Maps `(signer, scope)` to the last authorization issued for it, so one
//! approval covers every decryption in its validity window. Process-local.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use sealed_forecast_core::{AccountId, RegistryAddress};

use crate::authorization::Authorization;

type CacheKey = (AccountId, RegistryAddress);

/// Thread-safe authorization cache.
#[derive(Default)]
pub struct AuthorizationCache {
    entries: RwLock<HashMap<CacheKey, Authorization>>,
}

impl AuthorizationCache {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave a half-written entry, so a
    // poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<CacheKey, Authorization>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<CacheKey, Authorization>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// The cached authorization for `(signer, scope)` if valid at `now`.
    ///
    /// Entries outside their validity window are evicted.
    pub fn lookup(&self, signer: &AccountId, scope: &RegistryAddress, now: i64) -> Option<Authorization> {
        let key = (*signer, *scope);
        match self.read().get(&key) {
            Some(auth) if auth.is_valid_at(now) => {
                tracing::trace!(signer = %signer, scope = %scope, "authorization cache hit");
                return Some(auth.clone());
            }
            Some(_) => {}
            None => return None,
        }

        let mut entries = self.write();
        if entries.get(&key).is_some_and(|a| !a.is_valid_at(now)) {
            entries.remove(&key);
            tracing::debug!(signer = %signer, scope = %scope, "evicted stale authorization");
        }
        None
    }

    /// Store an authorization under its own `(signer, scope)`, replacing any
    /// previous one.
    pub fn store(&self, authorization: Authorization) {
        let key = (authorization.signer(), authorization.scope());
        tracing::debug!(
            signer = %key.0,
            scope = %key.1,
            expires_at = authorization.expires_at(),
            "authorization cached"
        );
        self.write().insert(key, authorization);
    }

    /// Drop the entry for `(signer, scope)`. Returns whether one existed.
    pub fn clear(&self, signer: &AccountId, scope: &RegistryAddress) -> bool {
        let removed = self.write().remove(&(*signer, *scope)).is_some();
        if removed {
            tracing::debug!(signer = %signer, scope = %scope, "authorization cleared");
        }
        removed
    }

    /// Drop every entry not valid at `now`. Returns how many were dropped.
    pub fn purge_expired(&self, now: i64) -> usize {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, auth| auth.is_valid_at(now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_forecast_core::Keypair;

    fn scope(b: u8) -> RegistryAddress {
        RegistryAddress::from_bytes([b; 32])
    }

    #[test]
    fn test_store_lookup_roundtrip() {
        let cache = AuthorizationCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        let auth = Authorization::issue(&keypair, scope(1), 100, 200);

        cache.store(auth.clone());
        let hit = cache.lookup(&keypair.account(), &scope(1), 150).unwrap();
        assert_eq!(hit.public(), auth.public());
        assert!(cache.lookup(&keypair.account(), &scope(2), 150).is_none());
    }

    #[test]
    fn test_expired_entry_absent_and_evicted() {
        let cache = AuthorizationCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        cache.store(Authorization::issue(&keypair, scope(1), 100, 200));

        assert!(cache.lookup(&keypair.account(), &scope(1), 200).is_none());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_not_yet_valid_is_absent_but_kept() {
        let cache = AuthorizationCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        cache.store(Authorization::issue(&keypair, scope(1), 100, 200));

        assert!(cache.lookup(&keypair.account(), &scope(1), 50).is_none());
        assert!(cache.lookup(&keypair.account(), &scope(1), 100).is_some());
    }

    #[test]
    fn test_last_store_wins_and_clear() {
        let cache = AuthorizationCache::new();
        let keypair = Keypair::from_seed(&[1; 32]);
        cache.store(Authorization::issue(&keypair, scope(1), 0, 100));
        let newer = Authorization::issue(&keypair, scope(1), 0, 500);
        cache.store(newer.clone());

        assert_eq!(cache.len(), 1);
        assert_eq!(
            cache.lookup(&keypair.account(), &scope(1), 300).unwrap().public(),
            newer.public()
        );

        assert!(cache.clear(&keypair.account(), &scope(1)));
        assert!(!cache.clear(&keypair.account(), &scope(1)));
        assert!(cache.lookup(&keypair.account(), &scope(1), 300).is_none());
    }

    #[test]
    fn test_purge_expired() {
        let cache = AuthorizationCache::new();
        let a = Keypair::from_seed(&[1; 32]);
        let b = Keypair::from_seed(&[2; 32]);
        cache.store(Authorization::issue(&a, scope(1), 0, 100));
        cache.store(Authorization::issue(&b, scope(1), 0, 1_000));

        assert_eq!(cache.purge_expired(500), 1);
        assert_eq!(cache.len(), 1);
        assert!(cache.lookup(&b.account(), &scope(1), 500).is_some());
    }

    proptest::proptest! {
        #[test]
        fn prop_lookup_respects_window(issued in 0i64..1_000, len in 1i64..1_000, now in 0i64..3_000) {
            let cache = AuthorizationCache::new();
            let keypair = Keypair::from_seed(&[9; 32]);
            cache.store(Authorization::issue(&keypair, scope(1), issued, issued + len));

            let hit = cache.lookup(&keypair.account(), &scope(1), now).is_some();
            proptest::prop_assert_eq!(hit, issued <= now && now < issued + len);
        }
    }
}
