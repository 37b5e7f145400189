//! Decryption sessions.
//!
//! A session takes a set of `(handle, scope)` requests and resolves them to
//! plaintexts:
//!
//! 1. Handles already in the result set short-circuit.
//! 2. **AuthorizationPending**: one authorization per distinct scope, from
//!    the cache or from the signer (bounded by a timeout, cancellable).
//! 3. **Requesting**: one backend request per handle, dispatched concurrently.
//! 4. **Resolved**: every request succeeded; all values are merged at once.
//!    **Failed**: anything went wrong; nothing is merged.
//!
//! The result set is write-once per handle. A handle that re-resolves to a
//! different value fails the session instead of overwriting.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use sealed_forecast_backend::{DecryptRequest, DecryptionBackend, PublicAuthorization, SealedValue};
use sealed_forecast_core::{now_millis, CiphertextHandle, RegistryAddress};

use crate::authorization::Authorization;
use crate::cache::AuthorizationCache;
use crate::error::{ClientError, Result};
use crate::signer::Signer;

/// Timeouts and validity for decryption sessions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecryptionConfig {
    /// How long a freshly approved authorization stays valid.
    pub authorization_validity_secs: u64,
    /// How long to wait for the signer to approve.
    pub approval_timeout_ms: u64,
    /// How long to wait for each backend request.
    pub request_timeout_ms: u64,
}

impl Default for DecryptionConfig {
    fn default() -> Self {
        Self {
            authorization_validity_secs: 24 * 60 * 60,
            approval_timeout_ms: 120_000,
            request_timeout_ms: 30_000,
        }
    }
}

impl DecryptionConfig {
    pub fn authorization_validity(&self) -> Duration {
        Duration::from_secs(self.authorization_validity_secs)
    }

    pub fn approval_timeout(&self) -> Duration {
        Duration::from_millis(self.approval_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Where the most recent session stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    AuthorizationPending,
    Requesting,
    Resolved,
    Failed { reason: String },
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Resolved | SessionState::Failed { .. })
    }
}

/// Clears the in-flight flag when a session ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives decryption sessions and owns the result set.
pub struct DecryptionOrchestrator {
    backend: Arc<dyn DecryptionBackend>,
    cache: Arc<AuthorizationCache>,
    config: DecryptionConfig,
    results: RwLock<HashMap<CiphertextHandle, u32>>,
    state: RwLock<SessionState>,
    in_flight: AtomicBool,
}

impl DecryptionOrchestrator {
    pub fn new(
        backend: Arc<dyn DecryptionBackend>,
        cache: Arc<AuthorizationCache>,
        config: DecryptionConfig,
    ) -> Self {
        Self {
            backend,
            cache,
            config,
            results: RwLock::new(HashMap::new()),
            state: RwLock::new(SessionState::Idle),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn cache(&self) -> &Arc<AuthorizationCache> {
        &self.cache
    }

    pub fn config(&self) -> &DecryptionConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived view
    // ─────────────────────────────────────────────────────────────────────────

    pub fn state(&self) -> SessionState {
        self.state.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Whether `handle` is in the result set.
    pub fn is_resolved(&self, handle: &CiphertextHandle) -> bool {
        self.read_results().contains_key(handle)
    }

    /// The recorded plaintext for `handle`.
    pub fn resolved_value(&self, handle: &CiphertextHandle) -> Option<u32> {
        self.read_results().get(handle).copied()
    }

    /// `connected && has_value && some handle unresolved && nothing in flight`.
    pub fn can_decrypt(&self, connected: bool, has_value: bool, handles: &[CiphertextHandle]) -> bool {
        if !connected || !has_value || self.is_in_flight() {
            return false;
        }
        let results = self.read_results();
        handles
            .iter()
            .any(|h| !h.is_empty() && !results.contains_key(h))
    }

    /// Forget every resolved value.
    pub fn clear_results(&self) {
        self.results.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    fn read_results(&self) -> std::sync::RwLockReadGuard<'_, HashMap<CiphertextHandle, u32>> {
        self.results.read().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: SessionState) {
        tracing::debug!(state = ?state, "decryption session state");
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = state;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sessions
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve `requests`, returning the plaintext of every requested handle.
    ///
    /// Handles already resolved are answered from the result set without
    /// contacting the backend.
    pub async fn decrypt(
        &self,
        signer: &dyn Signer,
        requests: &[DecryptRequest],
        cancel: &CancellationToken,
    ) -> Result<HashMap<CiphertextHandle, u32>> {
        self.run(signer, requests, cancel, false).await
    }

    /// Resolve `requests` again, including handles already resolved.
    ///
    /// Each re-resolved value must match the recorded one.
    pub async fn refresh(
        &self,
        signer: &dyn Signer,
        requests: &[DecryptRequest],
        cancel: &CancellationToken,
    ) -> Result<HashMap<CiphertextHandle, u32>> {
        self.run(signer, requests, cancel, true).await
    }

    async fn run(
        &self,
        signer: &dyn Signer,
        requests: &[DecryptRequest],
        cancel: &CancellationToken,
        force: bool,
    ) -> Result<HashMap<CiphertextHandle, u32>> {
        // Nothing to resolve: the session stays where it was.
        if requests.is_empty() {
            return Ok(HashMap::new());
        }
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ClientError::SessionInFlight);
        }
        let _in_flight = InFlight(&self.in_flight);

        let pending: Vec<DecryptRequest> = {
            let results = self.read_results();
            let mut seen = HashSet::with_capacity(requests.len());
            requests
                .iter()
                .filter(|r| force || !results.contains_key(&r.handle))
                .filter(|r| seen.insert(r.handle))
                .copied()
                .collect()
        };

        if !pending.is_empty() {
            if let Err(e) = self.resolve(signer, &pending, cancel).await {
                tracing::warn!(error = %e, "decryption session failed");
                self.set_state(SessionState::Failed {
                    reason: e.to_string(),
                });
                return Err(e);
            }
        }

        self.set_state(SessionState::Resolved);
        let results = self.read_results();
        requests
            .iter()
            .map(|r| {
                results
                    .get(&r.handle)
                    .map(|v| (r.handle, *v))
                    .ok_or(ClientError::MissingResult(r.handle))
            })
            .collect()
    }

    /// Authorize, request, and merge. On error nothing has been merged.
    async fn resolve(
        &self,
        signer: &dyn Signer,
        pending: &[DecryptRequest],
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.set_state(SessionState::AuthorizationPending);

        let mut by_scope: BTreeMap<RegistryAddress, Vec<DecryptRequest>> = BTreeMap::new();
        for request in pending {
            by_scope.entry(request.scope).or_default().push(*request);
        }

        let mut authorizations = Vec::with_capacity(by_scope.len());
        for (scope, requests) in by_scope {
            let auth = self.authorization_for(signer, scope, cancel).await?;
            authorizations.push((auth, requests));
        }

        self.set_state(SessionState::Requesting);

        let mut staged = HashMap::with_capacity(pending.len());
        for (auth, requests) in &authorizations {
            match self.request_all(auth, requests, cancel).await {
                Ok(values) => staged.extend(values),
                Err(e) => {
                    if e.invalidates_authorization() {
                        self.cache.clear(&auth.signer(), &auth.scope());
                    }
                    return Err(e);
                }
            }
        }

        self.merge(staged)
    }

    /// Cached authorization for `(signer, scope)`, or a freshly approved one.
    async fn authorization_for(
        &self,
        signer: &dyn Signer,
        scope: RegistryAddress,
        cancel: &CancellationToken,
    ) -> Result<Authorization> {
        let account = signer.account();
        let now = now_millis();

        if let Some(auth) = self.cache.lookup(&account, &scope, now) {
            return Ok(auth);
        }

        tracing::info!(signer = %account, scope = %scope, "requesting decryption authorization");
        let expires_at = now.saturating_add(self.config.authorization_validity().as_millis() as i64);
        let approval = tokio::time::timeout(
            self.config.approval_timeout(),
            signer.approve(scope, now, expires_at),
        );

        let auth = tokio::select! {
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            result = approval => match result {
                Err(_) => return Err(ClientError::ApprovalTimeout),
                Ok(result) => result?,
            },
        };

        if auth.signer() != account || auth.scope() != scope {
            return Err(ClientError::AuthorizationRejected(
                "signer approved a different signer or scope".into(),
            ));
        }

        self.cache.store(auth.clone());
        Ok(auth)
    }

    /// One concurrent backend request per handle; all must succeed.
    async fn request_all(
        &self,
        auth: &Authorization,
        requests: &[DecryptRequest],
        cancel: &CancellationToken,
    ) -> Result<HashMap<CiphertextHandle, u32>> {
        let public: Arc<PublicAuthorization> = Arc::new(auth.public().clone());
        let timeout = self.config.request_timeout();
        let mut tasks: JoinSet<(CiphertextHandle, Result<SealedValue>)> = JoinSet::new();

        for request in requests {
            let backend = self.backend.clone();
            let public = public.clone();
            let request = *request;
            tasks.spawn(async move {
                let result = match tokio::time::timeout(
                    timeout,
                    backend.user_decrypt(std::slice::from_ref(&request), &public),
                )
                .await
                {
                    Err(_) => Err(ClientError::Timeout("decryption response")),
                    Ok(Err(e)) => Err(e.into()),
                    Ok(Ok(mut sealed)) => sealed
                        .remove(&request.handle)
                        .ok_or(ClientError::MissingResult(request.handle)),
                };
                (request.handle, result)
            });
        }

        let mut values = HashMap::with_capacity(requests.len());
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => None,
                joined = tasks.join_next() => Some(joined),
            };

            let Some(joined) = next else {
                tasks.abort_all();
                return Err(ClientError::Cancelled);
            };
            let Some(joined) = joined else {
                break;
            };

            let (handle, result) = match joined {
                Ok(pair) => pair,
                Err(e) => {
                    tasks.abort_all();
                    return Err(ClientError::BackendUnavailable(format!(
                        "decryption task failed: {}",
                        e
                    )));
                }
            };

            match result.and_then(|sealed| auth.open(&sealed)) {
                Ok(value) => {
                    values.insert(handle, value);
                }
                Err(e) => {
                    tasks.abort_all();
                    return Err(e);
                }
            }
        }

        Ok(values)
    }

    /// Write `staged` into the result set, or nothing if any value diverges.
    fn merge(&self, staged: HashMap<CiphertextHandle, u32>) -> Result<()> {
        let mut results = self.results.write().unwrap_or_else(|e| e.into_inner());

        for (handle, value) in &staged {
            if results.get(handle).is_some_and(|recorded| recorded != value) {
                tracing::error!(handle = %handle, "re-resolved value diverges from recorded value");
                return Err(ClientError::ResultDivergence { handle: *handle });
            }
        }

        let count = staged.len();
        results.extend(staged);
        tracing::info!(resolved = count, "decryption session resolved");
        Ok(())
    }
}
