//! The prediction session.
//!
//! A [`Forecast`] is what a front end holds for one user: the connected
//! signer, the user's stored handle as last read from the registry, the
//! decryption result set, and a status line. Everything shown to the user is
//! derived from those through [`Forecast::view`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use sealed_forecast_backend::{DecryptRequest, DecryptionBackend, EncryptionBackend};
use sealed_forecast_client::{
    AuthorizationCache, ClientError, DecryptionOrchestrator, EncryptionRequestBuilder,
    LedgerClient, Signer, Status, StatusCategory,
};
use sealed_forecast_core::{
    now_millis, AccountId, CiphertextHandle, RegistryAddress, TransactionBuilder,
};
use sealed_forecast_registry::TxOutcome;

use crate::config::ForecastConfig;
use crate::dates::format_date;
use crate::error::{ForecastError, Result};

/// A connected signer on a given chain.
#[derive(Clone)]
struct Connection {
    signer: Arc<dyn Signer>,
    chain_id: u64,
    cancel: CancellationToken,
}

/// The connected account's registry state, as last loaded.
#[derive(Debug, Clone, Copy)]
struct Prediction {
    account: AccountId,
    has_value: bool,
    handle: CiphertextHandle,
}

/// Everything a front end renders, derived in one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForecastView {
    pub connected: bool,
    pub user_has_predicted: bool,
    pub can_decrypt: bool,
    pub prediction_decrypted: bool,
    /// The decrypted prediction, once resolved.
    pub clear_prediction: Option<u32>,
    /// `clear_prediction` as `YYYY-MM-DD`.
    pub clear_prediction_date: Option<String>,
    pub is_decrypting: bool,
    pub status_msg: Option<String>,
    pub loading: bool,
}

/// Clears the loading flag when a submission ends.
struct Loading<'a>(&'a AtomicBool);

impl Drop for Loading<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// One user's prediction session.
pub struct Forecast {
    ledger: Arc<dyn LedgerClient>,
    encryption: EncryptionRequestBuilder,
    orchestrator: DecryptionOrchestrator,
    config: ForecastConfig,
    connection: RwLock<Option<Connection>>,
    prediction: RwLock<Option<Prediction>>,
    status: RwLock<Option<Status>>,
    loading: AtomicBool,
    nonce: AtomicU64,
}

impl Forecast {
    /// Create a disconnected session.
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        encryption: Arc<dyn EncryptionBackend>,
        decryption: Arc<dyn DecryptionBackend>,
        config: ForecastConfig,
    ) -> Self {
        let orchestrator = DecryptionOrchestrator::new(
            decryption,
            Arc::new(AuthorizationCache::new()),
            config.decryption.clone(),
        );
        Self {
            ledger,
            encryption: EncryptionRequestBuilder::new(encryption),
            orchestrator,
            config,
            connection: RwLock::new(None),
            prediction: RwLock::new(None),
            status: RwLock::new(None),
            loading: AtomicBool::new(false),
            nonce: AtomicU64::new(now_millis().max(0) as u64),
        }
    }

    pub fn registry(&self) -> RegistryAddress {
        self.ledger.registry()
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn orchestrator(&self) -> &DecryptionOrchestrator {
        &self.orchestrator
    }

    /// The connected account, if any.
    pub fn account(&self) -> Option<AccountId> {
        self.read_connection().map(|c| c.signer.account())
    }

    pub fn chain_id(&self) -> Option<u64> {
        self.read_connection().map(|c| c.chain_id)
    }

    pub fn status(&self) -> Option<Status> {
        self.status.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connection
    // ─────────────────────────────────────────────────────────────────────────

    /// Connect `signer` on `chain_id` and load its stored prediction.
    ///
    /// Switching account or chain resets the status line and cancels anything
    /// running under the previous connection. Switching account also forgets
    /// resolved values.
    pub async fn connect(&self, signer: Arc<dyn Signer>, chain_id: u64) -> Result<()> {
        let account = signer.account();
        let (changed, previous) = {
            let mut slot = self.connection.write().unwrap_or_else(|e| e.into_inner());
            let unchanged = slot
                .as_ref()
                .is_some_and(|c| c.signer.account() == account && c.chain_id == chain_id);
            if unchanged {
                (false, None)
            } else {
                let old = slot.replace(Connection {
                    signer,
                    chain_id,
                    cancel: CancellationToken::new(),
                });
                (true, old)
            }
        };

        if changed {
            if let Some(old) = previous {
                old.cancel.cancel();
                if old.signer.account() != account {
                    self.orchestrator.clear_results();
                }
            }
            *self.prediction.write().unwrap_or_else(|e| e.into_inner()) = None;
            self.reset_status();
            tracing::info!(account = %account, chain_id, "connected");
        }

        self.reload().await
    }

    /// Drop the connection, cancelling anything in flight.
    pub fn disconnect(&self) {
        let old = self
            .connection
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(old) = old {
            old.cancel.cancel();
            tracing::info!(account = %old.signer.account(), "disconnected");
        }
        *self.prediction.write().unwrap_or_else(|e| e.into_inner()) = None;
        self.orchestrator.clear_results();
        self.reset_status();
    }

    /// Re-read the connected account's prediction from the registry.
    pub async fn reload(&self) -> Result<()> {
        let conn = self.connected()?;
        let account = conn.signer.account();

        let has_value = self.ledger.has_value(&account).await?;
        let handle = if has_value {
            self.ledger.value_of(&account).await?
        } else {
            CiphertextHandle::EMPTY
        };

        // The account may have switched while we were reading.
        if self.account() == Some(account) {
            *self.prediction.write().unwrap_or_else(|e| e.into_inner()) = Some(Prediction {
                account,
                has_value,
                handle,
            });
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Submission
    // ─────────────────────────────────────────────────────────────────────────

    /// Encrypt `timestamp` and store it as the connected account's prediction.
    ///
    /// Refuses to start while another submission is running. On success the
    /// stored handle is reloaded, so `view` reflects the new prediction.
    pub async fn submit_prediction(&self, label: &str, timestamp: u64) -> Result<TxOutcome> {
        let conn = self.connected()?;

        if self
            .loading
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ForecastError::SubmissionInFlight);
        }
        let _loading = Loading(&self.loading);

        match self.submit_inner(&conn, label, timestamp).await {
            Ok(outcome) => {
                self.set_status(Status::info(format!("Prediction submitted for {}", label)));
                Ok(outcome)
            }
            Err(ForecastError::Cancelled) => Err(ForecastError::Cancelled),
            Err(e) => {
                tracing::warn!(error = %e, "prediction submission failed");
                self.set_status(Status::failure(
                    StatusCategory::Submission,
                    format!("Error submitting prediction: {}", e),
                ));
                Err(e)
            }
        }
    }

    async fn submit_inner(&self, conn: &Connection, label: &str, timestamp: u64) -> Result<TxOutcome> {
        let registry = self.ledger.registry();
        let account = conn.signer.account();

        self.set_status(Status::info(format!(
            "Encrypting prediction {} for {}...",
            timestamp, label
        )));
        let input = tokio::select! {
            _ = conn.cancel.cancelled() => return Err(ForecastError::Cancelled),
            input = self.encryption.build(timestamp, &account, &registry) => input?,
        };

        let builder = TransactionBuilder::submit(registry, input.handle, input.proof)
            .nonce(self.next_nonce())
            .timestamp(now_millis());
        let tx = conn.signer.sign_transaction(builder).await?;

        self.set_status(Status::info("Waiting for transaction confirmation..."));
        let confirmation = tokio::time::timeout(
            self.config.submission_timeout(),
            self.ledger.send_transaction(&tx),
        );
        let outcome = tokio::select! {
            _ = conn.cancel.cancelled() => return Err(ForecastError::Cancelled),
            sent = confirmation => sent.map_err(|_| ForecastError::SubmissionTimeout)??,
        };

        tracing::info!(account = %account, seq = outcome.seq, "prediction submitted");
        self.reload().await?;
        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readers
    // ─────────────────────────────────────────────────────────────────────────

    /// Let `reader` decrypt the connected account's prediction.
    pub async fn grant(&self, reader: &AccountId) -> Result<TxOutcome> {
        let builder = TransactionBuilder::grant(self.ledger.registry(), *reader);
        self.send_permission(builder).await
    }

    /// Withdraw `reader`'s right to decrypt.
    ///
    /// Values the reader already decrypted stay in their result set; any
    /// further request is refused by the backend.
    pub async fn revoke(&self, reader: &AccountId) -> Result<TxOutcome> {
        let builder = TransactionBuilder::revoke(self.ledger.registry(), *reader);
        self.send_permission(builder).await
    }

    async fn send_permission(&self, builder: TransactionBuilder) -> Result<TxOutcome> {
        let conn = self.connected()?;
        let tx = conn
            .signer
            .sign_transaction(builder.nonce(self.next_nonce()).timestamp(now_millis()))
            .await?;
        let outcome = tokio::select! {
            _ = conn.cancel.cancelled() => return Err(ForecastError::Cancelled),
            sent = tokio::time::timeout(self.config.submission_timeout(), self.ledger.send_transaction(&tx)) => {
                sent.map_err(|_| ForecastError::SubmissionTimeout)??
            }
        };
        Ok(outcome)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Decryption
    // ─────────────────────────────────────────────────────────────────────────

    /// Decrypt the connected account's prediction.
    pub async fn decrypt_my_prediction(&self) -> Result<u32> {
        let conn = self.connected()?;
        let handle = self
            .current_prediction()
            .filter(|p| p.has_value && !p.handle.is_empty())
            .map(|p| p.handle)
            .ok_or(ForecastError::NothingToDecrypt)?;
        self.decrypt_handle(&conn, handle).await
    }

    /// Decrypt `owner`'s prediction, if they have authorized the connected
    /// account.
    pub async fn decrypt_prediction_of(&self, owner: &AccountId) -> Result<u32> {
        let conn = self.connected()?;
        let handle = self.ledger.value_of(owner).await?;
        if handle.is_empty() {
            return Err(ForecastError::NothingToDecrypt);
        }
        self.decrypt_handle(&conn, handle).await
    }

    async fn decrypt_handle(&self, conn: &Connection, handle: CiphertextHandle) -> Result<u32> {
        let request = DecryptRequest {
            handle,
            scope: self.ledger.registry(),
        };
        self.set_status(Status::info("Decrypting prediction..."));

        let result = self
            .orchestrator
            .decrypt(conn.signer.as_ref(), &[request], &conn.cancel)
            .await
            .and_then(|values| {
                values
                    .get(&handle)
                    .copied()
                    .ok_or(ClientError::MissingResult(handle))
            });

        match result {
            Ok(value) => {
                self.set_status(Status::info("Prediction decrypted"));
                Ok(value)
            }
            // The connection that asked is gone; its status was already reset.
            Err(ClientError::Cancelled) => Err(ForecastError::Cancelled),
            Err(e) => {
                let message = match e.category() {
                    StatusCategory::Authorization => format!("Authorization failed: {}", e),
                    _ => format!("Error decrypting prediction: {}", e),
                };
                self.set_status(Status::failure(e.category(), message));
                Err(e.into())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // View
    // ─────────────────────────────────────────────────────────────────────────

    /// Derive what the front end shows from the loaded prediction, the result
    /// set, and the session flags.
    pub fn view(&self) -> ForecastView {
        let connected = self.read_connection().is_some();
        let prediction = self.current_prediction();
        let user_has_predicted = prediction.is_some_and(|p| p.has_value);
        let handle = prediction.map(|p| p.handle).unwrap_or(CiphertextHandle::EMPTY);

        let clear_prediction = if handle.is_empty() {
            None
        } else {
            self.orchestrator.resolved_value(&handle)
        };

        ForecastView {
            connected,
            user_has_predicted,
            can_decrypt: self
                .orchestrator
                .can_decrypt(connected, user_has_predicted, &[handle]),
            prediction_decrypted: clear_prediction.is_some(),
            clear_prediction,
            clear_prediction_date: clear_prediction.and_then(|v| format_date(u64::from(v)).ok()),
            is_decrypting: self.orchestrator.is_in_flight(),
            status_msg: self.status().map(|s| s.message),
            loading: self.loading.load(Ordering::SeqCst),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn read_connection(&self) -> Option<Connection> {
        self.connection.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn connected(&self) -> Result<Connection> {
        self.read_connection().ok_or(ForecastError::NotConnected)
    }

    /// The loaded prediction, if it belongs to the connected account.
    fn current_prediction(&self) -> Option<Prediction> {
        let account = self.account()?;
        let prediction = *self.prediction.read().unwrap_or_else(|e| e.into_inner());
        prediction.filter(|p| p.account == account)
    }

    fn set_status(&self, status: Status) {
        tracing::debug!(status = %status, "status");
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = Some(status);
    }

    fn reset_status(&self) {
        *self.status.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn next_nonce(&self) -> u64 {
        self.nonce.fetch_add(1, Ordering::SeqCst)
    }
}
