//! Transaction validation: signature verification and structural checks.

use crate::canonical::canonical_body_bytes;
use crate::error::ValidationError;
use crate::transaction::{RegistryCall, Transaction, MAX_PROOF_LEN, TX_VERSION};

/// Validate a transaction's structure and signature.
///
/// This performs:
/// - Version check
/// - Call structure (non-empty handle and bounded proof on submissions)
/// - Signature verification against the claimed caller
pub fn validate_transaction(tx: &Transaction) -> Result<(), ValidationError> {
    validate_transaction_structure(tx)?;

    let message = canonical_body_bytes(&tx.header, &tx.call);
    tx.header
        .caller
        .verify(&message, &tx.signature)
        .map_err(|_| ValidationError::SignatureFailed)?;

    Ok(())
}

/// Validate transaction structure without signature verification.
///
/// Useful for entries read back from trusted storage.
pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), ValidationError> {
    if tx.header.version != TX_VERSION {
        return Err(ValidationError::UnsupportedVersion(tx.header.version));
    }

    if let RegistryCall::Submit { handle, proof } = &tx.call {
        if handle.is_empty() {
            return Err(ValidationError::EmptyHandle);
        }
        if proof.is_empty() {
            return Err(ValidationError::EmptyProof);
        }
        if proof.len() > MAX_PROOF_LEN {
            return Err(ValidationError::ProofTooLarge(proof.len()));
        }
    }

    Ok(())
}
