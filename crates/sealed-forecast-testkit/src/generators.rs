//! Proptest generators for property-based testing.

use proptest::prelude::*;

use sealed_forecast_core::{AccountId, CiphertextHandle, Keypair, RegistryAddress};

/// Last UTC midnight that still fits in 32 bits (2106-02-07).
const MAX_PREDICTION_DAY: u64 = u32::MAX as u64 / 86_400;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random account.
pub fn account() -> impl Strategy<Value = AccountId> {
    keypair().prop_map(|kp| kp.account())
}

/// Generate a non-empty ciphertext handle.
pub fn handle() -> impl Strategy<Value = CiphertextHandle> {
    any::<[u8; 32]>().prop_map(|mut bytes| {
        bytes[0] |= 1;
        CiphertextHandle::from_bytes(bytes)
    })
}

/// Generate a registry address.
pub fn registry_address() -> impl Strategy<Value = RegistryAddress> {
    any::<[u8; 32]>().prop_map(RegistryAddress::from_bytes)
}

/// Generate a prediction: the UTC midnight of some day a u32 can hold.
pub fn prediction() -> impl Strategy<Value = u32> {
    (0..=MAX_PREDICTION_DAY).prop_map(|day| (day * 86_400) as u32)
}

/// One registry call, with parties named by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOp {
    Submit { owner: usize, value: u32 },
    Grant { owner: usize, reader: usize },
    Revoke { owner: usize, reader: usize },
}

/// Generate a single operation among `parties` accounts.
pub fn registry_op(parties: usize) -> impl Strategy<Value = RegistryOp> {
    let idx = 0..parties;
    prop_oneof![
        (idx.clone(), prediction()).prop_map(|(owner, value)| RegistryOp::Submit { owner, value }),
        (idx.clone(), idx.clone()).prop_map(|(owner, reader)| RegistryOp::Grant { owner, reader }),
        (idx.clone(), idx).prop_map(|(owner, reader)| RegistryOp::Revoke { owner, reader }),
    ]
}

/// Generate up to `max_len` operations among `parties` accounts.
pub fn registry_ops(parties: usize, max_len: usize) -> impl Strategy<Value = Vec<RegistryOp>> {
    prop::collection::vec(registry_op(parties), 0..=max_len)
}
