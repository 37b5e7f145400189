//! Deterministic CBOR for transaction bodies.
//!
//! Follows RFC 8949 core deterministic encoding: shortest-form integers and
//! lengths, definite lengths, map keys ordered by their encoded bytes, and
//! no floats. The canonical encoding is what gets signed and hashed, so the same
//! transaction produces identical bytes (and thus an identical [`TxId`])
//! on every platform. Decoding rejects any body that does not re-encode to
//! the exact input bytes.
//!
//! [`TxId`]: crate::types::TxId

use std::io::Cursor;

use bytes::Bytes;
use ciborium::value::Value;

use crate::crypto::{AccountId, Signature};
use crate::error::CoreError;
use crate::transaction::{CallKind, RegistryCall, Transaction, TransactionHeader};
use crate::types::{CiphertextHandle, RegistryAddress};

/// Integer map keys of a transaction body. All below 24, so one byte each.
mod keys {
    pub const VERSION: u64 = 0;
    pub const REGISTRY: u64 = 1;
    pub const CALLER: u64 = 2;
    pub const NONCE: u64 = 3;
    pub const TIMESTAMP: u64 = 4;
    pub const KIND: u64 = 5;
    pub const TARGET: u64 = 6;
    pub const PROOF: u64 = 7;
    pub const OWNER: u64 = 8;
}

/// Length of the trailing signature in [`canonical_bytes`].
const SIGNATURE_LEN: usize = 64;

/// Encode a transaction body (header + call) to canonical CBOR bytes.
///
/// This is the message the caller signs.
pub fn canonical_body_bytes(header: &TransactionHeader, call: &RegistryCall) -> Vec<u8> {
    encode_canonical(&body_to_cbor_value(header, call))
}

/// Encode an entire transaction to canonical bytes.
///
/// Format: canonical_body || signature
pub fn canonical_bytes(tx: &Transaction) -> Vec<u8> {
    let mut buf = canonical_body_bytes(&tx.header, &tx.call);
    buf.extend_from_slice(&tx.signature.0);
    buf
}

/// Encode any CBOR value canonically.
///
/// Shared with other crates that sign structured messages.
///
/// # Panics
///
/// Panics on floats and tags, which have no canonical form here.
pub fn encode_canonical(value: &Value) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value);
    buf
}

/// Convert a body to a CBOR Value (map with integer keys).
fn body_to_cbor_value(header: &TransactionHeader, call: &RegistryCall) -> Value {
    let int = |n: u64| Value::Integer(n.into());

    let mut entries = vec![
        (int(keys::VERSION), Value::Integer(header.version.into())),
        (int(keys::REGISTRY), Value::Bytes(header.registry.0.to_vec())),
        (int(keys::CALLER), Value::Bytes(header.caller.0.to_vec())),
        (int(keys::OWNER), Value::Bytes(header.owner.0.to_vec())),
        (int(keys::NONCE), Value::Integer(header.nonce.into())),
        (int(keys::TIMESTAMP), Value::Integer(header.timestamp.into())),
        (int(keys::KIND), Value::Integer(call.kind().to_u16().into())),
    ];

    match call {
        RegistryCall::Submit { handle, proof } => {
            entries.push((int(keys::TARGET), Value::Bytes(handle.0.to_vec())));
            entries.push((int(keys::PROOF), Value::Bytes(proof.to_vec())));
        }
        RegistryCall::Grant { reader } | RegistryCall::Revoke { reader } => {
            entries.push((int(keys::TARGET), Value::Bytes(reader.0.to_vec())));
        }
    }

    Value::Map(entries)
}

// CBOR major types.
const MAJOR_UINT: u8 = 0;
const MAJOR_NEGINT: u8 = 1;
const MAJOR_BYTES: u8 = 2;
const MAJOR_TEXT: u8 = 3;
const MAJOR_ARRAY: u8 = 4;
const MAJOR_MAP: u8 = 5;

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Integer(i) => match u64::try_from(i128::from(*i)) {
            Ok(n) => write_head(buf, MAJOR_UINT, n),
            // -1 - n for negatives; ciborium integers fit the 64-bit range.
            Err(_) => write_head(buf, MAJOR_NEGINT, (-1 - i128::from(*i)) as u64),
        },
        Value::Bytes(b) => {
            write_head(buf, MAJOR_BYTES, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            write_head(buf, MAJOR_TEXT, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(items) => {
            write_head(buf, MAJOR_ARRAY, items.len() as u64);
            items.iter().for_each(|item| encode_value_to(buf, item));
        }
        Value::Map(entries) => write_sorted_map(buf, entries),
        Value::Bool(false) => buf.push(0xf4),
        Value::Bool(true) => buf.push(0xf5),
        Value::Null => buf.push(0xf6),
        other => panic!("no canonical encoding for {other:?}"),
    }
}

/// Initial byte plus the shortest argument that holds `arg`.
fn write_head(buf: &mut Vec<u8>, major: u8, arg: u64) {
    let major = major << 5;
    match arg {
        0..=23 => buf.push(major | arg as u8),
        24..=0xff => buf.extend_from_slice(&[major | 24, arg as u8]),
        0x100..=0xffff => {
            buf.push(major | 25);
            buf.extend_from_slice(&(arg as u16).to_be_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            buf.push(major | 26);
            buf.extend_from_slice(&(arg as u32).to_be_bytes());
        }
        _ => {
            buf.push(major | 27);
            buf.extend_from_slice(&arg.to_be_bytes());
        }
    }
}

/// Entries ordered by the bytewise order of their encoded keys.
fn write_sorted_map(buf: &mut Vec<u8>, entries: &[(Value, Value)]) {
    let mut encoded: Vec<(Vec<u8>, &Value)> = entries
        .iter()
        .map(|(key, value)| (encode_canonical(key), value))
        .collect();
    encoded.sort_unstable_by(|(a, _), (b, _)| a.cmp(b));

    write_head(buf, MAJOR_MAP, encoded.len() as u64);
    for (key, value) in encoded {
        buf.extend_from_slice(&key);
        encode_value_to(buf, value);
    }
}

/// Decode a transaction from canonical bytes.
pub fn decode_transaction(bytes: &[u8]) -> Result<Transaction, CoreError> {
    if bytes.len() <= SIGNATURE_LEN {
        return Err(CoreError::MalformedTransaction("too short".into()));
    }

    let mut cursor = Cursor::new(bytes);
    let value: Value =
        ciborium::from_reader(&mut cursor).map_err(|e| CoreError::DecodingError(e.to_string()))?;
    let body_len = cursor.position() as usize;

    let (header, call) = cbor_value_to_body(&value)?;

    // Reject alternative encodings of the same body.
    if canonical_body_bytes(&header, &call) != bytes[..body_len] {
        return Err(CoreError::MalformedTransaction(
            "body is not canonically encoded".into(),
        ));
    }

    let remaining = &bytes[body_len..];
    if remaining.len() != SIGNATURE_LEN {
        return Err(CoreError::MalformedTransaction(format!(
            "expected {} signature bytes, got {}",
            SIGNATURE_LEN,
            remaining.len()
        )));
    }
    let signature = Signature::try_from(remaining)?;

    Ok(Transaction {
        header,
        call,
        signature,
    })
}

/// Convert a CBOR Value (map) back to a header and call.
fn cbor_value_to_body(value: &Value) -> Result<(TransactionHeader, RegistryCall), CoreError> {
    let map = match value {
        Value::Map(m) => m,
        _ => return Err(CoreError::MalformedTransaction("expected map".into())),
    };

    let get = |key: u64| -> Option<&Value> {
        map.iter()
            .find(|(k, _)| matches!(k, Value::Integer(i) if i128::from(*i) == key as i128))
            .map(|(_, v)| v)
    };

    let get_int = |key: u64, name: &str| -> Result<i128, CoreError> {
        match get(key) {
            Some(Value::Integer(i)) => Ok(i128::from(*i)),
            _ => Err(CoreError::MalformedTransaction(format!("missing {}", name))),
        }
    };

    let get_bytes32 = |key: u64, name: &str| -> Result<[u8; 32], CoreError> {
        match get(key) {
            Some(Value::Bytes(b)) if b.len() == 32 => {
                let mut arr = [0u8; 32];
                arr.copy_from_slice(b);
                Ok(arr)
            }
            _ => Err(CoreError::MalformedTransaction(format!("invalid {}", name))),
        }
    };

    let version = u8::try_from(get_int(keys::VERSION, "version")?)
        .map_err(|_| CoreError::MalformedTransaction("version out of range".into()))?;
    let registry = RegistryAddress(get_bytes32(keys::REGISTRY, "registry")?);
    let caller = AccountId(get_bytes32(keys::CALLER, "caller")?);
    let owner = AccountId(get_bytes32(keys::OWNER, "owner")?);
    let nonce = u64::try_from(get_int(keys::NONCE, "nonce")?)
        .map_err(|_| CoreError::MalformedTransaction("nonce out of range".into()))?;
    let timestamp = i64::try_from(get_int(keys::TIMESTAMP, "timestamp")?)
        .map_err(|_| CoreError::MalformedTransaction("timestamp out of range".into()))?;

    let kind_raw = get_int(keys::KIND, "kind")?;
    let kind = u16::try_from(kind_raw)
        .ok()
        .and_then(CallKind::from_u16)
        .ok_or_else(|| CoreError::MalformedTransaction(format!("invalid kind: {}", kind_raw)))?;

    let target = get_bytes32(keys::TARGET, "target")?;

    let call = match kind {
        CallKind::Submit => {
            let proof = match get(keys::PROOF) {
                Some(Value::Bytes(b)) => Bytes::from(b.clone()),
                _ => return Err(CoreError::MalformedTransaction("missing proof".into())),
            };
            RegistryCall::Submit {
                handle: CiphertextHandle(target),
                proof,
            }
        }
        CallKind::Grant => RegistryCall::Grant {
            reader: AccountId(target),
        },
        CallKind::Revoke => RegistryCall::Revoke {
            reader: AccountId(target),
        },
    };

    let header = TransactionHeader {
        version,
        registry,
        caller,
        owner,
        nonce,
        timestamp,
    };

    Ok((header, call))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::transaction::TransactionBuilder;
    use crate::types::TxId;

    fn registry() -> RegistryAddress {
        RegistryAddress::from_bytes([0x77; 32])
    }

    fn sample_submit() -> Transaction {
        let keypair = Keypair::from_seed(&[0x42; 32]);
        TransactionBuilder::submit(
            registry(),
            CiphertextHandle::from_bytes([0x11; 32]),
            vec![0xde, 0xad, 0xbe, 0xef],
        )
        .nonce(7)
        .timestamp(1736870400000)
        .sign(&keypair)
    }

    #[test]
    fn test_canonical_encoding_deterministic() {
        let tx = sample_submit();
        assert_eq!(canonical_bytes(&tx), canonical_bytes(&tx));
    }

    #[test]
    fn test_shortest_integer_form() {
        let cases: [(i64, &[u8]); 6] = [
            (0, &[0x00]),
            (23, &[0x17]),
            (24, &[0x18, 24]),
            (256, &[0x19, 0x01, 0x00]),
            (1672531200, &[0x1a, 0x63, 0xb0, 0xcd, 0x00]),
            (-1, &[0x20]),
        ];
        for (n, expected) in cases {
            assert_eq!(encode_canonical(&Value::Integer(n.into())), expected, "{n}");
        }
    }

    #[test]
    fn test_submit_roundtrip() {
        let tx = sample_submit();
        let decoded = decode_transaction(&canonical_bytes(&tx)).unwrap();
        assert_eq!(tx, decoded);
    }

    #[test]
    fn test_grant_roundtrip() {
        let keypair = Keypair::from_seed(&[0x01; 32]);
        let tx = TransactionBuilder::grant(registry(), AccountId::from_bytes([0x02; 32]))
            .sign(&keypair);

        let decoded = decode_transaction(&canonical_bytes(&tx)).unwrap();
        assert_eq!(decoded.call, tx.call);
        assert_eq!(decoded.compute_id(), tx.compute_id());
    }

    #[test]
    fn test_id_from_canonical_bytes() {
        let tx = sample_submit();
        let manual = TxId(crate::types::Blake3Hash::hash(&canonical_bytes(&tx)).0);
        assert_eq!(tx.compute_id(), manual);
    }

    #[test]
    fn test_explicit_owner_roundtrip() {
        let keypair = Keypair::from_seed(&[0x01; 32]);
        let tx = TransactionBuilder::revoke(registry(), AccountId::from_bytes([0x02; 32]))
            .owner(AccountId::from_bytes([0x03; 32]))
            .sign(&keypair);

        let decoded = decode_transaction(&canonical_bytes(&tx)).unwrap();
        assert_eq!(decoded.header.owner, AccountId::from_bytes([0x03; 32]));
        assert_eq!(decoded.header.caller, keypair.account());
    }

    #[test]
    fn test_truncated_signature_rejected() {
        let tx = sample_submit();
        let mut bytes = canonical_bytes(&tx);
        bytes.pop();
        assert!(decode_transaction(&bytes).is_err());
    }

    #[test]
    fn test_map_keys_sorted_by_encoding() {
        let map = Value::Map(vec![
            (Value::Integer(7.into()), Value::Integer(70.into())),
            (Value::Integer(0.into()), Value::Null),
            (Value::Integer(5.into()), Value::Bool(true)),
        ]);

        assert_eq!(
            encode_canonical(&map),
            vec![0xa3, 0x00, 0xf6, 0x05, 0xf5, 0x07, 0x18, 70]
        );
    }

    proptest::proptest! {
        #[test]
        fn prop_decode_arbitrary_bytes_never_panics(bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..256)) {
            let _ = decode_transaction(&bytes);
        }

        #[test]
        fn prop_signed_grant_decodes_to_same_id(seed in proptest::prelude::any::<[u8; 32]>(), nonce in proptest::prelude::any::<u64>()) {
            let keypair = Keypair::from_seed(&seed);
            let tx = TransactionBuilder::grant(registry(), AccountId::from_bytes([0x09; 32]))
                .nonce(nonce)
                .sign(&keypair);
            let decoded = decode_transaction(&canonical_bytes(&tx)).unwrap();
            proptest::prop_assert_eq!(decoded.compute_id(), tx.compute_id());
        }
    }
}
