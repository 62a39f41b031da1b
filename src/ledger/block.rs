//! Block structure and canonical encoding.
//!
//! The hashed string is `index ++ timestamp ++ canonical_json(payload) ++
//! previous_hash ++ nonce`, integers in decimal. `canonical_json` is compact
//! JSON with object keys sorted, so the digest does not depend on the order
//! in which a producer built its record.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ledger::digest::HashFunction;
use crate::ledger::types::{LedgerError, LedgerResult};

/// `previous_hash` carried by the genesis block.
pub const GENESIS_PREVIOUS_HASH: &str = "0";

/// Payload of the genesis block.
pub const GENESIS_PAYLOAD: &str = "Genesis Block";

/// One sealed ledger record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub index: u64,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub payload: Value,
    pub previous_hash: String,
    pub nonce: u64,
    pub hash: String,
}

impl Block {
    /// Build the genesis block. Its hash is computed, not mined.
    pub fn genesis(timestamp: u64, hasher: &dyn HashFunction) -> Self {
        let payload = Value::String(GENESIS_PAYLOAD.to_string());
        let prefix = hash_prefix(0, timestamp, &canonical_json(&payload), GENESIS_PREVIOUS_HASH);
        let hash = hasher.digest(&format!("{}{}", prefix, 0));

        Self {
            index: 0,
            timestamp,
            payload,
            previous_hash: GENESIS_PREVIOUS_HASH.to_string(),
            nonce: 0,
            hash,
        }
    }

    /// Recompute the digest from this block's own fields.
    pub fn compute_hash(&self, hasher: &dyn HashFunction) -> String {
        let prefix = hash_prefix(
            self.index,
            self.timestamp,
            &canonical_json(&self.payload),
            &self.previous_hash,
        );
        hasher.digest(&format!("{}{}", prefix, self.nonce))
    }

    /// `type` field of a structured payload, if any.
    pub fn record_type(&self) -> Option<&str> {
        self.payload.get("type").and_then(Value::as_str)
    }
}

/// Everything in the canonical form except the trailing nonce.
pub fn hash_prefix(index: u64, timestamp: u64, payload_json: &str, previous_hash: &str) -> String {
    format!("{}{}{}{}", index, timestamp, payload_json, previous_hash)
}

/// Convert a caller payload into a JSON value.
pub fn encode_payload<P: Serialize + ?Sized>(payload: &P) -> LedgerResult<Value> {
    serde_json::to_value(payload).map_err(|e| LedgerError::Serialization(e.to_string()))
}

/// Compact JSON with object keys in sorted order.
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(&map[key.as_str()], out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::digest::Sha256Hash;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_canonical_json_sorts_keys_recursively() {
        let value = json!({"b": 1, "a": {"z": [true, null], "y": "x"}});
        assert_eq!(canonical_json(&value), r#"{"a":{"y":"x","z":[true,null]},"b":1}"#);
    }

    #[test]
    fn test_canonical_json_escapes_strings() {
        let value = json!({"quote\"key": "line\nbreak"});
        assert_eq!(canonical_json(&value), r#"{"quote\"key":"line\nbreak"}"#);
    }

    #[test]
    fn test_genesis_shape() {
        let genesis = Block::genesis(1_700_000_000_000, &Sha256Hash);
        assert_eq!(genesis.index, 0);
        assert_eq!(genesis.previous_hash, "0");
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.hash, genesis.compute_hash(&Sha256Hash));
    }

    #[test]
    fn test_hash_covers_canonical_form() {
        let block = Block {
            index: 1,
            timestamp: 42,
            payload: json!("hello"),
            previous_hash: "abc".to_string(),
            nonce: 7,
            hash: String::new(),
        };
        assert_eq!(block.compute_hash(&Sha256Hash), Sha256Hash.digest("142\"hello\"abc7"));
    }

    #[test]
    fn test_non_string_keys_fail_to_encode() {
        let mut map = BTreeMap::new();
        map.insert(vec![1u8, 2], "value");
        let result = encode_payload(&map);
        assert!(matches!(result, Err(LedgerError::Serialization(_))));
    }

    #[test]
    fn test_block_json_field_names() {
        let block = Block::genesis(1, &Sha256Hash);
        let json = serde_json::to_value(&block).unwrap();
        assert!(json.get("previousHash").is_some());
        assert_eq!(json["payload"], "Genesis Block");
    }

    #[test]
    fn test_record_type() {
        let mut block = Block::genesis(1, &Sha256Hash);
        assert_eq!(block.record_type(), None);
        block.payload = json!({"type": "user_login", "userId": "u1"});
        assert_eq!(block.record_type(), Some("user_login"));
    }
}
