//! Decoding of provider responses.

use alloy::primitives::{Address, U256};
use serde_json::Value;

use crate::wallet::types::{WalletError, WalletResult};

/// Decode an account list (array of hex address strings).
pub fn parse_accounts(value: &Value) -> WalletResult<Vec<Address>> {
    let items = value
        .as_array()
        .ok_or_else(|| WalletError::Protocol(format!("expected account array, got {}", value)))?;

    items
        .iter()
        .map(|item| {
            item.as_str()
                .and_then(|s| s.parse::<Address>().ok())
                .ok_or_else(|| WalletError::Protocol(format!("invalid account {}", item)))
        })
        .collect()
}

/// Decode a quantity: `0x`-prefixed hex string, decimal string or JSON number.
pub fn parse_quantity(value: &Value) -> WalletResult<U256> {
    match value {
        Value::String(s) => s
            .parse::<U256>()
            .map_err(|e| WalletError::Protocol(format!("invalid quantity '{}': {}", s, e))),
        Value::Number(n) => n
            .as_u64()
            .map(|n| U256::from(n))
            .ok_or_else(|| WalletError::Protocol(format!("invalid quantity {}", n))),
        other => Err(WalletError::Protocol(format!("expected quantity, got {}", other))),
    }
}

/// Decode a quantity that must fit in a u64 (chain ids, block heights).
pub fn parse_u64(value: &Value) -> WalletResult<u64> {
    let quantity = parse_quantity(value)?;
    u64::try_from(quantity)
        .map_err(|_| WalletError::Protocol(format!("quantity {} exceeds u64", quantity)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_accounts_accepts_any_case() {
        let value = json!([
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "0x70997970C51812dc3A010C7d01b50e0d17dc79C8"
        ]);
        let accounts = parse_accounts(&value).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(
            accounts[0].to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
    }

    #[test]
    fn test_parse_accounts_rejects_garbage() {
        assert!(matches!(parse_accounts(&json!("0xabc")), Err(WalletError::Protocol(_))));
        assert!(matches!(parse_accounts(&json!(["nope"])), Err(WalletError::Protocol(_))));
        assert_eq!(parse_accounts(&json!([])).unwrap(), Vec::<Address>::new());
    }

    #[test]
    fn test_parse_quantity_forms() {
        assert_eq!(parse_quantity(&json!("0x1bc16d674ec80000")).unwrap(), U256::from(2_000_000_000_000_000_000u128));
        assert_eq!(parse_quantity(&json!("1000")).unwrap(), U256::from(1000u64));
        assert_eq!(parse_quantity(&json!(42)).unwrap(), U256::from(42u64));
        assert!(parse_quantity(&json!(null)).is_err());
    }

    #[test]
    fn test_parse_u64_bounds() {
        assert_eq!(parse_u64(&json!("0xaa36a7")).unwrap(), 11155111);
        assert!(parse_u64(&json!("0x10000000000000000")).is_err());
    }
}
