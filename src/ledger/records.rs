//! Typed ledger payloads and the "wait for confirmation" consumer pattern.
//!
//! Producers append JSON records tagged with a `type` field; consumers
//! subscribe and filter on that tag plus a correlating field such as
//! `email`.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::ledger::block::{now_millis, Block};
use crate::ledger::chain::Ledger;
use crate::resilience::{bounded, Elapsed};

/// Account lifecycle events recorded by the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerRecord {
    #[serde(rename_all = "camelCase")]
    UserSignup {
        user_id: String,
        email: String,
        timestamp: u64,
    },
    #[serde(rename_all = "camelCase")]
    UserLogin { user_id: String, timestamp: u64 },
    #[serde(rename_all = "camelCase")]
    PasswordResetRequested { email: String, timestamp: u64 },
    #[serde(rename_all = "camelCase")]
    PasswordResetCompleted { email: String, timestamp: u64 },
}

impl LedgerRecord {
    pub fn user_signup(user_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self::UserSignup {
            user_id: user_id.into(),
            email: email.into(),
            timestamp: now_millis(),
        }
    }

    pub fn user_login(user_id: impl Into<String>) -> Self {
        Self::UserLogin {
            user_id: user_id.into(),
            timestamp: now_millis(),
        }
    }

    pub fn password_reset_requested(email: impl Into<String>) -> Self {
        Self::PasswordResetRequested {
            email: email.into(),
            timestamp: now_millis(),
        }
    }

    pub fn password_reset_completed(email: impl Into<String>) -> Self {
        Self::PasswordResetCompleted {
            email: email.into(),
            timestamp: now_millis(),
        }
    }

    /// Decode a block payload, if it is one of these records.
    pub fn from_block(block: &Block) -> Option<Self> {
        serde_json::from_value(block.payload.clone()).ok()
    }

    /// The `type` tag this record serializes with.
    pub fn kind(&self) -> &'static str {
        match self {
            LedgerRecord::UserSignup { .. } => "user_signup",
            LedgerRecord::UserLogin { .. } => "user_login",
            LedgerRecord::PasswordResetRequested { .. } => "password_reset_requested",
            LedgerRecord::PasswordResetCompleted { .. } => "password_reset_completed",
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            LedgerRecord::UserSignup { email, .. }
            | LedgerRecord::PasswordResetRequested { email, .. }
            | LedgerRecord::PasswordResetCompleted { email, .. } => Some(email),
            LedgerRecord::UserLogin { .. } => None,
        }
    }
}

/// Resolve with the first block appended after this call that satisfies
/// `predicate`, or fail once `limit` elapses (zero = wait forever).
///
/// The listener is registered before this function returns, so blocks
/// appended before the future is first polled are not missed.
pub fn wait_for<F>(
    ledger: &Ledger,
    predicate: F,
    limit: Duration,
) -> impl Future<Output = Result<Arc<Block>, Elapsed>> + Send + 'static
where
    F: Fn(&Block) -> bool + Send + Sync + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = ledger.subscribe(move |block| {
        if predicate(block.as_ref()) {
            let _ = tx.send(block.clone());
        }
        Ok(())
    });

    async move {
        let _subscription = subscription;
        bounded("wait_for_block", limit, async move {
            match rx.recv().await {
                Some(block) => block,
                // The sender lives as long as the subscription.
                None => std::future::pending().await,
            }
        })
        .await
    }
}

/// Wait for the block confirming a password reset for `email`.
pub fn wait_for_reset_completed(
    ledger: &Ledger,
    email: &str,
    limit: Duration,
) -> impl Future<Output = Result<Arc<Block>, Elapsed>> + Send + 'static {
    let email = email.to_string();
    wait_for(
        ledger,
        move |block| {
            matches!(
                LedgerRecord::from_block(block),
                Some(LedgerRecord::PasswordResetCompleted { email: ref e, .. }) if *e == email
            )
        },
        limit,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use serde_json::json;

    #[test]
    fn test_record_wire_shape() {
        let record = LedgerRecord::UserLogin {
            user_id: "u-1".to_string(),
            timestamp: 5,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value, json!({"type": "user_login", "userId": "u-1", "timestamp": 5}));
        assert_eq!(record.kind(), "user_login");
    }

    #[test]
    fn test_foreign_payload_is_not_a_record() {
        let mut block = Block::genesis(1, &crate::ledger::Sha256Hash);
        block.payload = json!({"type": "file_uploaded", "name": "will.pdf"});
        assert!(LedgerRecord::from_block(&block).is_none());
    }

    #[tokio::test]
    async fn test_wait_for_reset_resolves_on_matching_email() {
        let ledger = Ledger::new(&LedgerConfig {
            difficulty: 1,
            mining_timeout_secs: 0,
        })
        .unwrap();

        let waiter = tokio::spawn(wait_for_reset_completed(
            &ledger,
            "heir@example.com",
            Duration::from_secs(10),
        ));
        assert_eq!(ledger.listeners().len(), 1);

        ledger
            .append(&LedgerRecord::password_reset_completed("other@example.com"))
            .await
            .unwrap();
        let expected = ledger
            .append(&LedgerRecord::password_reset_completed("heir@example.com"))
            .await
            .unwrap();

        let block = waiter.await.unwrap().unwrap();
        assert_eq!(block.hash, expected.hash);
        assert!(ledger.listeners().is_empty());
    }

    #[tokio::test]
    async fn test_wait_for_times_out() {
        let ledger = Ledger::new(&LedgerConfig::default()).unwrap();
        let result = wait_for(&ledger, |_| true, Duration::from_millis(50)).await;
        assert_eq!(result.unwrap_err().operation, "wait_for_block");
        assert!(ledger.listeners().is_empty());
    }
}
