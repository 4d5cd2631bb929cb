// crates/core/src/ledger.rs
//! Prepaid-credit ledger client.
//!
//! The ledger is an external balance service. The orchestration contract is
//! strict: at most one debit per job (before the pipeline launches) and at
//! most one equal-magnitude credit per job (refund, only from the failure
//! path). Privileged owners never touch the ledger.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The owner's balance cannot cover the requested debit.
    #[error("insufficient credits")]
    InsufficientCredits,

    #[error("ledger request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("ledger returned {status}: {body}")]
    Api { status: u16, body: String },
}

/// Debit/credit operations against the external balance resource.
///
/// The trait is the seam the orchestrator and control surface consume;
/// tests substitute recording fakes.
#[async_trait]
pub trait CreditLedger: Send + Sync {
    /// Remove `amount` credits from the owner's balance, returning the new
    /// balance. Fails with [`LedgerError::InsufficientCredits`] when the
    /// balance cannot cover it.
    async fn debit(&self, owner_id: &str, amount: u64) -> Result<u64, LedgerError>;

    /// Return `amount` credits to the owner's balance (refund), returning
    /// the new balance.
    async fn credit(&self, owner_id: &str, amount: u64) -> Result<u64, LedgerError>;
}

#[derive(Debug, Serialize)]
struct EntryRequest {
    amount: u64,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: u64,
}

/// HTTP implementation against the ledger service.
pub struct HttpLedger {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLedger {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .timeout(Duration::from_secs(15))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn post_entry(
        &self,
        owner_id: &str,
        direction: &str,
        amount: u64,
    ) -> Result<u64, LedgerError> {
        let url = format!("{}/v1/accounts/{}/{}", self.base_url, owner_id, direction);
        let response = self
            .client
            .post(&url)
            .json(&EntryRequest { amount })
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::PAYMENT_REQUIRED {
            return Err(LedgerError::InsufficientCredits);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(LedgerError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.json::<BalanceResponse>().await?;
        Ok(body.balance)
    }
}

#[async_trait]
impl CreditLedger for HttpLedger {
    async fn debit(&self, owner_id: &str, amount: u64) -> Result<u64, LedgerError> {
        self.post_entry(owner_id, "debit", amount).await
    }

    async fn credit(&self, owner_id: &str, amount: u64) -> Result<u64, LedgerError> {
        self.post_entry(owner_id, "credit", amount).await
    }
}
