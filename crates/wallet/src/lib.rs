use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{Address, TxHash, TxStatus},
    error::{ApiError, ErrorCode},
    protocol::{AuthorizeResponse, SubmitTransactionResponse, TransactionRequest, TxReceipt},
};
use thiserror::Error;
use tracing::{debug, info};

const DEFAULT_RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(1500);

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("no wallet provider is reachable: {0}")]
    ProviderUnavailable(String),
    #[error("declined by the user: {0}")]
    Rejected(String),
    #[error("wallet rejected the transaction payload: {0}")]
    InvalidRequest(String),
    #[error("wallet transport failure: {0}")]
    Transport(reqwest::Error),
    #[error("unexpected wallet response: {0}")]
    UnexpectedResponse(String),
}

/// Consumed wallet-provider surface: account authorization, signing plus
/// submission, and the wait-for-acceptance primitive. Implementations own
/// the key material; callers never see it.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Request authorized accounts. May prompt the user, who may decline.
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError>;

    /// Sign and submit a mutation. Resolves as soon as the ledger accepts
    /// the submission, not when it is included.
    async fn submit_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TxHash, WalletError>;

    /// Block until the submitted transaction is durably included. No
    /// timeout: an unresponsive ledger leaves the caller pending.
    async fn wait_for_inclusion(&self, tx_hash: &TxHash) -> Result<TxReceipt, WalletError>;
}

pub struct MissingWalletConnector;

#[async_trait]
impl WalletConnector for MissingWalletConnector {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        Err(WalletError::ProviderUnavailable(
            "no wallet bridge configured".into(),
        ))
    }

    async fn submit_transaction(
        &self,
        _request: &TransactionRequest,
    ) -> Result<TxHash, WalletError> {
        Err(WalletError::ProviderUnavailable(
            "no wallet bridge configured".into(),
        ))
    }

    async fn wait_for_inclusion(&self, _tx_hash: &TxHash) -> Result<TxReceipt, WalletError> {
        Err(WalletError::ProviderUnavailable(
            "no wallet bridge configured".into(),
        ))
    }
}

#[derive(Debug, Clone)]
pub struct WalletBridgeOptions {
    pub base_url: String,
    pub receipt_poll_interval: Duration,
}

impl WalletBridgeOptions {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            receipt_poll_interval: DEFAULT_RECEIPT_POLL_INTERVAL,
        }
    }
}

/// HTTP adapter for a local wallet bridge daemon, the stand-in for a
/// browser-injected provider.
pub struct HttpWalletConnector {
    http: Client,
    options: WalletBridgeOptions,
}

impl HttpWalletConnector {
    pub fn new(options: WalletBridgeOptions) -> Self {
        Self {
            http: Client::new(),
            options,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.options.base_url.trim_end_matches('/'))
    }
}

fn transport_error(err: reqwest::Error) -> WalletError {
    if err.is_connect() || err.is_timeout() {
        WalletError::ProviderUnavailable(err.to_string())
    } else {
        WalletError::Transport(err)
    }
}

async fn error_from_response(response: reqwest::Response) -> WalletError {
    let status = response.status();
    match response.json::<ApiError>().await {
        Ok(api) => match api.code {
            ErrorCode::Rejected => WalletError::Rejected(api.message),
            ErrorCode::Unavailable => WalletError::ProviderUnavailable(api.message),
            ErrorCode::Validation => WalletError::InvalidRequest(api.message),
            _ => WalletError::UnexpectedResponse(format!("{status}: {}", api.message)),
        },
        Err(_) => WalletError::UnexpectedResponse(format!("wallet bridge returned {status}")),
    }
}

#[async_trait]
impl WalletConnector for HttpWalletConnector {
    async fn request_accounts(&self) -> Result<Vec<Address>, WalletError> {
        let response = self
            .http
            .post(self.endpoint("accounts/authorize"))
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: AuthorizeResponse = response.json().await.map_err(transport_error)?;
        if body.accounts.is_empty() {
            return Err(WalletError::Rejected(
                "authorization returned no accounts".into(),
            ));
        }
        info!(accounts = body.accounts.len(), "wallet authorization granted");
        Ok(body.accounts)
    }

    async fn submit_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TxHash, WalletError> {
        let response = self
            .http
            .post(self.endpoint("transactions"))
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        if !response.status().is_success() {
            return Err(error_from_response(response).await);
        }

        let body: SubmitTransactionResponse = response.json().await.map_err(transport_error)?;
        info!(tx_hash = %body.tx_hash, "transaction submitted");
        Ok(body.tx_hash)
    }

    async fn wait_for_inclusion(&self, tx_hash: &TxHash) -> Result<TxReceipt, WalletError> {
        loop {
            let response = self
                .http
                .get(self.endpoint(&format!("transactions/{tx_hash}/receipt")))
                .send()
                .await
                .map_err(transport_error)?;
            if !response.status().is_success() {
                return Err(error_from_response(response).await);
            }

            let receipt: TxReceipt = response.json().await.map_err(transport_error)?;
            if receipt.tx_hash != *tx_hash {
                return Err(WalletError::UnexpectedResponse(format!(
                    "receipt for {} returned while waiting on {tx_hash}",
                    receipt.tx_hash
                )));
            }
            if receipt.status != TxStatus::Pending {
                debug!(tx_hash = %tx_hash, status = ?receipt.status, "transaction settled");
                return Ok(receipt);
            }

            tokio::time::sleep(self.options.receipt_poll_interval).await;
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod lib_tests;
