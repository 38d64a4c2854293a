use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use shared::{
    domain::{Address, ProposalId, TokenId, TxHash},
    error::ApiError,
    protocol::{
        BalanceResponse, ContractCall, ProposalCountResponse, ProposalRecord,
        TokenByIndexResponse, TokenUriResponse, TransactionRequest, TxReceipt,
    },
};
use thiserror::Error;
use tracing::debug;
use url::Url;
use wallet::{WalletConnector, WalletError};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid node endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
    #[error("contract query transport failure: {0}")]
    Transport(reqwest::Error),
    #[error("node rejected the query: {0}")]
    Api(ApiError),
    #[error("unexpected node response: {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Wallet(#[from] WalletError),
}

/// The consumed contract surface: count/indexed/balance/token accessors plus
/// the two mutation entry points, with a wait primitive for submitted
/// mutations.
///
/// Assumed, not verified: indexed accessors are valid for every index in
/// `[0, count)`, and owner-indexed token enumeration is stable insertion
/// order. Both guarantees are owned by the external contract.
#[async_trait]
pub trait ProposalContract: Send + Sync {
    async fn proposal_count(&self) -> Result<u64, ContractError>;
    async fn proposal_by_index(&self, index: u64) -> Result<ProposalRecord, ContractError>;
    async fn balance_of(&self, owner: &Address) -> Result<u64, ContractError>;
    async fn token_of_owner_by_index(
        &self,
        owner: &Address,
        index: u64,
    ) -> Result<TokenId, ContractError>;
    async fn token_uri(&self, token_id: TokenId) -> Result<String, ContractError>;
    async fn make_proposal(
        &self,
        receiver: &Address,
        nft_uri: &str,
    ) -> Result<TxHash, ContractError>;
    async fn accept_proposal(&self, proposal_id: ProposalId) -> Result<TxHash, ContractError>;
    async fn wait_for_inclusion(&self, tx_hash: &TxHash) -> Result<TxReceipt, ContractError>;
}

/// Builds a session-bound contract handle for an authorized sender.
pub trait ContractBinder: Send + Sync {
    fn bind(&self, sender: &Address) -> Arc<dyn ProposalContract>;
}

#[derive(Debug, Clone)]
pub struct ContractConfig {
    pub deployed_address: Address,
    pub node_url: String,
}

/// Read-only HTTP gateway onto the node's contract query surface.
#[derive(Clone)]
pub struct HttpNodeGateway {
    http: Client,
    base: Url,
}

impl HttpNodeGateway {
    pub fn new(node_url: &str) -> Result<Self, GatewayError> {
        let mut raw = node_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Ok(Self {
            http: Client::new(),
            base: Url::parse(&raw)?,
        })
    }

    async fn query<T: DeserializeOwned>(&self, path: &str) -> Result<T, GatewayError> {
        let url = self.base.join(path)?;
        debug!(%url, "contract query");
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(GatewayError::Transport)?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(match response.json::<ApiError>().await {
                Ok(api) => GatewayError::Api(api),
                Err(_) => GatewayError::UnexpectedResponse(format!("node returned {status}")),
            });
        }
        response.json().await.map_err(GatewayError::Transport)
    }
}

/// A deployed contract bound to one authorized sender: reads go through the
/// node gateway, mutations are signed and submitted by the wallet.
pub struct BoundContract {
    address: Address,
    sender: Address,
    gateway: HttpNodeGateway,
    wallet: Arc<dyn WalletConnector>,
}

#[async_trait]
impl ProposalContract for BoundContract {
    async fn proposal_count(&self) -> Result<u64, ContractError> {
        let body: ProposalCountResponse = self
            .gateway
            .query(&format!("contracts/{}/proposals/count", self.address))
            .await?;
        Ok(body.count)
    }

    async fn proposal_by_index(&self, index: u64) -> Result<ProposalRecord, ContractError> {
        let record: ProposalRecord = self
            .gateway
            .query(&format!("contracts/{}/proposals/{index}", self.address))
            .await?;
        if record.id.0 != index {
            return Err(GatewayError::UnexpectedResponse(format!(
                "node returned proposal {} for index {index}",
                record.id
            ))
            .into());
        }
        Ok(record)
    }

    async fn balance_of(&self, owner: &Address) -> Result<u64, ContractError> {
        let body: BalanceResponse = self
            .gateway
            .query(&format!(
                "contracts/{}/owners/{owner}/balance",
                self.address
            ))
            .await?;
        Ok(body.balance)
    }

    async fn token_of_owner_by_index(
        &self,
        owner: &Address,
        index: u64,
    ) -> Result<TokenId, ContractError> {
        let body: TokenByIndexResponse = self
            .gateway
            .query(&format!(
                "contracts/{}/owners/{owner}/tokens/{index}",
                self.address
            ))
            .await?;
        Ok(body.token_id)
    }

    async fn token_uri(&self, token_id: TokenId) -> Result<String, ContractError> {
        let body: TokenUriResponse = self
            .gateway
            .query(&format!(
                "contracts/{}/tokens/{token_id}/uri",
                self.address
            ))
            .await?;
        if body.token_id != token_id {
            return Err(GatewayError::UnexpectedResponse(format!(
                "node returned metadata for token {} instead of {token_id}",
                body.token_id
            ))
            .into());
        }
        Ok(body.uri)
    }

    async fn make_proposal(
        &self,
        receiver: &Address,
        nft_uri: &str,
    ) -> Result<TxHash, ContractError> {
        let request = TransactionRequest {
            contract: self.address.clone(),
            sender: self.sender.clone(),
            call: ContractCall::MakeProposal {
                receiver: receiver.clone(),
                nft_uri: nft_uri.to_string(),
            },
        };
        Ok(self.wallet.submit_transaction(&request).await?)
    }

    async fn accept_proposal(&self, proposal_id: ProposalId) -> Result<TxHash, ContractError> {
        let request = TransactionRequest {
            contract: self.address.clone(),
            sender: self.sender.clone(),
            call: ContractCall::AcceptProposal { proposal_id },
        };
        Ok(self.wallet.submit_transaction(&request).await?)
    }

    async fn wait_for_inclusion(&self, tx_hash: &TxHash) -> Result<TxReceipt, ContractError> {
        Ok(self.wallet.wait_for_inclusion(tx_hash).await?)
    }
}

/// Binder for the HTTP node gateway; validates the endpoint once so bind
/// itself stays infallible.
pub struct NodeContractBinder {
    config: ContractConfig,
    gateway: HttpNodeGateway,
    wallet: Arc<dyn WalletConnector>,
}

impl NodeContractBinder {
    pub fn new(
        config: ContractConfig,
        wallet: Arc<dyn WalletConnector>,
    ) -> Result<Self, GatewayError> {
        let gateway = HttpNodeGateway::new(&config.node_url)?;
        Ok(Self {
            config,
            gateway,
            wallet,
        })
    }
}

impl ContractBinder for NodeContractBinder {
    fn bind(&self, sender: &Address) -> Arc<dyn ProposalContract> {
        Arc::new(BoundContract {
            address: self.config.deployed_address.clone(),
            sender: sender.clone(),
            gateway: self.gateway.clone(),
            wallet: Arc::clone(&self.wallet),
        })
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod lib_tests;
