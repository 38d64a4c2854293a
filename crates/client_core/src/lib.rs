use std::sync::Arc;

use chain::{ContractBinder, ContractError, ProposalContract};
use chrono::{DateTime, Utc};
use futures::{stream, StreamExt, TryStreamExt};
use shared::{
    domain::{Address, ProposalId, ProposalStatus, TokenId, TxHash, TxStatus},
    protocol::{ProposalRecord, TxReceipt},
};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};
use wallet::{WalletConnector, WalletError};

/// Bounded fan-out for the per-index reads inside one refresh. Results are
/// collected in index order regardless of completion order.
const READ_FANOUT: usize = 8;
const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ClientError {
    /// No wallet provider is present or reachable.
    #[error("wallet provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Authorization or transaction declined by the user.
    #[error("declined by the user: {0}")]
    UserRejected(String),
    /// A query against the contract failed. Cached snapshots are untouched.
    #[error("contract read failed: {source}")]
    Read {
        #[source]
        source: ContractError,
    },
    /// Mutation submission or settlement failed.
    #[error("mutation failed: {source}")]
    Write {
        #[source]
        source: ContractError,
    },
    /// The mutation was included but failed on chain. A write failure like
    /// any other; the view state is left as it was.
    #[error("transaction {tx_hash} reverted on chain")]
    Reverted { tx_hash: TxHash },
    #[error("no active session; connect a wallet first")]
    NotConnected,
    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },
}

#[derive(Debug, Clone)]
pub enum ClientEvent {
    SessionEstablished { address: Address },
    ProposalsRefreshed { count: usize },
    NftsRefreshed { owner: Address, count: usize },
    ProposalSubmitted { tx_hash: TxHash },
    ProposalAccepted { id: ProposalId, tx_hash: TxHash },
    Notice(String),
}

/// NFT owned by an account, assembled from the owner-indexed enumeration
/// plus the per-token metadata read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedNft {
    pub token_id: TokenId,
    pub uri: String,
}

/// Uncommitted creation-form state. Cleared only after a successful create;
/// any failure leaves it exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub receiver: String,
    pub nft_uri: String,
}

/// Authenticated wallet binding. Never persisted; reinvoking `connect` may
/// replace it with a different account.
#[derive(Debug, Clone)]
pub struct Session {
    pub address: Address,
    pub connected_at: DateTime<Utc>,
}

struct SessionState {
    session: Session,
    contract: Arc<dyn ProposalContract>,
}

#[derive(Default)]
struct ViewState {
    session: Option<SessionState>,
    proposals: Vec<ProposalRecord>,
    nfts: Vec<OwnedNft>,
    draft: Draft,
}

/// Point-in-time copy of the view state for rendering. No freshness
/// guarantee between the read that produced it and the moment of render.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    pub session: Option<Session>,
    pub proposals: Vec<ProposalRecord>,
    pub nfts: Vec<OwnedNft>,
    pub draft: Draft,
}

/// View model over the proposal contract: owns the session, the cached
/// proposal/NFT snapshots, and the creation draft. All state mutation goes
/// through the internal mutex; snapshot swaps are wholesale, so a failed
/// refresh leaves the prior snapshot displayed.
pub struct ProposalClient {
    wallet: Arc<dyn WalletConnector>,
    binder: Arc<dyn ContractBinder>,
    inner: Mutex<ViewState>,
    events: broadcast::Sender<ClientEvent>,
}

impl ProposalClient {
    pub fn new(wallet: Arc<dyn WalletConnector>, binder: Arc<dyn ContractBinder>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            wallet,
            binder,
            inner: Mutex::new(ViewState::default()),
            events,
        })
    }

    /// Establish the wallet session and bind the contract handle, then run
    /// the initial full read. Initial-read failures surface as notices; the
    /// session itself stands once authorization succeeds.
    pub async fn connect(&self) -> Result<Session, ClientError> {
        let accounts = self
            .wallet
            .request_accounts()
            .await
            .map_err(map_wallet_error)?;
        let address = accounts.into_iter().next().ok_or_else(|| {
            ClientError::UserRejected("authorization returned no accounts".into())
        })?;

        let contract = self.binder.bind(&address);
        let session = Session {
            address: address.clone(),
            connected_at: Utc::now(),
        };
        {
            let mut guard = self.inner.lock().await;
            guard.session = Some(SessionState {
                session: session.clone(),
                contract: Arc::clone(&contract),
            });
        }
        info!(account = %address, "wallet session established");
        let _ = self.events.send(ClientEvent::SessionEstablished {
            address: address.clone(),
        });

        if let Err(err) = self.refresh_proposals(&contract).await {
            self.notify_failure("initial proposal load failed", &err);
        }
        if let Err(err) = self.refresh_owned_nfts(&contract, &address).await {
            self.notify_failure("initial NFT load failed", &err);
        }

        Ok(session)
    }

    /// Refresh and return the full ordered proposal snapshot.
    pub async fn list_proposals(&self) -> Result<Vec<ProposalRecord>, ClientError> {
        let (contract, _) = self.bound_contract().await?;
        self.refresh_proposals(&contract).await
    }

    /// Refresh and return `owner`'s NFTs in owner-enumeration order. The
    /// cached snapshot is only replaced when `owner` is the session account.
    pub async fn list_owned_nfts(&self, owner: &Address) -> Result<Vec<OwnedNft>, ClientError> {
        let (contract, _) = self.bound_contract().await?;
        self.refresh_owned_nfts(&contract, owner).await
    }

    pub async fn set_draft_receiver(&self, receiver: &str) {
        self.inner.lock().await.draft.receiver = receiver.to_string();
    }

    pub async fn set_draft_nft_uri(&self, nft_uri: &str) {
        self.inner.lock().await.draft.nft_uri = nft_uri.to_string();
    }

    /// Submit the drafted proposal and wait for inclusion. Presence-only
    /// validation on the draft fields; an empty field submits nothing. On
    /// success the draft is cleared and the proposal snapshot refreshed.
    pub async fn create_proposal(&self) -> Result<TxReceipt, ClientError> {
        let (contract, _) = self.bound_contract().await?;
        let draft = self.inner.lock().await.draft.clone();
        let receiver = draft.receiver.trim();
        if receiver.is_empty() {
            return Err(ClientError::EmptyField { field: "receiver" });
        }
        let nft_uri = draft.nft_uri.trim();
        if nft_uri.is_empty() {
            return Err(ClientError::EmptyField { field: "nft uri" });
        }

        let receiver = Address::new(receiver);
        let tx_hash = contract
            .make_proposal(&receiver, nft_uri)
            .await
            .map_err(map_write_error)?;
        let _ = self.events.send(ClientEvent::ProposalSubmitted {
            tx_hash: tx_hash.clone(),
        });

        let receipt = contract
            .wait_for_inclusion(&tx_hash)
            .await
            .map_err(map_write_error)?;
        if receipt.status == TxStatus::Reverted {
            warn!(tx_hash = %tx_hash, "proposal creation reverted on chain");
            return Err(ClientError::Reverted { tx_hash });
        }

        self.inner.lock().await.draft = Draft::default();
        info!(receiver = %receiver, tx_hash = %tx_hash, "proposal created");
        if let Err(err) = self.refresh_proposals(&contract).await {
            self.notify_failure("post-create refresh failed", &err);
        }
        Ok(receipt)
    }

    /// Accept a proposal and wait for inclusion, then refresh proposals and
    /// the session account's NFTs (acceptance mints to the receiver). The
    /// contract enforces that the caller is the designated receiver; this
    /// client only gates what a UI offers.
    pub async fn accept_proposal(&self, proposal_id: ProposalId) -> Result<TxReceipt, ClientError> {
        let (contract, account) = self.bound_contract().await?;
        let tx_hash = contract
            .accept_proposal(proposal_id)
            .await
            .map_err(map_write_error)?;
        let receipt = contract
            .wait_for_inclusion(&tx_hash)
            .await
            .map_err(map_write_error)?;
        if receipt.status == TxStatus::Reverted {
            warn!(tx_hash = %tx_hash, proposal = %proposal_id, "acceptance reverted on chain");
            return Err(ClientError::Reverted { tx_hash });
        }

        info!(proposal = %proposal_id, tx_hash = %tx_hash, "proposal accepted");
        let _ = self.events.send(ClientEvent::ProposalAccepted {
            id: proposal_id,
            tx_hash,
        });
        if let Err(err) = self.refresh_proposals(&contract).await {
            self.notify_failure("post-accept proposal refresh failed", &err);
        }
        if let Err(err) = self.refresh_owned_nfts(&contract, &account).await {
            self.notify_failure("post-accept NFT refresh failed", &err);
        }
        Ok(receipt)
    }

    /// Status of the latest proposal addressed to `address`, derived from
    /// the proposal snapshot. None when no proposal names that receiver.
    pub async fn proposal_status_for(
        &self,
        address: &Address,
    ) -> Result<Option<ProposalStatus>, ClientError> {
        let proposals = self.list_proposals().await?;
        Ok(proposals
            .iter()
            .rev()
            .find(|record| record.receiver == *address)
            .map(ProposalRecord::status))
    }

    pub async fn snapshot(&self) -> StateSnapshot {
        let guard = self.inner.lock().await;
        StateSnapshot {
            session: guard.session.as_ref().map(|state| state.session.clone()),
            proposals: guard.proposals.clone(),
            nfts: guard.nfts.clone(),
            draft: guard.draft.clone(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    async fn bound_contract(&self) -> Result<(Arc<dyn ProposalContract>, Address), ClientError> {
        let guard = self.inner.lock().await;
        let state = guard.session.as_ref().ok_or(ClientError::NotConnected)?;
        Ok((Arc::clone(&state.contract), state.session.address.clone()))
    }

    async fn refresh_proposals(
        &self,
        contract: &Arc<dyn ProposalContract>,
    ) -> Result<Vec<ProposalRecord>, ClientError> {
        let proposals = fetch_proposals(contract)
            .await
            .map_err(|source| ClientError::Read { source })?;
        self.inner.lock().await.proposals = proposals.clone();
        info!(count = proposals.len(), "proposal snapshot refreshed");
        let _ = self.events.send(ClientEvent::ProposalsRefreshed {
            count: proposals.len(),
        });
        Ok(proposals)
    }

    async fn refresh_owned_nfts(
        &self,
        contract: &Arc<dyn ProposalContract>,
        owner: &Address,
    ) -> Result<Vec<OwnedNft>, ClientError> {
        let nfts = fetch_owned_nfts(contract, owner)
            .await
            .map_err(|source| ClientError::Read { source })?;
        {
            let mut guard = self.inner.lock().await;
            let is_session_account = guard
                .session
                .as_ref()
                .is_some_and(|state| state.session.address == *owner);
            if is_session_account {
                guard.nfts = nfts.clone();
            }
        }
        info!(owner = %owner, count = nfts.len(), "NFT snapshot refreshed");
        let _ = self.events.send(ClientEvent::NftsRefreshed {
            owner: owner.clone(),
            count: nfts.len(),
        });
        Ok(nfts)
    }

    fn notify_failure(&self, context: &str, err: &ClientError) {
        error!("{context}: {err}");
        let _ = self.events.send(ClientEvent::Notice(format!("{context}: {err}")));
    }
}

/// Count read followed by per-index reads, fail-fast, index order preserved.
async fn fetch_proposals(
    contract: &Arc<dyn ProposalContract>,
) -> Result<Vec<ProposalRecord>, ContractError> {
    let count = contract.proposal_count().await?;
    stream::iter((0..count).map(|index| contract.proposal_by_index(index)))
        .buffered(READ_FANOUT)
        .try_collect()
        .await
}

async fn fetch_owned_nfts(
    contract: &Arc<dyn ProposalContract>,
    owner: &Address,
) -> Result<Vec<OwnedNft>, ContractError> {
    let balance = contract.balance_of(owner).await?;
    stream::iter((0..balance).map(|index| async move {
        let token_id = contract.token_of_owner_by_index(owner, index).await?;
        let uri = contract.token_uri(token_id).await?;
        Ok::<_, ContractError>(OwnedNft { token_id, uri })
    }))
    .buffered(READ_FANOUT)
    .try_collect()
    .await
}

fn map_wallet_error(err: WalletError) -> ClientError {
    match err {
        WalletError::Rejected(reason) => ClientError::UserRejected(reason),
        WalletError::ProviderUnavailable(reason) => ClientError::ProviderUnavailable(reason),
        other => ClientError::ProviderUnavailable(other.to_string()),
    }
}

fn map_write_error(err: ContractError) -> ClientError {
    match err {
        ContractError::Wallet(WalletError::Rejected(reason)) => ClientError::UserRejected(reason),
        ContractError::Wallet(WalletError::ProviderUnavailable(reason)) => {
            ClientError::ProviderUnavailable(reason)
        }
        other => ClientError::Write { source: other },
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod lib_tests;
