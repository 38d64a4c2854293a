use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Address, ProposalId, ProposalStatus, TokenId, TxHash, TxStatus};

/// On-chain proposal record as returned by the node's contract query surface.
/// Records are indexed from zero in creation order and immutable apart from
/// the accepted flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalRecord {
    pub id: ProposalId,
    pub proposer: Address,
    pub receiver: Address,
    pub accepted: bool,
    pub nft_uri: String,
}

impl ProposalRecord {
    pub fn status(&self) -> ProposalStatus {
        if self.accepted {
            ProposalStatus::Accepted
        } else {
            ProposalStatus::Pending
        }
    }

    /// Whether `account` is offered the accept action for this record. The
    /// contract is the actual enforcer; this only gates what a UI shows.
    pub fn is_pending_for(&self, account: &Address) -> bool {
        !self.accepted && self.receiver == *account
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalCountResponse {
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceResponse {
    pub balance: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenByIndexResponse {
    pub token_id: TokenId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenUriResponse {
    pub token_id: TokenId,
    pub uri: String,
}

/// Mutation payload addressed to a contract entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "entrypoint", content = "args", rename_all = "snake_case")]
pub enum ContractCall {
    MakeProposal {
        receiver: Address,
        nft_uri: String,
    },
    AcceptProposal {
        proposal_id: ProposalId,
    },
}

/// Envelope handed to the wallet for signing and submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub contract: Address,
    pub sender: Address,
    pub call: ContractCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitTransactionResponse {
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub accounts: Vec<Address>,
}

/// Inclusion receipt for a submitted mutation. `Pending` receipts carry no
/// block data yet; `Reverted` means included but failed on chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
    pub tx_hash: TxHash,
    pub status: TxStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub included_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_call_is_tagged_by_entrypoint() {
        let call = ContractCall::MakeProposal {
            receiver: Address::new("0xABC"),
            nft_uri: "ipfs://meta1".into(),
        };
        let encoded = serde_json::to_value(&call).expect("encode");
        assert_eq!(encoded["entrypoint"], "make_proposal");
        assert_eq!(encoded["args"]["receiver"], "0xabc");
    }

    #[test]
    fn pending_for_requires_matching_receiver_and_pending_state() {
        let record = ProposalRecord {
            id: ProposalId(0),
            proposer: Address::new("0xaa"),
            receiver: Address::new("0xBB"),
            accepted: false,
            nft_uri: "ipfs://meta".into(),
        };
        assert!(record.is_pending_for(&Address::new("0xbb")));
        assert!(!record.is_pending_for(&Address::new("0xcc")));

        let accepted = ProposalRecord {
            accepted: true,
            ..record
        };
        assert!(!accepted.is_pending_for(&Address::new("0xbb")));
    }
}
