use std::{sync::Arc, time::Duration};

use anyhow::Result;
use chain::{ContractConfig, NodeContractBinder};
use clap::{Parser, Subcommand};
use client_core::{OwnedNft, ProposalClient};
use shared::{
    domain::{Address, ProposalId},
    protocol::ProposalRecord,
};
use wallet::{HttpWalletConnector, WalletBridgeOptions, WalletConnector};

mod config;

use config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "dapp", about = "Client for the on-chain proposal application")]
struct Cli {
    /// Node query endpoint override.
    #[arg(long)]
    node_url: Option<String>,
    /// Wallet bridge endpoint override.
    #[arg(long)]
    wallet_url: Option<String>,
    /// Deployed contract address override.
    #[arg(long)]
    contract_address: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connect and render every proposal plus the account's NFTs.
    Overview,
    /// List every proposal on the contract.
    Proposals,
    /// List NFTs owned by an address (defaults to the connected account).
    Nfts {
        #[arg(long)]
        owner: Option<String>,
    },
    /// Create a proposal offering an NFT to a receiver.
    Create { receiver: String, nft_uri: String },
    /// Accept a proposal addressed to the connected account.
    Accept { proposal_id: u64 },
    /// Latest proposal status for an address (defaults to the connected
    /// account).
    Status { address: Option<String> },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(node_url) = cli.node_url {
        settings.node_url = node_url;
    }
    if let Some(wallet_url) = cli.wallet_url {
        settings.wallet_url = wallet_url;
    }
    if let Some(contract_address) = cli.contract_address {
        settings.contract_address = contract_address;
    }

    let client = build_client(&settings)?;
    let session = client.connect().await?;
    println!("Connected as {}", session.address.short());

    match cli.command {
        Command::Overview => {
            let snapshot = client.snapshot().await;
            render_proposals(&snapshot.proposals, &session.address);
            render_nfts(&snapshot.nfts);
        }
        Command::Proposals => {
            let proposals = client.list_proposals().await?;
            render_proposals(&proposals, &session.address);
        }
        Command::Nfts { owner } => {
            let owner = owner
                .map(Address::new)
                .unwrap_or_else(|| session.address.clone());
            let nfts = client.list_owned_nfts(&owner).await?;
            println!("NFTs owned by {}:", owner.short());
            render_nfts(&nfts);
        }
        Command::Create { receiver, nft_uri } => {
            client.set_draft_receiver(&receiver).await;
            client.set_draft_nft_uri(&nft_uri).await;
            let receipt = client.create_proposal().await?;
            match receipt.block_number {
                Some(block) => println!("Proposal created in block {block}"),
                None => println!("Proposal created (tx {})", receipt.tx_hash),
            }
            render_proposals(&client.snapshot().await.proposals, &session.address);
        }
        Command::Accept { proposal_id } => {
            let receipt = client.accept_proposal(ProposalId(proposal_id)).await?;
            println!("Proposal {proposal_id} accepted (tx {})", receipt.tx_hash);
            let snapshot = client.snapshot().await;
            render_proposals(&snapshot.proposals, &session.address);
            render_nfts(&snapshot.nfts);
        }
        Command::Status { address } => {
            let address = address
                .map(Address::new)
                .unwrap_or_else(|| session.address.clone());
            match client.proposal_status_for(&address).await? {
                Some(status) => println!("Status for {}: {}", address.short(), status.label()),
                None => println!("No proposal addressed to {}", address.short()),
            }
        }
    }

    Ok(())
}

fn build_client(settings: &Settings) -> Result<Arc<ProposalClient>> {
    let mut bridge = WalletBridgeOptions::new(settings.wallet_url.clone());
    bridge.receipt_poll_interval = Duration::from_millis(settings.receipt_poll_ms);
    let wallet: Arc<dyn WalletConnector> = Arc::new(HttpWalletConnector::new(bridge));

    let binder = NodeContractBinder::new(
        ContractConfig {
            deployed_address: Address::new(&settings.contract_address),
            node_url: settings.node_url.clone(),
        },
        Arc::clone(&wallet),
    )?;

    Ok(ProposalClient::new(wallet, Arc::new(binder)))
}

fn render_proposals(proposals: &[ProposalRecord], viewer: &Address) {
    println!("Proposals ({}):", proposals.len());
    if proposals.is_empty() {
        println!("  (none)");
        return;
    }
    for record in proposals {
        let marker = if record.is_pending_for(viewer) {
            "  <- addressed to you"
        } else {
            ""
        };
        println!(
            "  #{} {} -> {} [{}] {}{marker}",
            record.id,
            record.proposer.short(),
            record.receiver.short(),
            record.status().label(),
            record.nft_uri,
        );
    }
}

fn render_nfts(nfts: &[OwnedNft]) {
    println!("NFTs ({}):", nfts.len());
    if nfts.is_empty() {
        println!("  (none)");
        return;
    }
    for nft in nfts {
        println!("  token {}  {}", nft.token_id, nft.uri);
    }
}
