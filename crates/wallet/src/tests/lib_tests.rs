use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use shared::protocol::ContractCall;
use tokio::{
    net::TcpListener,
    sync::{oneshot, Mutex},
};

use super::*;

async fn spawn_bridge(app: Router) -> String {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{addr}")
}

fn fast_poll_connector(base_url: String) -> HttpWalletConnector {
    HttpWalletConnector::new(WalletBridgeOptions {
        base_url,
        receipt_poll_interval: Duration::from_millis(10),
    })
}

#[tokio::test]
async fn request_accounts_normalizes_addresses() {
    let app = Router::new().route(
        "/accounts/authorize",
        post(|| async {
            Json(serde_json::json!({
                "accounts": ["0xABCdef0000000000000000000000000000000001"]
            }))
        }),
    );
    let connector = fast_poll_connector(spawn_bridge(app).await);

    let accounts = connector.request_accounts().await.expect("accounts");
    assert_eq!(
        accounts,
        vec![Address::new("0xabcdef0000000000000000000000000000000001")]
    );
}

#[tokio::test]
async fn declined_authorization_maps_to_rejected() {
    let app = Router::new().route(
        "/accounts/authorize",
        post(|| async {
            (
                StatusCode::FORBIDDEN,
                Json(ApiError::new(ErrorCode::Rejected, "user closed the prompt")),
            )
        }),
    );
    let connector = fast_poll_connector(spawn_bridge(app).await);

    let err = connector.request_accounts().await.expect_err("must fail");
    assert!(matches!(err, WalletError::Rejected(reason) if reason.contains("closed")));
}

#[tokio::test]
async fn empty_account_list_counts_as_rejection() {
    let app = Router::new().route(
        "/accounts/authorize",
        post(|| async { Json(serde_json::json!({ "accounts": [] })) }),
    );
    let connector = fast_poll_connector(spawn_bridge(app).await);

    let err = connector.request_accounts().await.expect_err("must fail");
    assert!(matches!(err, WalletError::Rejected(_)));
}

#[tokio::test]
async fn unreachable_bridge_maps_to_provider_unavailable() {
    let connector = fast_poll_connector("http://127.0.0.1:9".into());

    let err = connector.request_accounts().await.expect_err("must fail");
    assert!(matches!(err, WalletError::ProviderUnavailable(_)));
}

#[derive(Clone)]
struct SubmitState {
    tx: Arc<Mutex<Option<oneshot::Sender<TransactionRequest>>>>,
}

async fn handle_submit(
    State(state): State<SubmitState>,
    Json(payload): Json<TransactionRequest>,
) -> Json<SubmitTransactionResponse> {
    if let Some(tx) = state.tx.lock().await.take() {
        let _ = tx.send(payload);
    }
    Json(SubmitTransactionResponse {
        tx_hash: TxHash("0xfeed".into()),
    })
}

#[tokio::test]
async fn submit_transaction_posts_envelope_and_returns_hash() {
    let (tx, rx) = oneshot::channel();
    let app = Router::new()
        .route("/transactions", post(handle_submit))
        .with_state(SubmitState {
            tx: Arc::new(Mutex::new(Some(tx))),
        });
    let connector = fast_poll_connector(spawn_bridge(app).await);

    let request = TransactionRequest {
        contract: Address::new("0xc0ffee"),
        sender: Address::new("0xa11ce"),
        call: ContractCall::MakeProposal {
            receiver: Address::new("0xb0b"),
            nft_uri: "ipfs://meta1".into(),
        },
    };
    let tx_hash = connector
        .submit_transaction(&request)
        .await
        .expect("submission");
    assert_eq!(tx_hash, TxHash("0xfeed".into()));

    let seen = rx.await.expect("payload captured");
    assert_eq!(seen, request);
}

#[derive(Clone)]
struct ReceiptState {
    polls_before_settling: Arc<Mutex<u32>>,
    settled_status: TxStatus,
}

async fn handle_receipt(
    State(state): State<ReceiptState>,
    Path(tx_hash): Path<String>,
) -> Json<TxReceipt> {
    let mut remaining = state.polls_before_settling.lock().await;
    if *remaining > 0 {
        *remaining -= 1;
        return Json(TxReceipt {
            tx_hash: TxHash(tx_hash),
            status: TxStatus::Pending,
            block_number: None,
            included_at: None,
        });
    }
    Json(TxReceipt {
        tx_hash: TxHash(tx_hash),
        status: state.settled_status,
        block_number: Some(42),
        included_at: None,
    })
}

fn receipt_router(polls_before_settling: u32, settled_status: TxStatus) -> Router {
    Router::new()
        .route("/transactions/:tx_hash/receipt", get(handle_receipt))
        .with_state(ReceiptState {
            polls_before_settling: Arc::new(Mutex::new(polls_before_settling)),
            settled_status,
        })
}

#[tokio::test]
async fn wait_for_inclusion_polls_until_settled() {
    let connector = fast_poll_connector(spawn_bridge(receipt_router(2, TxStatus::Included)).await);

    let receipt = connector
        .wait_for_inclusion(&TxHash("0xfeed".into()))
        .await
        .expect("receipt");
    assert_eq!(receipt.status, TxStatus::Included);
    assert_eq!(receipt.block_number, Some(42));
}

#[tokio::test]
async fn reverted_receipts_are_returned_not_swallowed() {
    let connector = fast_poll_connector(spawn_bridge(receipt_router(0, TxStatus::Reverted)).await);

    let receipt = connector
        .wait_for_inclusion(&TxHash("0xdead".into()))
        .await
        .expect("receipt");
    assert_eq!(receipt.status, TxStatus::Reverted);
}

#[tokio::test]
async fn mismatched_receipt_hash_is_rejected() {
    let app = Router::new().route(
        "/transactions/:tx_hash/receipt",
        get(|| async {
            Json(TxReceipt {
                tx_hash: TxHash("0xother".into()),
                status: TxStatus::Included,
                block_number: Some(7),
                included_at: None,
            })
        }),
    );
    let connector = fast_poll_connector(spawn_bridge(app).await);

    let err = connector
        .wait_for_inclusion(&TxHash("0xfeed".into()))
        .await
        .expect_err("must fail");
    assert!(matches!(err, WalletError::UnexpectedResponse(_)));
}
