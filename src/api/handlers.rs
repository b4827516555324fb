use actix_web::http::StatusCode;
use actix_web::{error::BlockingError, web, HttpResponse, Responder};
use log::warn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::{Block, Ledger, LedgerError, Transaction};

/// Data structure for the ledger state
pub type LedgerData = web::Data<Ledger>;

/// Response listing blocks
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BlocksResponse {
    /// Number of blocks
    pub length: usize,

    /// The blocks in index order
    pub blocks: Vec<Block>,
}

/// Response listing transactions
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionsResponse {
    /// Number of transactions
    pub length: usize,

    /// The transactions, oldest first
    pub transactions: Vec<Transaction>,
}

/// Response for the mining endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MiningResponse {
    /// The message
    pub message: String,

    /// Index of the newly mined block
    pub index: u64,
}

/// Response for the mining cancellation endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CancelResponse {
    /// Whether a running search was cancelled
    pub cancelled: bool,
}

/// Response for the validation endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ValidationResponse {
    /// Whether the chain is valid
    pub valid: bool,

    /// The first problem found, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn error_response(status: StatusCode, err: impl std::fmt::Display) -> HttpResponse {
    HttpResponse::build(status).json(serde_json::json!({
        "error": err.to_string()
    }))
}

fn blocking_error(err: BlockingError) -> HttpResponse {
    warn!("Blocking task failed: {}", err);
    error_response(StatusCode::INTERNAL_SERVER_ERROR, err)
}

/// Status for a failed write (submission or mining)
fn write_status(err: &LedgerError) -> StatusCode {
    match err {
        err if err.is_validation() => StatusCode::FORBIDDEN,
        LedgerError::BlockNotFound(_) => StatusCode::FORBIDDEN,
        err if err.is_interrupted() => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Status for a failed read
fn read_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::BlockNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::BAD_REQUEST,
    }
}

/// Submit a transaction
///
/// Adds a transaction to the pending pool and echoes it back
#[utoipa::path(
    post,
    path = "/transaction",
    request_body = Transaction,
    responses(
        (status = 200, description = "Transaction queued", body = Transaction),
        (status = 403, description = "Invalid transaction"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn new_transaction(
    ledger: LedgerData,
    transaction: web::Json<Transaction>,
) -> impl Responder {
    let transaction = transaction.into_inner();
    if let Err(err) = transaction.validate() {
        return error_response(StatusCode::FORBIDDEN, err);
    }

    match web::block(move || ledger.submit_transaction(transaction)).await {
        Ok(Ok(transaction)) => HttpResponse::Ok().json(transaction),
        Ok(Err(err)) => error_response(write_status(&err), err),
        Err(err) => blocking_error(err),
    }
}

/// Mine a new block
///
/// Seals all pending transactions into a new block
#[utoipa::path(
    post,
    path = "/mining",
    responses(
        (status = 200, description = "Block mined", body = MiningResponse),
        (status = 403, description = "No pending transaction or invalid block"),
        (status = 503, description = "Mining was cancelled or timed out"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine(ledger: LedgerData) -> impl Responder {
    match web::block(move || ledger.mine()).await {
        Ok(Ok(index)) => HttpResponse::Ok().json(MiningResponse {
            message: "Mining completed.".to_string(),
            index,
        }),
        Ok(Err(err)) => error_response(write_status(&err), err),
        Err(err) => blocking_error(err),
    }
}

/// Cancel mining
///
/// Abandons the proof-of-work search in progress, if any
#[utoipa::path(
    post,
    path = "/mining/cancel",
    responses(
        (status = 200, description = "Cancellation result", body = CancelResponse)
    )
)]
pub async fn cancel_mining(ledger: LedgerData) -> impl Responder {
    HttpResponse::Ok().json(CancelResponse {
        cancelled: ledger.cancel_mining(),
    })
}

/// Get all blocks
#[utoipa::path(
    get,
    path = "/blocks",
    responses(
        (status = 200, description = "Blocks retrieved successfully", body = BlocksResponse),
        (status = 400, description = "Store error")
    )
)]
pub async fn get_blocks(ledger: LedgerData) -> impl Responder {
    match web::block(move || ledger.chain()).await {
        Ok(Ok(blocks)) => HttpResponse::Ok().json(BlocksResponse {
            length: blocks.len(),
            blocks,
        }),
        Ok(Err(err)) => error_response(read_status(&err), err),
        Err(err) => blocking_error(err),
    }
}

/// Get a block by index
#[utoipa::path(
    get,
    path = "/block/{index}",
    params(
        ("index" = u64, Path, description = "Index of the block")
    ),
    responses(
        (status = 200, description = "Block retrieved successfully", body = Block),
        (status = 404, description = "Block not found"),
        (status = 400, description = "Store error")
    )
)]
pub async fn get_block(ledger: LedgerData, index: web::Path<u64>) -> impl Responder {
    let index = index.into_inner();

    match web::block(move || ledger.block(index)).await {
        Ok(Ok(block)) => HttpResponse::Ok().json(block),
        Ok(Err(err)) => error_response(read_status(&err), err),
        Err(err) => blocking_error(err),
    }
}

/// Get the transaction history
///
/// Returns the transactions of every block in chain order
#[utoipa::path(
    get,
    path = "/transactions",
    responses(
        (status = 200, description = "Transactions retrieved successfully", body = TransactionsResponse),
        (status = 400, description = "Store error")
    )
)]
pub async fn get_transactions(ledger: LedgerData) -> impl Responder {
    match web::block(move || ledger.transactions()).await {
        Ok(Ok(transactions)) => HttpResponse::Ok().json(TransactionsResponse {
            length: transactions.len(),
            transactions,
        }),
        Ok(Err(err)) => error_response(read_status(&err), err),
        Err(err) => blocking_error(err),
    }
}

/// Get all pending transactions
///
/// Returns all transactions waiting to be included in a block
#[utoipa::path(
    get,
    path = "/pending-transactions",
    responses(
        (status = 200, description = "Pending transactions retrieved successfully", body = TransactionsResponse),
        (status = 400, description = "Store error")
    )
)]
pub async fn get_pending_transactions(ledger: LedgerData) -> impl Responder {
    match web::block(move || ledger.pending_transactions()).await {
        Ok(Ok(transactions)) => HttpResponse::Ok().json(TransactionsResponse {
            length: transactions.len(),
            transactions,
        }),
        Ok(Err(err)) => error_response(read_status(&err), err),
        Err(err) => blocking_error(err),
    }
}

/// Check if the chain is valid
#[utoipa::path(
    get,
    path = "/validate",
    responses(
        (status = 200, description = "Chain validation status", body = ValidationResponse)
    )
)]
pub async fn validate_chain(ledger: LedgerData) -> impl Responder {
    match web::block(move || ledger.verify_chain()).await {
        Ok(result) => HttpResponse::Ok().json(ValidationResponse {
            valid: result.is_ok(),
            error: result.err().map(|err| err.to_string()),
        }),
        Err(err) => blocking_error(err),
    }
}
