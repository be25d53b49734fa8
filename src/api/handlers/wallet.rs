//! Wallet handlers: balances, deposits, withdrawals, ledger history and
//! payout details.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::api::dto::{
    BalanceResponse, DepositRequest, PayoutDetailsResponse, SavePayoutDetailsRequest,
    SettleWithdrawalRequest, TransactionListResponse, TransactionQuery, WithdrawRequest,
    WithdrawalQuery,
};
use crate::api::extract::{ApiJson, ApiQuery};
use crate::app_state::AppState;
use crate::domain::{
    ActorId, ActorKind, ActorRef, Identity, PayoutDetails, Transaction, TransactionFilter,
    TransactionId,
};
use crate::error::{ErrorResponse, SettlementError};
use crate::service::{DepositOutcome, GatewayOutcome, PayoutVerification, Posting, WithdrawalOutcome};

fn own_wallet(identity: &Identity) -> Result<ActorRef, SettlementError> {
    identity
        .wallet()
        .ok_or_else(|| SettlementError::Forbidden("admins have no wallet".to_string()))
}

async fn balance_of(state: &AppState, owner: ActorRef) -> BalanceResponse {
    BalanceResponse {
        user_type: owner.kind,
        user_id: owner.id,
        balance: state.ledger.get_balance(owner).await,
        currency: state.currency.to_string(),
    }
}

/// `GET /wallet`: Balance of the caller's wallet.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] for admins.
#[utoipa::path(
    get,
    path = "/api/v1/wallet",
    tag = "Wallets",
    summary = "Own balance",
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 401, description = "Missing identity", body = ErrorResponse),
    )
)]
pub async fn get_own_balance(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, SettlementError> {
    let owner = own_wallet(&identity)?;
    Ok(Json(balance_of(&state, owner).await))
}

/// `GET /wallets/{user_type}/{user_id}`: Balance of a wallet.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller owns the
/// wallet or is an admin.
#[utoipa::path(
    get,
    path = "/api/v1/wallets/{user_type}/{user_id}",
    tag = "Wallets",
    summary = "Wallet balance",
    params(
        ("user_type" = String, Path, description = "`brand` or `creator`"),
        ("user_id" = uuid::Uuid, Path, description = "Account UUID"),
    ),
    responses(
        (status = 200, description = "Current balance", body = BalanceResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn get_balance(
    State(state): State<AppState>,
    identity: Identity,
    Path((user_type, user_id)): Path<(ActorKind, uuid::Uuid)>,
) -> Result<impl IntoResponse, SettlementError> {
    let owner = ActorRef {
        kind: user_type,
        id: ActorId::from_uuid(user_id),
    };
    identity.require_self_or_admin(owner)?;
    Ok(Json(balance_of(&state, owner).await))
}

/// `GET /wallets/{user_type}/{user_id}/transactions`: Ledger history.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller owns the
/// wallet or is an admin.
#[utoipa::path(
    get,
    path = "/api/v1/wallets/{user_type}/{user_id}/transactions",
    tag = "Wallets",
    summary = "Transaction history",
    description = "Newest-first ledger entries of one wallet, filterable by campaign, type and status.",
    params(
        ("user_type" = String, Path, description = "`brand`, `creator` or `platform`"),
        ("user_id" = uuid::Uuid, Path, description = "Account UUID"),
        TransactionQuery,
    ),
    responses(
        (status = 200, description = "One page of entries", body = TransactionListResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
    )
)]
pub async fn get_transactions(
    State(state): State<AppState>,
    identity: Identity,
    Path((user_type, user_id)): Path<(ActorKind, uuid::Uuid)>,
    ApiQuery(query): ApiQuery<TransactionQuery>,
) -> Result<impl IntoResponse, SettlementError> {
    let owner = ActorRef {
        kind: user_type,
        id: ActorId::from_uuid(user_id),
    };
    let filter = TransactionFilter {
        campaign_id: query.campaign_id,
        txn_type: query.txn_type,
        status: query.status,
    };
    let offset = query.offset.unwrap_or(0);
    let page = state
        .ledger
        .get_transactions(&identity, owner, &filter, query.limit, offset)
        .await?;
    Ok(Json(TransactionListResponse::from_page(page, offset)))
}

/// `GET /transactions/{id}`: Status of one ledger entry.
///
/// # Errors
///
/// Returns [`SettlementError::TransactionNotFound`] for unknown ids.
#[utoipa::path(
    get,
    path = "/api/v1/transactions/{id}",
    tag = "Wallets",
    summary = "Transaction status",
    params(("id" = uuid::Uuid, Path, description = "Transaction UUID")),
    responses(
        (status = 200, description = "Ledger entry", body = Transaction),
        (status = 404, description = "Unknown transaction", body = ErrorResponse),
    )
)]
pub async fn get_transaction(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let txn = state
        .ledger
        .get_transaction(&identity, TransactionId::from_uuid(id))
        .await?;
    Ok(Json(txn))
}

/// `POST /wallet/deposits`: Gateway-confirmed brand deposit.
///
/// # Errors
///
/// Returns [`SettlementError`] for non-brand callers or invalid amounts.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/deposits",
    tag = "Wallets",
    summary = "Deposit funds",
    description = "Credits a brand wallet once the payment gateway confirms a payment. Idempotent on `external_txn_id`.",
    request_body = DepositRequest,
    responses(
        (status = 201, description = "Wallet credited", body = DepositOutcome),
        (status = 200, description = "Duplicate confirmation, nothing credited", body = DepositOutcome),
        (status = 400, description = "Invalid amount", body = ErrorResponse),
    )
)]
pub async fn deposit(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<DepositRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = state
        .ledger
        .deposit(&identity, req.amount, &req.external_txn_id)
        .await?;
    let status = if outcome.duplicate {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(outcome)))
}

/// `POST /wallet/withdrawals`: Creator withdrawal.
///
/// # Errors
///
/// Returns [`SettlementError::InsufficientFunds`] or
/// [`SettlementError::IncompletePayoutDetails`].
#[utoipa::path(
    post,
    path = "/api/v1/wallet/withdrawals",
    tag = "Wallets",
    summary = "Withdraw earnings",
    description = "Debits the creator wallet and hands the transfer to the payment gateway. The entry stays `pending` until the gateway settles it.",
    request_body = WithdrawRequest,
    responses(
        (status = 202, description = "Withdrawal accepted", body = WithdrawalOutcome),
        (status = 400, description = "Incomplete payout details", body = ErrorResponse),
        (status = 422, description = "Insufficient funds", body = ErrorResponse),
    )
)]
pub async fn withdraw(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<WithdrawRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = state
        .ledger
        .creator_withdraw(&identity, req.amount, req.payout_method, req.fields)
        .await?;
    Ok((StatusCode::ACCEPTED, Json(outcome)))
}

/// `GET /wallet/withdrawals`: Caller's withdrawal history.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] for non-creator callers.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/withdrawals",
    tag = "Wallets",
    summary = "Withdrawal history",
    params(WithdrawalQuery),
    responses(
        (status = 200, description = "One page of withdrawals", body = TransactionListResponse),
    )
)]
pub async fn withdrawal_history(
    State(state): State<AppState>,
    identity: Identity,
    ApiQuery(query): ApiQuery<WithdrawalQuery>,
) -> Result<impl IntoResponse, SettlementError> {
    let offset = query.offset.unwrap_or(0);
    let page = state
        .ledger
        .withdrawal_history(&identity, query.status, query.limit, offset)
        .await?;
    Ok(Json(TransactionListResponse::from_page(page, offset)))
}

/// `POST /wallet/withdrawals/{id}/settle`: Gateway settlement callback.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidState`] unless the entry is a pending
/// withdrawal.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/withdrawals/{id}/settle",
    tag = "Wallets",
    summary = "Settle withdrawal",
    params(("id" = uuid::Uuid, Path, description = "Withdrawal transaction UUID")),
    request_body = SettleWithdrawalRequest,
    responses(
        (status = 200, description = "Settled entry", body = Transaction),
        (status = 409, description = "Not a pending withdrawal", body = ErrorResponse),
    )
)]
pub async fn settle_withdrawal(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
    ApiJson(req): ApiJson<SettleWithdrawalRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let outcome = GatewayOutcome::try_from(req)?;
    let txn = state
        .ledger
        .settle_withdrawal(&identity, TransactionId::from_uuid(id), outcome)
        .await?;
    Ok(Json(txn))
}

/// `POST /wallet/withdrawals/{id}/revert`: Credit back a failed withdrawal.
///
/// # Errors
///
/// Returns [`SettlementError::InvalidState`] unless the withdrawal failed
/// and was not reversed yet.
#[utoipa::path(
    post,
    path = "/api/v1/wallet/withdrawals/{id}/revert",
    tag = "Wallets",
    summary = "Revert failed withdrawal",
    params(("id" = uuid::Uuid, Path, description = "Failed withdrawal transaction UUID")),
    responses(
        (status = 201, description = "Reversal posted", body = Posting),
        (status = 409, description = "Not a failed withdrawal", body = ErrorResponse),
    )
)]
pub async fn revert_withdrawal(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let posting = state
        .ledger
        .revert_failed_withdrawal(&identity, TransactionId::from_uuid(id))
        .await?;
    Ok((StatusCode::CREATED, Json(posting)))
}

/// `PUT /wallet/payout-details`: Save the caller's payout destination.
///
/// # Errors
///
/// Returns [`SettlementError::IncompletePayoutDetails`] for missing fields.
#[utoipa::path(
    put,
    path = "/api/v1/wallet/payout-details",
    tag = "Wallets",
    summary = "Save payout details",
    request_body = SavePayoutDetailsRequest,
    responses(
        (status = 200, description = "Saved details", body = PayoutDetails),
        (status = 400, description = "Incomplete details", body = ErrorResponse),
    )
)]
pub async fn save_payout_details(
    State(state): State<AppState>,
    identity: Identity,
    ApiJson(req): ApiJson<SavePayoutDetailsRequest>,
) -> Result<impl IntoResponse, SettlementError> {
    let details = state
        .ledger
        .save_payout_details(&identity, req.payout_method, req.fields)
        .await?;
    Ok(Json(details))
}

/// `GET /creators/{id}/payout-details`: Saved payout destination.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] unless the caller is that
/// creator or an admin.
#[utoipa::path(
    get,
    path = "/api/v1/creators/{id}/payout-details",
    tag = "Wallets",
    summary = "Get payout details",
    params(("id" = uuid::Uuid, Path, description = "Creator UUID")),
    responses(
        (status = 200, description = "Saved details", body = PayoutDetailsResponse),
        (status = 403, description = "Not the creator", body = ErrorResponse),
    )
)]
pub async fn get_payout_details(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<uuid::Uuid>,
) -> Result<impl IntoResponse, SettlementError> {
    let creator_id = ActorId::from_uuid(id);
    let details = state.ledger.get_payout_details(&identity, creator_id).await?;
    Ok(Json(PayoutDetailsResponse {
        creator_id,
        details,
    }))
}

/// `GET /wallet/payout-details/verify`: Check saved details.
///
/// # Errors
///
/// Returns [`SettlementError::Forbidden`] for non-creator callers.
#[utoipa::path(
    get,
    path = "/api/v1/wallet/payout-details/verify",
    tag = "Wallets",
    summary = "Verify payout details",
    responses(
        (status = 200, description = "Verification result", body = PayoutVerification),
    )
)]
pub async fn verify_payout_details(
    State(state): State<AppState>,
    identity: Identity,
) -> Result<impl IntoResponse, SettlementError> {
    Ok(Json(state.ledger.verify_payout_details(&identity).await?))
}

/// Wallet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wallet", get(get_own_balance))
        .route("/wallet/deposits", post(deposit))
        .route("/wallet/withdrawals", post(withdraw).get(withdrawal_history))
        .route("/wallet/withdrawals/{id}/settle", post(settle_withdrawal))
        .route("/wallet/withdrawals/{id}/revert", post(revert_withdrawal))
        .route("/wallet/payout-details", put(save_payout_details))
        .route("/wallet/payout-details/verify", get(verify_payout_details))
        .route("/creators/{id}/payout-details", get(get_payout_details))
        .route("/wallets/{user_type}/{user_id}", get(get_balance))
        .route(
            "/wallets/{user_type}/{user_id}/transactions",
            get(get_transactions),
        )
        .route("/transactions/{id}", get(get_transaction))
}
