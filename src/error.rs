//! Settlement error types with HTTP status code mapping.
//!
//! [`SettlementError`] is the central error type of the engine. Each
//! variant maps to a numeric code, an HTTP status and a structured JSON
//! body whose `msg` key carries the human-readable message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{CampaignId, ClipId, Money, RefundId, TransactionId};

/// Structured JSON error response body.
///
/// ```json
/// {
///   "msg": "insufficient funds: available 2000.00, requested 3000.00",
///   "code": 4001,
///   "error": "insufficient_funds"
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub msg: String,
    /// Numeric error code.
    pub code: u32,
    /// Machine-readable error kind.
    pub error: &'static str,
}

/// Engine error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category                 | HTTP Status                  |
/// |-----------|--------------------------|------------------------------|
/// | 1000–1999 | Validation               | 400 Bad Request              |
/// | 2000–2999 | Not Found / State        | 404 Not Found / 409 Conflict |
/// | 3000–3999 | Server                   | 500 Internal Server Error    |
/// | 4000–4999 | Funds                    | 422 Unprocessable Entity     |
/// | 5000–5999 | Identity                 | 401 / 403                    |
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// Non-positive or malformed amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Payout method details are missing.
    #[error("incomplete payout details: missing {}", .0.join(", "))]
    IncompletePayoutDetails(Vec<&'static str>),

    /// Campaign with the given id was not found.
    #[error("campaign not found: {0}")]
    CampaignNotFound(CampaignId),

    /// Clip with the given id was not found.
    #[error("clip not found: {0}")]
    ClipNotFound(ClipId),

    /// Refund request with the given id was not found.
    #[error("refund request not found: {0}")]
    RefundNotFound(RefundId),

    /// Transaction with the given id was not found.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    /// Operation is not valid in the entity's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Reclaim attempted while the campaign is live.
    #[error("campaign is live until {deadline}; funds cannot be reclaimed before the deadline")]
    CampaignLive {
        /// Campaign deadline.
        deadline: chrono::DateTime<chrono::Utc>,
    },

    /// Nothing is owed to the creator.
    #[error("nothing to distribute: creator has already been paid for all milestones reached")]
    NothingToDistribute,

    /// Wallet balance is too low.
    #[error("insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds {
        /// Current wallet balance.
        available: Money,
        /// Amount requested.
        requested: Money,
    },

    /// Campaign pool does not hold enough undistributed funds.
    #[error("insufficient campaign funds: available {available}, required {required}")]
    InsufficientCampaignFunds {
        /// `funds_allocated - funds_distributed`.
        available: Money,
        /// Amount the payout needs.
        required: Money,
    },

    /// Reclaim exceeds the undistributed pool.
    #[error("cannot reclaim {requested}: only {refundable} is undistributed")]
    OverReclaim {
        /// `funds_allocated - funds_distributed`.
        refundable: Money,
        /// Amount requested.
        requested: Money,
    },

    /// Refund exceeds the refundable ceiling.
    #[error("refund of {requested} exceeds refundable amount {refundable}")]
    ExceedsRefundable {
        /// `funds_allocated - funds_distributed`.
        refundable: Money,
        /// Amount requested or approved.
        requested: Money,
    },

    /// Arithmetic on an amount overflowed.
    #[error("amount overflow")]
    AmountOverflow,

    /// No identity was supplied with the request.
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    /// Caller may not perform the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SettlementError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::InvalidAmount(_) => 1002,
            Self::IncompletePayoutDetails(_) => 1003,
            Self::CampaignNotFound(_) => 2001,
            Self::ClipNotFound(_) => 2002,
            Self::RefundNotFound(_) => 2003,
            Self::TransactionNotFound(_) => 2004,
            Self::InvalidState(_) => 2101,
            Self::CampaignLive { .. } => 2102,
            Self::NothingToDistribute => 2103,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::AmountOverflow => 3002,
            Self::InsufficientFunds { .. } => 4001,
            Self::InsufficientCampaignFunds { .. } => 4002,
            Self::OverReclaim { .. } => 4003,
            Self::ExceedsRefundable { .. } => 4004,
            Self::Unauthenticated(_) => 5001,
            Self::Forbidden(_) => 5002,
        }
    }

    /// Returns the machine-readable kind for this variant.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::InvalidAmount(_) => "invalid_amount",
            Self::IncompletePayoutDetails(_) => "incomplete_payout_details",
            Self::CampaignNotFound(_)
            | Self::ClipNotFound(_)
            | Self::RefundNotFound(_)
            | Self::TransactionNotFound(_) => "not_found",
            Self::InvalidState(_) => "invalid_state",
            Self::CampaignLive { .. } => "campaign_live",
            Self::NothingToDistribute => "nothing_to_distribute",
            Self::Internal(_) => "internal",
            Self::PersistenceError(_) => "persistence",
            Self::AmountOverflow => "amount_overflow",
            Self::InsufficientFunds { .. } => "insufficient_funds",
            Self::InsufficientCampaignFunds { .. } => "insufficient_campaign_funds",
            Self::OverReclaim { .. } => "over_reclaim",
            Self::ExceedsRefundable { .. } => "exceeds_refundable",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::Forbidden(_) => "forbidden",
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) | Self::InvalidAmount(_) | Self::IncompletePayoutDetails(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::CampaignNotFound(_)
            | Self::ClipNotFound(_)
            | Self::RefundNotFound(_)
            | Self::TransactionNotFound(_) => StatusCode::NOT_FOUND,
            Self::InvalidState(_) | Self::CampaignLive { .. } | Self::NothingToDistribute => {
                StatusCode::CONFLICT
            }
            Self::InsufficientFunds { .. }
            | Self::InsufficientCampaignFunds { .. }
            | Self::OverReclaim { .. }
            | Self::ExceedsRefundable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::PersistenceError(_) | Self::Internal(_) | Self::AmountOverflow => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for SettlementError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            msg: self.to_string(),
            code: self.error_code(),
            error: self.kind(),
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn funds_errors_are_unprocessable() {
        let err = SettlementError::InsufficientFunds {
            available: Money::from_major(2000),
            requested: Money::from_major(3000),
        };
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.error_code(), 4001);
        assert_eq!(
            err.to_string(),
            "insufficient funds: available 2000.00, requested 3000.00"
        );
    }

    #[test]
    fn incomplete_payout_details_lists_fields() {
        let err = SettlementError::IncompletePayoutDetails(vec!["bank_account", "ifsc"]);
        assert_eq!(
            err.to_string(),
            "incomplete payout details: missing bank_account, ifsc"
        );
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_variants_share_kind() {
        let err = SettlementError::CampaignNotFound(CampaignId::new());
        assert_eq!(err.kind(), "not_found");
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn identity_errors_map_to_auth_statuses() {
        assert_eq!(
            SettlementError::Unauthenticated("missing header".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            SettlementError::Forbidden("not owner".into()).status_code(),
            StatusCode::FORBIDDEN
        );
    }

    #[tokio::test]
    async fn response_body_carries_msg_code_and_kind() {
        let err = SettlementError::OverReclaim {
            refundable: Money::from_major(500),
            requested: Money::from_major(800),
        };
        let message = err.to_string();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
            panic!("readable body");
        };
        let Ok(body) = serde_json::from_slice::<serde_json::Value>(&bytes) else {
            panic!("JSON body");
        };
        assert_eq!(body["msg"], message.as_str());
        assert_eq!(body["error"], "over_reclaim");
        assert!(body["code"].is_u64());
    }
}
