//! OpenAPI document.

use utoipa::OpenApi;

use super::{dto, handlers};
use crate::{domain, error, service};

/// OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Campaign Settlement API",
        description = "Wallet ledger and settlement engine for a brand/creator campaign marketplace.\n\nCallers are identified by the `x-actor-role` and `x-actor-id` headers. Amounts are decimal strings.",
        license(name = "MIT"),
    ),
    tags(
        (name = "System", description = "Health and configuration"),
        (name = "Wallets", description = "Balances, deposits, withdrawals and ledger history"),
        (name = "Campaigns", description = "Campaign lifecycle"),
        (name = "Campaign Funds", description = "Allocation, reclaim and campaign refunds"),
        (name = "Clips", description = "Clip submission and review"),
        (name = "Distributions", description = "Creator payouts"),
        (name = "Refunds", description = "Two-phase refund requests"),
        (name = "Reports", description = "Read-only earnings and performance projections"),
    ),
    paths(
        handlers::system::health_handler,
        handlers::system::settlement_params_handler,
        handlers::wallet::get_own_balance,
        handlers::wallet::get_balance,
        handlers::wallet::get_transactions,
        handlers::wallet::get_transaction,
        handlers::wallet::deposit,
        handlers::wallet::withdraw,
        handlers::wallet::withdrawal_history,
        handlers::wallet::settle_withdrawal,
        handlers::wallet::revert_withdrawal,
        handlers::wallet::save_payout_details,
        handlers::wallet::get_payout_details,
        handlers::wallet::verify_payout_details,
        handlers::campaign::create_campaign,
        handlers::campaign::list_campaigns,
        handlers::campaign::get_campaign,
        handlers::campaign::set_active,
        handlers::campaign::update_deadline,
        handlers::campaign::update_view_threshold,
        handlers::campaign::update_budget,
        handlers::campaign::recompute_view_count,
        handlers::campaign::delete_campaign,
        handlers::campaign::allocate,
        handlers::campaign::reclaim,
        handlers::campaign::refund_campaign,
        handlers::campaign::campaign_summary,
        handlers::campaign::calculate_earnings,
        handlers::campaign::pending_payouts,
        handlers::campaign::campaign_performance,
        handlers::clip::submit_clip,
        handlers::clip::list_clips,
        handlers::clip::review_clip,
        handlers::clip::update_views,
        handlers::clip::delete_clip,
        handlers::settlement::distribute,
        handlers::settlement::bulk_distribute,
        handlers::settlement::request_refund,
        handlers::settlement::list_refunds,
        handlers::settlement::refund_audit_trail,
        handlers::settlement::refund_status,
        handlers::settlement::approve_refund,
        handlers::settlement::reject_refund,
    ),
    components(schemas(
        error::ErrorResponse,
        domain::Money,
        domain::CommissionRate,
        domain::Campaign,
        domain::PayoutTerms,
        domain::Clip,
        domain::ClipStatus,
        domain::Transaction,
        domain::TransactionType,
        domain::TransactionStatus,
        domain::ActorKind,
        domain::RefundRequest,
        domain::RefundStatus,
        domain::RefundType,
        domain::PayoutMethod,
        domain::PayoutFields,
        domain::PayoutDetails,
        dto::BalanceResponse,
        dto::DepositRequest,
        dto::WithdrawRequest,
        dto::SettleWithdrawalRequest,
        dto::SettlementVerdict,
        dto::TransactionListResponse,
        dto::SavePayoutDetailsRequest,
        dto::PayoutDetailsResponse,
        dto::CreateCampaignRequest,
        dto::CampaignListResponse,
        dto::SetActiveRequest,
        dto::UpdateDeadlineRequest,
        dto::UpdateViewThresholdRequest,
        dto::UpdateBudgetRequest,
        dto::AmountRequest,
        dto::SubmitClipRequest,
        dto::ReviewClipRequest,
        dto::ViewCountRequest,
        dto::BulkDistributeRequest,
        dto::CreateRefundRequest,
        dto::ApproveRefundRequest,
        dto::ApproveRefundResponse,
        dto::RejectRefundRequest,
        service::FundsMovement,
        service::DepositOutcome,
        service::WithdrawalOutcome,
        service::Posting,
        service::PayoutVerification,
        service::Earnings,
        service::EarningsReport,
        service::PendingPayouts,
        service::CreatorPayout,
        service::CampaignPerformance,
        service::PerformanceOverview,
        service::PerformanceFinancials,
        service::CreatorPerformance,
        service::CampaignSummary,
        service::CampaignDeletion,
        service::ViewCountUpdate,
        service::DistributionOrder,
        service::DistributionResult,
        service::BulkDistribution,
        service::BulkSummary,
        service::BulkItemResult,
        service::BulkItemStatus,
        service::CampaignRefund,
        service::RefundStatusView,
        service::RefundTimelineEntry,
        service::RefundPage,
        service::RefundAuditTrail,
        service::RefundAuditSummary,
        handlers::system::HealthResponse,
        handlers::system::SettlementParams,
    ))
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_core_operations() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/v1/campaigns/{id}/allocate",
            "/api/v1/campaigns/{id}/reclaim",
            "/api/v1/campaigns/{id}/deadline",
            "/api/v1/campaigns/{id}/view-count/recompute",
            "/api/v1/distributions",
            "/api/v1/distributions/bulk",
            "/api/v1/refunds/{id}/approve",
            "/api/v1/wallet/withdrawals",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
