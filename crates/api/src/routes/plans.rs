//! Loan plan routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::AppState;
use vantra_core::finance::{FinanceError, PaymentChannel, PaymentKind};
use vantra_db::repositories::plan::{PlanError, PlanRepository};
use vantra_shared::types::{PaymentId, PlanId};

/// Creates the plan routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans/{plan_id}", get(get_plan))
        .route("/plans/{plan_id}/payments", post(apply_payment))
}

/// Request body for applying a payment.
#[derive(Debug, Deserialize)]
pub struct ApplyPaymentRequest {
    /// Amount paid.
    pub amount: Decimal,
    /// Payment channel (`manual` with a method, or `external` with a
    /// reference).
    pub channel: PaymentChannel,
    /// `installment` or `settlement`.
    pub kind: PaymentKind,
}

/// GET `/plans/{plan_id}` - Plan summary with repayment progress.
async fn get_plan(
    State(state): State<AppState>,
    Path(plan_id): Path<PlanId>,
) -> impl IntoResponse {
    let repo = PlanRepository::new((*state.db).clone());

    match repo.plan_summary(plan_id.into_inner()).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({
                "plan": summary.plan,
                "installments_paid": summary.installments_paid,
                "installments_remaining": summary.installments_remaining,
                "progress_percent": summary.progress_percent,
                "total_paid": summary.total_paid,
                "remaining_balance": summary.remaining_balance
            })),
        )
            .into_response(),
        Err(PlanError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "plan_not_found",
                "message": "Plan not found"
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to load plan summary");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal_error",
                    "message": "An error occurred"
                })),
            )
                .into_response()
        }
    }
}

/// POST `/plans/{plan_id}/payments` - Applies an installment or settlement
/// payment.
///
/// A retried external callback answers `200 OK` with the already-recorded
/// payment so the caller can treat it as settled.
async fn apply_payment(
    State(state): State<AppState>,
    Path(plan_id): Path<PlanId>,
    Json(payload): Json<ApplyPaymentRequest>,
) -> impl IntoResponse {
    let repo = PlanRepository::new((*state.db).clone());

    match repo
        .apply_payment(
            plan_id.into_inner(),
            payload.amount,
            payload.channel,
            payload.kind,
        )
        .await
    {
        Ok(applied) => {
            info!(
                %plan_id,
                payment_id = %applied.payment_id,
                installments = applied.installments_applied,
                "Payment applied"
            );
            (
                StatusCode::OK,
                Json(json!({
                    "payment_id": PaymentId::from_uuid(applied.payment_id),
                    "installments_applied": applied.installments_applied,
                    "status": applied.status,
                    "next_due_date": applied.next_due_date,
                    "remaining_balance": applied.remaining_balance,
                    "duplicate": false
                })),
            )
                .into_response()
        }
        Err(PlanError::DuplicatePayment { payment_id }) => (
            StatusCode::OK,
            Json(json!({
                "payment_id": PaymentId::from_uuid(payment_id),
                "duplicate": true
            })),
        )
            .into_response(),
        Err(PlanError::NotFound(_)) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "plan_not_found",
                "message": "Plan not found"
            })),
        )
            .into_response(),
        Err(e @ PlanError::Finance(FinanceError::PlanNotActive(_))) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({
                "error": "plan_not_active",
                "message": e.to_string()
            })),
        )
            .into_response(),
        Err(e @ (PlanError::Finance(_) | PlanError::UnknownPaymentMethod(_))) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_payment",
                "message": e.to_string()
            })),
        )
            .into_response(),
        Err(e @ (PlanError::InvalidTransition { .. } | PlanError::Database(_))) => {
            error!(error = %e, "Failed to apply payment");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "error": "internal_error",
                    "message": "An error occurred"
                })),
            )
                .into_response()
        }
    }
}
