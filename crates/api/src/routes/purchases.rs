//! Purchase routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::AppState;
use crate::routes::finance::clamp_rate;
use vantra_core::finance::PaymentChannel;
use vantra_shared::types::{CustomerId, PaymentId, PlanId, SaleId, VariantId, VehicleId};
use vantra_db::repositories::purchase::{
    CreatePurchaseInput, FinancingTerms, PurchaseError, PurchaseRepository,
};

/// Creates the purchase routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/purchases", post(create_purchase))
}

/// Requested financing terms.
#[derive(Debug, Deserialize)]
pub struct FinancingRequest {
    /// Up-front payment.
    pub down_payment: Decimal,
    /// Annual rate override in percent.
    pub annual_rate: Option<Decimal>,
    /// Loan term in months.
    pub term_months: u32,
}

/// Request body for a purchase.
#[derive(Debug, Deserialize)]
pub struct CreatePurchaseRequest {
    /// Buyer.
    pub customer_id: CustomerId,
    /// Vehicle to buy.
    pub vehicle_id: VehicleId,
    /// Variant, when the vehicle has variants.
    pub variant_id: Option<VariantId>,
    /// Payment channel (`manual` with a method, or `external` with a
    /// reference).
    pub channel: PaymentChannel,
    /// Present for installment purchases.
    pub financing: Option<FinancingRequest>,
}

/// POST `/purchases` - Executes a purchase.
///
/// A retried external callback answers `200 OK` with the already-recorded
/// payment so the caller can treat it as settled.
async fn create_purchase(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseRequest>,
) -> impl IntoResponse {
    let financing = payload.financing.map(|f| FinancingTerms {
        down_payment: f.down_payment,
        annual_rate: f.annual_rate.map(|rate| {
            clamp_rate(
                Some(rate),
                state.finance.default_annual_rate,
                state.finance.max_annual_rate,
            )
        }),
        term_months: f.term_months,
    });

    let repo = PurchaseRepository::new((*state.db).clone());
    let result = repo
        .execute_purchase(CreatePurchaseInput {
            customer_id: payload.customer_id.into_inner(),
            vehicle_id: payload.vehicle_id.into_inner(),
            variant_id: payload.variant_id.map(VariantId::into_inner),
            channel: payload.channel,
            financing,
            purchase_date: Utc::now().date_naive(),
            default_annual_rate: state.finance.default_annual_rate,
            min_down_payment_percent: state.finance.min_down_payment_percent,
        })
        .await;

    match result {
        Ok(receipt) => {
            info!(
                payment_id = %receipt.payment_id,
                sale_id = %receipt.sale_id,
                "Purchase completed"
            );
            (
                StatusCode::CREATED,
                Json(json!({
                    "payment_id": PaymentId::from_uuid(receipt.payment_id),
                    "sale_id": SaleId::from_uuid(receipt.sale_id),
                    "plan_id": receipt.plan_id.map(PlanId::from_uuid),
                    "amount_paid": receipt.amount_paid,
                    "duplicate": false
                })),
            )
                .into_response()
        }
        Err(PurchaseError::DuplicatePayment { payment_id }) => (
            StatusCode::OK,
            Json(json!({
                "payment_id": PaymentId::from_uuid(payment_id),
                "duplicate": true
            })),
        )
            .into_response(),
        Err(e @ (PurchaseError::CustomerNotFound(_)
        | PurchaseError::VehicleNotFound(_)
        | PurchaseError::VariantNotFound(_))) => (
            StatusCode::NOT_FOUND,
            Json(json!({
                "error": "not_found",
                "message": e.to_string()
            })),
        )
            .into_response(),
        Err(PurchaseError::OutOfStock) => (
            StatusCode::CONFLICT,
            Json(json!({
                "error": "out_of_stock",
                "message": "No stock left for the requested vehicle"
            })),
        )
            .into_response(),
        Err(e @ (PurchaseError::InvalidDownPayment(_)
        | PurchaseError::UnknownPaymentMethod(_)
        | PurchaseError::Finance(_))) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_purchase",
                "message": e.to_string()
            })),
        )
            .into_response(),
        Err(e @ PurchaseError::Database(_)) => {
            error!(error = %e, "Failed to execute purchase");
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
