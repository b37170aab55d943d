//! Schedule preview routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::post,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::AppState;
use vantra_core::finance::{FinanceError, compute_schedule};

/// Creates the finance routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/finance/schedule", post(preview_schedule))
}

/// Request body for a schedule preview.
#[derive(Debug, Deserialize)]
pub struct ScheduleRequest {
    /// Amount to finance.
    pub principal: Decimal,
    /// Annual rate in percent; defaults to the configured rate.
    pub annual_rate: Option<Decimal>,
    /// Loan term in months.
    pub term_months: u32,
}

/// Response body for a schedule preview.
#[derive(Debug, Serialize)]
pub struct ScheduleResponse {
    /// Fixed monthly installment.
    pub monthly_installment: Decimal,
    /// Installment times term.
    pub total_payable: Decimal,
    /// Interest over the full term.
    pub total_interest: Decimal,
    /// Rate actually used, after defaulting and clamping.
    pub annual_rate: Decimal,
    /// Term in months.
    pub term_months: u32,
}

/// POST `/finance/schedule` - Previews an amortization schedule.
async fn preview_schedule(
    State(state): State<AppState>,
    Json(payload): Json<ScheduleRequest>,
) -> impl IntoResponse {
    let annual_rate = clamp_rate(
        payload.annual_rate,
        state.finance.default_annual_rate,
        state.finance.max_annual_rate,
    );

    match compute_schedule(payload.principal, annual_rate, payload.term_months) {
        Ok(schedule) => (
            StatusCode::OK,
            Json(ScheduleResponse {
                monthly_installment: schedule.monthly_installment,
                total_payable: schedule.total_payable,
                total_interest: schedule.total_interest,
                annual_rate,
                term_months: payload.term_months,
            }),
        )
            .into_response(),
        Err(e @ FinanceError::InvalidLoanParameters(_)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "invalid_loan_parameters",
                "message": e.to_string()
            })),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Unexpected schedule error");
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

/// Defaults a missing rate and clamps the result into `0..=ceiling`.
#[must_use]
pub fn clamp_rate(requested: Option<Decimal>, default_rate: Decimal, ceiling: Decimal) -> Decimal {
    requested
        .unwrap_or(default_rate)
        .clamp(Decimal::ZERO, ceiling)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(None, dec!(8.50))]
    #[case(Some(dec!(12.00)), dec!(12.00))]
    #[case(Some(dec!(45.00)), dec!(30.00))]
    #[case(Some(dec!(-3.00)), dec!(0))]
    fn test_clamp_rate(#[case] requested: Option<Decimal>, #[case] expected: Decimal) {
        assert_eq!(clamp_rate(requested, dec!(8.50), dec!(30.00)), expected);
    }
}
