//! Financing error types.

use rust_decimal::Decimal;
use thiserror::Error;

/// Error types for financing operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FinanceError {
    /// Principal, rate, or term fails input validation.
    #[error("Invalid loan parameters: {0}")]
    InvalidLoanParameters(String),

    /// The plan is not in the active state.
    #[error("Plan is not active (status: {0})")]
    PlanNotActive(super::PlanStatus),

    /// Payment amount does not cover a single installment.
    #[error("Payment amount must cover at least one installment of {required}")]
    InsufficientAmount {
        /// The monthly installment the amount must reach.
        required: Decimal,
    },
}
