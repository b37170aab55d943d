//! Loan plan lifecycle types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vantra_shared::types::quantize_cents;

/// Status of an installment loan plan.
///
/// `Active` is the sole initial state; the other three are terminal and a
/// plan only ever moves forward into them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    /// Plan is open and accepting installment payments.
    Active,
    /// All dues cleared.
    Completed,
    /// Closed administratively (e.g., early buy-back).
    Closed,
    /// Marked defaulted administratively.
    Defaulted,
}

impl PlanStatus {
    /// Returns true if the plan can no longer accept payments.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self != Self::Active
    }

    /// Returns true if the transition is allowed (forward only).
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self == Self::Active && next.is_terminal()
    }
}

impl std::fmt::Display for PlanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "active"),
            Self::Completed => write!(f, "completed"),
            Self::Closed => write!(f, "closed"),
            Self::Defaulted => write!(f, "defaulted"),
        }
    }
}

/// How a payment reached the system.
///
/// Both channels dispatch to the same reconciliation path; the external
/// channel additionally carries the authorization reference used as the
/// idempotency key for retried callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PaymentChannel {
    /// Recorded in person by staff.
    Manual {
        /// Payment method as reported at the counter.
        method: String,
    },
    /// Confirmed by the hosted-checkout authorization service.
    External {
        /// Authorization reference; unique per completed payment.
        reference: String,
    },
}

impl PaymentChannel {
    /// Returns the external authorization reference, when present.
    #[must_use]
    pub fn external_reference(&self) -> Option<&str> {
        match self {
            Self::Manual { .. } => None,
            Self::External { reference } => Some(reference),
        }
    }
}

/// The slice of plan state reconciliation needs.
///
/// Repositories load this under the plan's row lock and apply the returned
/// outcome inside the same transaction.
#[derive(Debug, Clone)]
pub struct PlanSnapshot {
    /// Current plan status.
    pub status: PlanStatus,
    /// Plan origination date.
    pub start_date: NaiveDate,
    /// Next installment due date; `None` once terminal (or not yet set).
    pub next_due_date: Option<NaiveDate>,
    /// Fixed monthly installment.
    pub monthly_installment: Decimal,
    /// Financed amount (price minus down payment).
    pub loan_amount: Decimal,
    /// Interest over the full term.
    pub total_interest: Decimal,
}

impl PlanSnapshot {
    /// Total the installments must reach for the plan to complete
    /// (the down payment is settled at origination and excluded).
    #[must_use]
    pub fn repayment_target(&self) -> Decimal {
        quantize_cents(self.loan_amount + self.total_interest)
    }

    /// Remaining balance given the installment total paid so far, floored
    /// at zero.
    #[must_use]
    pub fn remaining_balance(&self, installments_paid: Decimal) -> Decimal {
        let remaining = self.repayment_target() - installments_paid;
        if remaining < Decimal::ZERO {
            Decimal::ZERO
        } else {
            quantize_cents(remaining)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot() -> PlanSnapshot {
        PlanSnapshot {
            status: PlanStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            next_due_date: NaiveDate::from_ymd_opt(2024, 4, 10),
            monthly_installment: dec!(10000),
            loan_amount: dec!(300000),
            total_interest: dec!(60000),
        }
    }

    #[test]
    fn test_active_is_only_non_terminal_state() {
        assert!(!PlanStatus::Active.is_terminal());
        assert!(PlanStatus::Completed.is_terminal());
        assert!(PlanStatus::Closed.is_terminal());
        assert!(PlanStatus::Defaulted.is_terminal());
    }

    #[test]
    fn test_transitions_are_forward_only() {
        assert!(PlanStatus::Active.can_transition_to(PlanStatus::Completed));
        assert!(PlanStatus::Active.can_transition_to(PlanStatus::Closed));
        assert!(PlanStatus::Active.can_transition_to(PlanStatus::Defaulted));

        assert!(!PlanStatus::Completed.can_transition_to(PlanStatus::Active));
        assert!(!PlanStatus::Closed.can_transition_to(PlanStatus::Defaulted));
        assert!(!PlanStatus::Active.can_transition_to(PlanStatus::Active));
    }

    #[test]
    fn test_repayment_target_includes_interest() {
        assert_eq!(snapshot().repayment_target(), dec!(360000.00));
    }

    #[test]
    fn test_remaining_balance_floors_at_zero() {
        let snap = snapshot();
        assert_eq!(snap.remaining_balance(dec!(100000)), dec!(260000.00));
        assert_eq!(snap.remaining_balance(dec!(360000)), dec!(0.00));
        assert_eq!(snap.remaining_balance(dec!(400000)), Decimal::ZERO);
    }

    #[test]
    fn test_external_reference_accessor() {
        let manual = PaymentChannel::Manual {
            method: "cash".to_string(),
        };
        assert_eq!(manual.external_reference(), None);

        let external = PaymentChannel::External {
            reference: "cs_test_123".to_string(),
        };
        assert_eq!(external.external_reference(), Some("cs_test_123"));
    }
}
