//! Payment reconciliation against a loan plan.
//!
//! Pure function over a [`PlanSnapshot`]: repositories load the snapshot and
//! cumulative paid total under the plan's row lock, and persist the returned
//! outcome inside the same transaction.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use super::calendar::{advance_months, first_due_date};
use super::error::FinanceError;
use super::plan::{PlanSnapshot, PlanStatus};

/// What an incoming payment is meant to cover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentKind {
    /// One or more regular installments.
    Installment,
    /// The full remaining balance, computed by the caller.
    Settlement,
}

/// Result of reconciling one payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Number of full installments the amount covered.
    pub installments_applied: u32,
    /// Updated next due date (`None` when the plan completed).
    pub next_due_date: Option<NaiveDate>,
    /// Resulting plan status.
    pub status: PlanStatus,
}

/// Reconciles a payment against a plan snapshot.
///
/// `installments_paid_before` is the cumulative total of completed
/// installment payments for the plan, excluding the origination down
/// payment, as of the moment the snapshot was taken.
///
/// # Errors
///
/// - [`FinanceError::PlanNotActive`] when the plan is terminal.
/// - [`FinanceError::InsufficientAmount`] when the amount does not cover a
///   single installment and this is not a settlement.
pub fn reconcile(
    plan: &PlanSnapshot,
    amount: Decimal,
    kind: PaymentKind,
    installments_paid_before: Decimal,
) -> Result<ReconcileOutcome, FinanceError> {
    if plan.status != PlanStatus::Active {
        return Err(FinanceError::PlanNotActive(plan.status));
    }
    if amount <= Decimal::ZERO || (kind == PaymentKind::Installment && amount < plan.monthly_installment)
    {
        return Err(FinanceError::InsufficientAmount {
            required: plan.monthly_installment,
        });
    }

    let installments_applied = covered_installments(amount, plan.monthly_installment);

    if kind == PaymentKind::Settlement {
        // Settlement always clears the plan, whatever the count arithmetic says.
        return Ok(ReconcileOutcome {
            installments_applied,
            next_due_date: None,
            status: PlanStatus::Completed,
        });
    }

    // Advance from the current due date; an unset one means the first
    // installment was due one month after origination.
    let base = plan
        .next_due_date
        .unwrap_or_else(|| first_due_date(plan.start_date));
    let next_due = advance_months(base, installments_applied);

    let paid_after = installments_paid_before + amount;
    if paid_after >= plan.repayment_target() {
        Ok(ReconcileOutcome {
            installments_applied,
            next_due_date: None,
            status: PlanStatus::Completed,
        })
    } else {
        Ok(ReconcileOutcome {
            installments_applied,
            next_due_date: Some(next_due),
            status: PlanStatus::Active,
        })
    }
}

/// Full installments covered by an amount: integer division, remainder
/// absorbed into the paid total without advancing the schedule further.
fn covered_installments(amount: Decimal, installment: Decimal) -> u32 {
    (amount / installment).trunc().to_u32().unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn plan(next_due: Option<(i32, u32, u32)>) -> PlanSnapshot {
        PlanSnapshot {
            status: PlanStatus::Active,
            start_date: NaiveDate::from_ymd_opt(2024, 3, 10).unwrap(),
            next_due_date: next_due.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            monthly_installment: dec!(10000),
            loan_amount: dec!(300000),
            total_interest: dec!(60000),
        }
    }

    #[test]
    fn test_partial_payment_applies_floor_of_installments() {
        // 22,000 against a 10,000 installment: 2 applied, remainder absorbed.
        let snap = plan(Some((2024, 4, 10)));
        let outcome = reconcile(&snap, dec!(22000), PaymentKind::Installment, dec!(335000)).unwrap();

        assert_eq!(outcome.installments_applied, 2);
        assert_eq!(
            outcome.next_due_date,
            NaiveDate::from_ymd_opt(2024, 6, 10)
        );
        assert_eq!(outcome.status, PlanStatus::Active);
        assert_eq!(snap.remaining_balance(dec!(335000) + dec!(22000)), dec!(3000.00));
    }

    #[test]
    fn test_scenario_25000_remaining_22000_paid() {
        // Plan with 25,000 remaining receives 22,000 (not a settlement):
        // applies 2 installments and stays active with 5,000 remaining.
        let snap = plan(Some((2025, 1, 15)));
        let paid_before = snap.repayment_target() - dec!(25000);
        let outcome = reconcile(&snap, dec!(22000), PaymentKind::Installment, paid_before).unwrap();

        assert_eq!(outcome.installments_applied, 2);
        assert_eq!(outcome.status, PlanStatus::Active);
        assert_eq!(
            outcome.next_due_date,
            NaiveDate::from_ymd_opt(2025, 3, 15)
        );
        assert_eq!(
            snap.remaining_balance(paid_before + dec!(22000)),
            dec!(5000.00)
        );
    }

    #[test]
    fn test_exact_installment_advances_one_month() {
        let snap = plan(Some((2024, 4, 30)));
        let outcome = reconcile(&snap, dec!(10000), PaymentKind::Installment, Decimal::ZERO).unwrap();

        assert_eq!(outcome.installments_applied, 1);
        // Due-date clamping applies while advancing.
        assert_eq!(
            outcome.next_due_date,
            NaiveDate::from_ymd_opt(2024, 5, 30)
        );
        assert_eq!(outcome.status, PlanStatus::Active);
    }

    #[test]
    fn test_unset_due_date_advances_from_first_due() {
        let snap = plan(None);
        let outcome = reconcile(&snap, dec!(10000), PaymentKind::Installment, Decimal::ZERO).unwrap();

        // start 2024-03-10 -> first due 2024-04-10 -> +1 applied = 2024-05-10.
        assert_eq!(
            outcome.next_due_date,
            NaiveDate::from_ymd_opt(2024, 5, 10)
        );
    }

    #[test]
    fn test_payment_reaching_target_completes_plan() {
        let snap = plan(Some((2026, 11, 10)));
        let outcome =
            reconcile(&snap, dec!(10000), PaymentKind::Installment, dec!(350000)).unwrap();

        assert_eq!(outcome.status, PlanStatus::Completed);
        assert_eq!(outcome.next_due_date, None);
    }

    #[test]
    fn test_overpayment_completes_plan() {
        let snap = plan(Some((2026, 10, 10)));
        let outcome =
            reconcile(&snap, dec!(30000), PaymentKind::Installment, dec!(340000)).unwrap();

        assert_eq!(outcome.status, PlanStatus::Completed);
        assert_eq!(outcome.next_due_date, None);
    }

    #[test]
    fn test_settlement_always_completes() {
        // Settlement completes even when the amount covers zero whole
        // installments.
        let snap = plan(Some((2026, 11, 10)));
        let outcome = reconcile(&snap, dec!(4000), PaymentKind::Settlement, dec!(356000)).unwrap();

        assert_eq!(outcome.status, PlanStatus::Completed);
        assert_eq!(outcome.next_due_date, None);
        assert_eq!(outcome.installments_applied, 0);
    }

    #[rstest]
    #[case(PlanStatus::Completed)]
    #[case(PlanStatus::Closed)]
    #[case(PlanStatus::Defaulted)]
    fn test_terminal_plans_reject_payments(#[case] status: PlanStatus) {
        let mut snap = plan(Some((2024, 4, 10)));
        snap.status = status;
        let result = reconcile(&snap, dec!(10000), PaymentKind::Installment, Decimal::ZERO);
        assert_eq!(result, Err(FinanceError::PlanNotActive(status)));
    }

    #[test]
    fn test_below_installment_rejected() {
        let snap = plan(Some((2024, 4, 10)));
        let result = reconcile(&snap, dec!(9999.99), PaymentKind::Installment, Decimal::ZERO);
        assert_eq!(
            result,
            Err(FinanceError::InsufficientAmount {
                required: dec!(10000)
            })
        );
    }

    #[test]
    fn test_zero_amount_rejected_even_for_settlement() {
        let snap = plan(Some((2024, 4, 10)));
        let result = reconcile(&snap, Decimal::ZERO, PaymentKind::Settlement, dec!(356000));
        assert!(matches!(
            result,
            Err(FinanceError::InsufficientAmount { .. })
        ));
    }

    #[test]
    fn test_covered_installments_truncates() {
        assert_eq!(covered_installments(dec!(24000), dec!(10000)), 2);
        assert_eq!(covered_installments(dec!(10000), dec!(10000)), 1);
        assert_eq!(covered_installments(dec!(29999.99), dec!(10000)), 2);
    }
}
