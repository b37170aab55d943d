//! Amortized payment schedule calculation.
//!
//! CRITICAL: All arithmetic stays in `Decimal` at full precision; only the
//! three published outputs are quantized to cents (round-half-up). Rounding
//! intermediates would compound error across the term.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use vantra_shared::types::quantize_cents;

use super::error::FinanceError;

/// The three published figures of an amortized loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanSchedule {
    /// Fixed monthly installment.
    pub monthly_installment: Decimal,
    /// Total amount payable over the term (`installment * term_months`).
    pub total_payable: Decimal,
    /// Interest portion of the total (`total_payable - principal`).
    pub total_interest: Decimal,
}

/// Computes the amortized schedule for a loan.
///
/// Converts the annual percentage rate to a monthly rate (`rate / 1200`) and
/// applies the standard amortizing-loan formula
/// `P * r * (1+r)^n / ((1+r)^n - 1)`. A zero rate degenerates to
/// straight-line repayment (`principal / term`).
///
/// # Errors
///
/// Returns [`FinanceError::InvalidLoanParameters`] when the principal is not
/// positive, the term is zero, or the rate is negative.
pub fn compute_schedule(
    principal: Decimal,
    annual_rate_percent: Decimal,
    term_months: u32,
) -> Result<LoanSchedule, FinanceError> {
    if principal <= Decimal::ZERO {
        return Err(FinanceError::InvalidLoanParameters(format!(
            "principal must be positive, got {principal}"
        )));
    }
    if term_months == 0 {
        return Err(FinanceError::InvalidLoanParameters(
            "term must be at least one month".to_string(),
        ));
    }
    if annual_rate_percent < Decimal::ZERO {
        return Err(FinanceError::InvalidLoanParameters(format!(
            "rate must not be negative, got {annual_rate_percent}"
        )));
    }

    let principal = quantize_cents(principal);
    let term = Decimal::from(term_months);
    let monthly_rate = annual_rate_percent / Decimal::from(1200);

    let raw_installment = if monthly_rate.is_zero() {
        principal / term
    } else {
        let factor = compound_factor(monthly_rate, term_months);
        principal * monthly_rate * factor / (factor - Decimal::ONE)
    };

    let monthly_installment = quantize_cents(raw_installment);
    let total_payable = quantize_cents(monthly_installment * term);
    let total_interest = quantize_cents(total_payable - principal);

    Ok(LoanSchedule {
        monthly_installment,
        total_payable,
        total_interest,
    })
}

/// Computes `(1 + r)^n` by repeated multiplication.
///
/// Keeps the computation inside plain `Decimal` multiplication; terms are
/// bounded (months), so the loop is cheap.
fn compound_factor(monthly_rate: Decimal, term_months: u32) -> Decimal {
    let base = Decimal::ONE + monthly_rate;
    let mut factor = Decimal::ONE;
    for _ in 0..term_months {
        factor *= base;
    }
    factor
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(dec!(500000), dec!(8.5), 36, dec!(15783.77), dec!(568215.72), dec!(68215.72))]
    #[case(dec!(1000000), dec!(9.25), 60, dec!(20879.90), dec!(1252794.00), dec!(252794.00))]
    #[case(dec!(400000), dec!(8.5), 24, dec!(18182.27), dec!(436374.48), dec!(36374.48))]
    #[case(dec!(250000), dec!(12), 12, dec!(22212.20), dec!(266546.40), dec!(16546.40))]
    fn test_reference_schedules(
        #[case] principal: Decimal,
        #[case] rate: Decimal,
        #[case] term: u32,
        #[case] installment: Decimal,
        #[case] total: Decimal,
        #[case] interest: Decimal,
    ) {
        let schedule = compute_schedule(principal, rate, term).unwrap();
        assert_eq!(schedule.monthly_installment, installment);
        assert_eq!(schedule.total_payable, total);
        assert_eq!(schedule.total_interest, interest);
    }

    #[test]
    fn test_zero_rate_is_straight_line() {
        let schedule = compute_schedule(dec!(500000), Decimal::ZERO, 36).unwrap();
        assert_eq!(schedule.monthly_installment, dec!(13888.89));
        // Installment rounding leaves at most half a cent per month of drift.
        assert_eq!(schedule.total_payable, dec!(500000.04));
        assert_eq!(schedule.total_interest, dec!(0.04));
    }

    #[test]
    fn test_zero_rate_exact_division() {
        let schedule = compute_schedule(dec!(120000), Decimal::ZERO, 12).unwrap();
        assert_eq!(schedule.monthly_installment, dec!(10000.00));
        assert_eq!(schedule.total_payable, dec!(120000.00));
        assert_eq!(schedule.total_interest, Decimal::ZERO.round_dp(2));
    }

    #[test]
    fn test_single_month_term() {
        let schedule = compute_schedule(dec!(10000), dec!(12), 1).unwrap();
        // One period: installment = P * (1 + r).
        assert_eq!(schedule.monthly_installment, dec!(10100.00));
        assert_eq!(schedule.total_interest, dec!(100.00));
    }

    #[rstest]
    #[case(dec!(0), dec!(8.5), 36)]
    #[case(dec!(-1), dec!(8.5), 36)]
    #[case(dec!(500000), dec!(8.5), 0)]
    #[case(dec!(500000), dec!(-0.01), 36)]
    fn test_invalid_parameters_rejected(
        #[case] principal: Decimal,
        #[case] rate: Decimal,
        #[case] term: u32,
    ) {
        let result = compute_schedule(principal, rate, term);
        assert!(matches!(
            result,
            Err(FinanceError::InvalidLoanParameters(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// For any valid inputs, `installment * n == total_payable` exactly
        /// and `total_payable - principal == total_interest` exactly: both
        /// hold by construction of the quantized outputs.
        #[test]
        fn prop_outputs_reconcile(
            principal_cents in 1i64..100_000_000_00i64,
            rate_bps in 0u32..3000u32,
            term in 1u32..=120u32,
        ) {
            let principal = Decimal::new(principal_cents, 2);
            let rate = Decimal::new(i64::from(rate_bps), 2);
            let schedule = compute_schedule(principal, rate, term).unwrap();

            prop_assert_eq!(
                schedule.total_payable,
                quantize_cents(schedule.monthly_installment * Decimal::from(term))
            );
            prop_assert_eq!(
                schedule.total_interest,
                schedule.total_payable - principal
            );
        }

        /// Positive rates always produce positive interest for terms > 1.
        #[test]
        fn prop_positive_rate_positive_interest(
            principal_cents in 100_00i64..100_000_000_00i64,
            rate_bps in 100u32..3000u32,
            term in 2u32..=120u32,
        ) {
            let principal = Decimal::new(principal_cents, 2);
            let rate = Decimal::new(i64::from(rate_bps), 2);
            let schedule = compute_schedule(principal, rate, term).unwrap();
            prop_assert!(schedule.total_interest > Decimal::ZERO);
        }

        /// Zero-rate interest is bounded by the per-month rounding drift.
        #[test]
        fn prop_zero_rate_interest_is_rounding_only(
            principal_cents in 1i64..100_000_000_00i64,
            term in 1u32..=120u32,
        ) {
            let principal = Decimal::new(principal_cents, 2);
            let schedule = compute_schedule(principal, Decimal::ZERO, term).unwrap();
            let bound = Decimal::new(1, 2) * Decimal::from(term);
            prop_assert!(schedule.total_interest.abs() <= bound);
        }
    }
}
