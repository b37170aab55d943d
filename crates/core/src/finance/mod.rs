//! Installment financing engine.
//!
//! Computes amortized payment schedules, drives the loan plan lifecycle, and
//! reconciles incoming payments against the plan's due-date schedule. Both
//! payment channels (manual entry and the hosted-checkout callback) converge
//! on the same reconciliation path here.

pub mod amortization;
pub mod calendar;
pub mod error;
pub mod plan;
pub mod reconcile;

pub use amortization::{LoanSchedule, compute_schedule};
pub use calendar::{advance_months, first_due_date};
pub use error::FinanceError;
pub use plan::{PaymentChannel, PlanSnapshot, PlanStatus};
pub use reconcile::{PaymentKind, ReconcileOutcome, reconcile};
