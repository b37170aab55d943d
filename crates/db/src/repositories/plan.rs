//! Plan repository: installment reconciliation and plan lifecycle.
//!
//! `apply_payment` locks the plan row, runs the pure reconciliation over a
//! snapshot, and persists the outcome and the payment in one transaction.
//! Duplicate external references are caught by the partial unique index on
//! `payments.external_ref` so retried checkout callbacks stay idempotent.

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, SqlErr, TransactionTrait,
};
use uuid::Uuid;

use vantra_core::finance::{
    FinanceError, PaymentChannel, PaymentKind, PlanSnapshot, ReconcileOutcome, reconcile,
};
use vantra_shared::types::quantize_cents;

use crate::entities::{
    loan_plans, payments,
    sea_orm_active_enums::{PaymentMethod, PaymentStatus},
};

/// Error types for plan operations.
#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    /// Plan not found.
    #[error("Plan not found: {0}")]
    NotFound(Uuid),

    /// A completed payment with the same external reference already exists.
    /// Callers treat this as success with the existing result.
    #[error("Payment already recorded: {payment_id}")]
    DuplicatePayment {
        /// The previously recorded payment.
        payment_id: Uuid,
    },

    /// Manual channel named a method the system does not accept.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Requested status change moves backwards or out of a terminal state.
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: vantra_core::finance::PlanStatus,
        /// Requested status.
        to: vantra_core::finance::PlanStatus,
    },

    /// Reconciliation rejected the payment.
    #[error("Finance error: {0}")]
    Finance(#[from] FinanceError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Result of applying a payment to a plan.
#[derive(Debug, Clone)]
pub struct AppliedPayment {
    /// The payment row recorded by this call.
    pub payment_id: Uuid,
    /// Installments the amount covered (zero for a settlement).
    pub installments_applied: u32,
    /// Plan status after the payment.
    pub status: vantra_core::finance::PlanStatus,
    /// Next due date after the payment; `None` once completed.
    pub next_due_date: Option<chrono::NaiveDate>,
    /// Balance still owed after the payment.
    pub remaining_balance: Decimal,
}

/// Progress view of a plan, for receipts and profile pages.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    /// The plan row.
    pub plan: loan_plans::Model,
    /// Completed installments, capped at the term.
    pub installments_paid: u32,
    /// Installments still owed.
    pub installments_remaining: u32,
    /// Paid installments as a percentage of the term, two decimals.
    pub progress_percent: Decimal,
    /// Sum of completed installment payments (down payment excluded).
    pub total_paid: Decimal,
    /// Balance still owed.
    pub remaining_balance: Decimal,
}

/// Plan repository.
#[derive(Debug, Clone)]
pub struct PlanRepository {
    db: DatabaseConnection,
}

impl PlanRepository {
    /// Creates a new plan repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Applies an installment or settlement payment to a plan.
    ///
    /// The plan row is locked `FOR UPDATE` for the duration of the
    /// transaction, so concurrent payments against the same plan serialize.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown plan, `DuplicatePayment` when the
    /// external reference was already recorded, `Finance` when the plan is
    /// not active or the amount is insufficient, and `Database` on storage
    /// failures. Everything except `Database` leaves no trace; `Database`
    /// aborts the transaction, which rolls back on drop.
    pub async fn apply_payment(
        &self,
        plan_id: Uuid,
        amount: Decimal,
        channel: PaymentChannel,
        kind: PaymentKind,
    ) -> Result<AppliedPayment, PlanError> {
        // Quantize up front so reconciliation and the stored row see the
        // same cents.
        let amount = quantize_cents(amount);

        let (method, external_ref) = PaymentMethod::from_channel(&channel).ok_or_else(|| {
            match &channel {
                PaymentChannel::Manual { method } => {
                    PlanError::UnknownPaymentMethod(method.clone())
                }
                PaymentChannel::External { .. } => {
                    PlanError::UnknownPaymentMethod("external".to_string())
                }
            }
        })?;

        // Fast path for retried callbacks; the unique index below closes
        // the remaining race.
        if let Some(reference) = external_ref.as_deref() {
            if let Some(existing) = self.find_completed_by_ref(reference).await? {
                return Err(PlanError::DuplicatePayment {
                    payment_id: existing.id,
                });
            }
        }

        let txn = self.db.begin().await?;

        let plan = loan_plans::Entity::find_by_id(plan_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(PlanError::NotFound(plan_id))?;

        let paid_before = self.installment_total(&txn, plan_id).await?;
        let snap = snapshot(&plan);
        let outcome = reconcile(&snap, amount, kind, paid_before)?;

        let now = Utc::now();
        let payment_id = Uuid::new_v4();
        let payment = payments::ActiveModel {
            id: Set(payment_id),
            customer_id: Set(plan.customer_id),
            vehicle_id: Set(plan.vehicle_id),
            variant_id: Set(plan.variant_id),
            plan_id: Set(Some(plan_id)),
            amount: Set(amount),
            method: Set(method),
            status: Set(PaymentStatus::Completed),
            external_ref: Set(external_ref.clone()),
            is_down_payment: Set(false),
            paid_at: Set(Some(now.into())),
            created_at: Set(now.into()),
        };

        if let Err(err) = payment.insert(&txn).await {
            if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                // Rollback, then look up the winner outside the aborted
                // transaction.
                drop(txn);
                if let Some(reference) = external_ref.as_deref() {
                    if let Some(existing) = self.find_completed_by_ref(reference).await? {
                        return Err(PlanError::DuplicatePayment {
                            payment_id: existing.id,
                        });
                    }
                }
            }
            return Err(err.into());
        }

        self.store_outcome(&txn, plan, &outcome).await?;

        txn.commit().await?;

        let remaining_balance = if outcome.status.is_terminal() {
            Decimal::ZERO
        } else {
            snap.remaining_balance(paid_before + amount)
        };

        Ok(AppliedPayment {
            payment_id,
            installments_applied: outcome.installments_applied,
            status: outcome.status,
            next_due_date: outcome.next_due_date,
            remaining_balance,
        })
    }

    /// Moves a plan into a terminal state administratively.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown plan, `InvalidTransition` when the
    /// plan is already terminal or the target is not terminal, and
    /// `Database` on storage failures.
    pub async fn transition_status(
        &self,
        plan_id: Uuid,
        to: vantra_core::finance::PlanStatus,
    ) -> Result<loan_plans::Model, PlanError> {
        let txn = self.db.begin().await?;

        let plan = loan_plans::Entity::find_by_id(plan_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(PlanError::NotFound(plan_id))?;

        let from: vantra_core::finance::PlanStatus = plan.status.into();
        if !from.can_transition_to(to) {
            return Err(PlanError::InvalidTransition { from, to });
        }

        let mut active: loan_plans::ActiveModel = plan.into();
        active.status = Set(to.into());
        active.next_due_date = Set(None);
        active.updated_at = Set(Utc::now().into());
        let updated = active.update(&txn).await?;

        txn.commit().await?;
        Ok(updated)
    }

    /// Gets a plan by ID.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown plan or `Database` on query failure.
    pub async fn find_plan(&self, plan_id: Uuid) -> Result<loan_plans::Model, PlanError> {
        loan_plans::Entity::find_by_id(plan_id)
            .one(&self.db)
            .await?
            .ok_or(PlanError::NotFound(plan_id))
    }

    /// Lists a plan's payments, oldest first (down payment included).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list_payments(&self, plan_id: Uuid) -> Result<Vec<payments::Model>, PlanError> {
        let rows = payments::Entity::find()
            .filter(payments::Column::PlanId.eq(plan_id))
            .order_by_asc(payments::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Builds the progress summary for a plan.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown plan or `Database` on query failure.
    pub async fn plan_summary(&self, plan_id: Uuid) -> Result<PlanSummary, PlanError> {
        let plan = self.find_plan(plan_id).await?;

        let installment_rows = payments::Entity::find()
            .filter(payments::Column::PlanId.eq(plan_id))
            .filter(payments::Column::Status.eq(PaymentStatus::Completed))
            .filter(payments::Column::IsDownPayment.eq(false))
            .all(&self.db)
            .await?;

        let total_paid: Decimal = installment_rows.iter().map(|p| p.amount).sum();
        let term = u32::try_from(plan.term_months).unwrap_or(0);

        let covered: u32 = installment_rows
            .iter()
            .filter_map(|p| (p.amount / plan.monthly_installment).trunc().to_u32())
            .sum();
        let installments_paid = covered.min(term);

        let progress_percent = if term == 0 {
            Decimal::ZERO
        } else {
            quantize_cents(
                Decimal::from(installments_paid) * Decimal::ONE_HUNDRED / Decimal::from(term),
            )
        };

        let remaining_balance = snapshot(&plan).remaining_balance(total_paid);

        Ok(PlanSummary {
            installments_paid,
            installments_remaining: term - installments_paid,
            progress_percent,
            total_paid: quantize_cents(total_paid),
            remaining_balance,
            plan,
        })
    }

    /// Sums completed installment payments for the plan (down payment
    /// excluded).
    async fn installment_total(
        &self,
        txn: &DatabaseTransaction,
        plan_id: Uuid,
    ) -> Result<Decimal, PlanError> {
        let rows = payments::Entity::find()
            .filter(payments::Column::PlanId.eq(plan_id))
            .filter(payments::Column::Status.eq(PaymentStatus::Completed))
            .filter(payments::Column::IsDownPayment.eq(false))
            .all(txn)
            .await?;
        Ok(rows.iter().map(|p| p.amount).sum())
    }

    /// Finds a completed payment by external reference.
    async fn find_completed_by_ref(
        &self,
        reference: &str,
    ) -> Result<Option<payments::Model>, PlanError> {
        let row = payments::Entity::find()
            .filter(payments::Column::ExternalRef.eq(reference))
            .filter(payments::Column::Status.eq(PaymentStatus::Completed))
            .limit(1)
            .one(&self.db)
            .await?;
        Ok(row)
    }

    /// Writes the reconciliation outcome back to the plan row.
    async fn store_outcome(
        &self,
        txn: &DatabaseTransaction,
        plan: loan_plans::Model,
        outcome: &ReconcileOutcome,
    ) -> Result<(), PlanError> {
        let mut active: loan_plans::ActiveModel = plan.into();
        active.status = Set(outcome.status.into());
        active.next_due_date = Set(outcome.next_due_date);
        active.updated_at = Set(Utc::now().into());
        active.update(txn).await?;
        Ok(())
    }
}

/// Projects a plan row into the snapshot reconciliation operates on.
fn snapshot(plan: &loan_plans::Model) -> PlanSnapshot {
    PlanSnapshot {
        status: plan.status.into(),
        start_date: plan.start_date,
        next_due_date: plan.next_due_date,
        monthly_installment: plan.monthly_installment,
        loan_amount: plan.loan_amount,
        total_interest: plan.total_interest,
    }
}
