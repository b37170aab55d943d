//! Purchase repository for the atomic buy-or-finance workflow.
//!
//! A purchase is one database transaction: decrement stock, record the
//! payment and the sale, and, for financed purchases, create the loan plan.
//! Any failure rolls the whole unit back so stock and money never diverge.
//! Duplicate external references are caught by the partial unique index on
//! `payments.external_ref` so retried checkout callbacks stay idempotent.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, QueryFilter, QuerySelect, Set, SqlErr, Statement,
    TransactionTrait,
};
use uuid::Uuid;

use vantra_core::finance::{FinanceError, PaymentChannel, compute_schedule, first_due_date};
use vantra_shared::types::quantize_cents;

use crate::entities::{
    customers, loan_plans, payments, sales,
    sea_orm_active_enums::{PaymentMethod, PaymentStatus, PlanStatus},
    vehicle_variants, vehicles,
};

/// Error types for purchase operations.
#[derive(Debug, thiserror::Error)]
pub enum PurchaseError {
    /// Customer not found.
    #[error("Customer not found: {0}")]
    CustomerNotFound(Uuid),

    /// Vehicle not found.
    #[error("Vehicle not found: {0}")]
    VehicleNotFound(Uuid),

    /// Variant not found for the given vehicle.
    #[error("Variant not found: {0}")]
    VariantNotFound(Uuid),

    /// No stock left for the requested vehicle or variant.
    #[error("Out of stock")]
    OutOfStock,

    /// A completed payment with the same external reference already exists.
    /// Callers treat this as success with the existing result.
    #[error("Payment already recorded: {payment_id}")]
    DuplicatePayment {
        /// The previously recorded payment.
        payment_id: Uuid,
    },

    /// Down payment outside the accepted range.
    #[error("Invalid down payment: {0}")]
    InvalidDownPayment(String),

    /// Manual channel named a method the system does not accept.
    #[error("Unknown payment method: {0}")]
    UnknownPaymentMethod(String),

    /// Amortization rejected the loan parameters.
    #[error("Finance error: {0}")]
    Finance(#[from] FinanceError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

/// Financing terms requested by the buyer.
#[derive(Debug, Clone)]
pub struct FinancingTerms {
    /// Up-front payment, settled at purchase time.
    pub down_payment: Decimal,
    /// Annual rate override; falls back to the vehicle's rate, then the
    /// configured default.
    pub annual_rate: Option<Decimal>,
    /// Loan term in months.
    pub term_months: u32,
}

/// Input for executing a purchase.
#[derive(Debug, Clone)]
pub struct CreatePurchaseInput {
    /// Buyer.
    pub customer_id: Uuid,
    /// Vehicle being bought.
    pub vehicle_id: Uuid,
    /// Selected variant, when the vehicle has variants.
    pub variant_id: Option<Uuid>,
    /// How the money arrived.
    pub channel: PaymentChannel,
    /// Present for installment purchases, absent for full-price ones.
    pub financing: Option<FinancingTerms>,
    /// Purchase date; plan origination when financed.
    pub purchase_date: NaiveDate,
    /// Configured default annual rate (percent).
    pub default_annual_rate: Decimal,
    /// Configured down-payment floor (percent of price).
    pub min_down_payment_percent: Decimal,
}

/// Identifiers created by a successful purchase.
#[derive(Debug, Clone)]
pub struct PurchaseReceipt {
    /// The payment recorded (down payment or full price).
    pub payment_id: Uuid,
    /// The sale row.
    pub sale_id: Uuid,
    /// The loan plan, for financed purchases.
    pub plan_id: Option<Uuid>,
    /// Amount settled by this purchase.
    pub amount_paid: Decimal,
}

/// Purchase repository.
#[derive(Debug, Clone)]
pub struct PurchaseRepository {
    db: DatabaseConnection,
}

impl PurchaseRepository {
    /// Creates a new purchase repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Executes a purchase as one database transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the customer, vehicle, or variant does not exist,
    /// the stock is exhausted, the down payment is out of range, the loan
    /// parameters are invalid, or a database operation fails. A replayed
    /// external reference returns `DuplicatePayment` with the payment
    /// already recorded. On error the transaction rolls back and no state
    /// changes.
    pub async fn execute_purchase(
        &self,
        input: CreatePurchaseInput,
    ) -> Result<PurchaseReceipt, PurchaseError> {
        let (method, external_ref) = PaymentMethod::from_channel(&input.channel)
            .ok_or_else(|| match &input.channel {
                PaymentChannel::Manual { method } => {
                    PurchaseError::UnknownPaymentMethod(method.clone())
                }
                PaymentChannel::External { .. } => {
                    PurchaseError::UnknownPaymentMethod("external".to_string())
                }
            })?;

        // Fast path for retried callbacks; the unique index below closes
        // the remaining race.
        if let Some(reference) = external_ref.as_deref() {
            if let Some(existing) = self.find_completed_by_ref(reference).await? {
                return Err(PurchaseError::DuplicatePayment {
                    payment_id: existing.id,
                });
            }
        }

        let txn = self.db.begin().await?;

        customers::Entity::find_by_id(input.customer_id)
            .one(&txn)
            .await?
            .ok_or(PurchaseError::CustomerNotFound(input.customer_id))?;

        let vehicle = vehicles::Entity::find_by_id(input.vehicle_id)
            .one(&txn)
            .await?
            .ok_or(PurchaseError::VehicleNotFound(input.vehicle_id))?;

        if !vehicle.is_available {
            return Err(PurchaseError::OutOfStock);
        }

        self.claim_unit(&txn, &vehicle, input.variant_id).await?;

        let price = vehicle.price;
        let now = Utc::now();

        // Financed purchases get a plan before the payment so the payment
        // row can carry the plan id.
        let plan_id = match &input.financing {
            Some(terms) => Some(
                self.insert_plan(&txn, &input, &vehicle, terms, price)
                    .await?,
            ),
            None => None,
        };

        let amount_paid = input
            .financing
            .as_ref()
            .map_or(price, |terms| terms.down_payment);

        let payment_id = Uuid::new_v4();
        let payment = payments::ActiveModel {
            id: Set(payment_id),
            customer_id: Set(input.customer_id),
            vehicle_id: Set(input.vehicle_id),
            variant_id: Set(input.variant_id),
            plan_id: Set(plan_id),
            amount: Set(amount_paid),
            method: Set(method),
            status: Set(PaymentStatus::Completed),
            external_ref: Set(external_ref.clone()),
            is_down_payment: Set(input.financing.is_some()),
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
                        return Err(PurchaseError::DuplicatePayment {
                            payment_id: existing.id,
                        });
                    }
                }
            }
            return Err(err.into());
        }

        let sale_id = Uuid::new_v4();
        let sale = sales::ActiveModel {
            id: Set(sale_id),
            customer_id: Set(input.customer_id),
            vehicle_id: Set(input.vehicle_id),
            variant_id: Set(input.variant_id),
            sale_price: Set(price),
            sold_at: Set(now.into()),
        };
        sale.insert(&txn).await?;

        self.refresh_availability(&txn, input.vehicle_id).await?;

        txn.commit().await?;

        Ok(PurchaseReceipt {
            payment_id,
            sale_id,
            plan_id,
            amount_paid,
        })
    }

    /// Decrements one unit of stock, guarded against going negative.
    ///
    /// The `stock > 0` predicate makes concurrent last-unit purchases
    /// serialize on the row update: exactly one of them affects a row.
    async fn claim_unit(
        &self,
        txn: &DatabaseTransaction,
        vehicle: &vehicles::Model,
        variant_id: Option<Uuid>,
    ) -> Result<(), PurchaseError> {
        let (sql, id) = match variant_id {
            Some(variant_id) => {
                vehicle_variants::Entity::find_by_id(variant_id)
                    .filter(vehicle_variants::Column::VehicleId.eq(vehicle.id))
                    .one(txn)
                    .await?
                    .ok_or(PurchaseError::VariantNotFound(variant_id))?;
                (
                    "UPDATE vehicle_variants SET stock = stock - 1 WHERE id = $1 AND stock > 0",
                    variant_id,
                )
            }
            None => (
                "UPDATE vehicles SET stock = stock - 1 WHERE id = $1 AND stock > 0",
                vehicle.id,
            ),
        };

        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                sql,
                [id.into()],
            ))
            .await?;

        if result.rows_affected() == 0 {
            return Err(PurchaseError::OutOfStock);
        }
        Ok(())
    }

    /// Computes the schedule and inserts the loan plan.
    async fn insert_plan(
        &self,
        txn: &DatabaseTransaction,
        input: &CreatePurchaseInput,
        vehicle: &vehicles::Model,
        terms: &FinancingTerms,
        price: Decimal,
    ) -> Result<Uuid, PurchaseError> {
        validate_down_payment(price, terms.down_payment, input.min_down_payment_percent)?;

        let annual_rate = resolve_annual_rate(
            terms.annual_rate,
            vehicle.annual_rate_override,
            input.default_annual_rate,
        );
        let loan_amount = quantize_cents(price - terms.down_payment);
        let schedule = compute_schedule(loan_amount, annual_rate, terms.term_months)?;

        let now = Utc::now();
        let plan_id = Uuid::new_v4();
        let plan = loan_plans::ActiveModel {
            id: Set(plan_id),
            customer_id: Set(input.customer_id),
            vehicle_id: Set(input.vehicle_id),
            variant_id: Set(input.variant_id),
            down_payment: Set(quantize_cents(terms.down_payment)),
            loan_amount: Set(loan_amount),
            annual_rate: Set(annual_rate),
            term_months: Set(i32::try_from(terms.term_months).unwrap_or(i32::MAX)),
            monthly_installment: Set(schedule.monthly_installment),
            total_interest: Set(schedule.total_interest),
            total_payable: Set(schedule.total_payable),
            status: Set(PlanStatus::Active),
            start_date: Set(input.purchase_date),
            next_due_date: Set(Some(first_due_date(input.purchase_date))),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        plan.insert(txn).await?;

        Ok(plan_id)
    }

    /// Finds a completed payment by external reference.
    async fn find_completed_by_ref(
        &self,
        reference: &str,
    ) -> Result<Option<payments::Model>, PurchaseError> {
        let row = payments::Entity::find()
            .filter(payments::Column::ExternalRef.eq(reference))
            .filter(payments::Column::Status.eq(PaymentStatus::Completed))
            .limit(1)
            .one(&self.db)
            .await?;
        Ok(row)
    }

    /// Flips `vehicles.is_available` off once aggregate stock hits zero.
    ///
    /// Aggregate stock is the sum of variant stock when variants exist,
    /// otherwise the vehicle's own counter.
    async fn refresh_availability(
        &self,
        txn: &DatabaseTransaction,
        vehicle_id: Uuid,
    ) -> Result<(), PurchaseError> {
        let variants = vehicle_variants::Entity::find()
            .filter(vehicle_variants::Column::VehicleId.eq(vehicle_id))
            .all(txn)
            .await?;

        let remaining: i64 = if variants.is_empty() {
            let vehicle = vehicles::Entity::find_by_id(vehicle_id)
                .one(txn)
                .await?
                .ok_or(PurchaseError::VehicleNotFound(vehicle_id))?;
            i64::from(vehicle.stock)
        } else {
            variants.iter().map(|v| i64::from(v.stock)).sum()
        };

        if remaining == 0 {
            let mut active: vehicles::ActiveModel = vehicles::Entity::find_by_id(vehicle_id)
                .one(txn)
                .await?
                .ok_or(PurchaseError::VehicleNotFound(vehicle_id))?
                .into();
            active.is_available = Set(false);
            active.updated_at = Set(Utc::now().into());
            active.update(txn).await?;
        }
        Ok(())
    }
}

/// Validates the down payment against the price and the configured floor.
///
/// # Errors
///
/// Returns `InvalidDownPayment` when the down payment is not positive,
/// covers the full price, or falls below `min_percent` of the price.
pub fn validate_down_payment(
    price: Decimal,
    down_payment: Decimal,
    min_percent: Decimal,
) -> Result<(), PurchaseError> {
    if down_payment <= Decimal::ZERO {
        return Err(PurchaseError::InvalidDownPayment(
            "down payment must be positive".to_string(),
        ));
    }
    if down_payment >= price {
        return Err(PurchaseError::InvalidDownPayment(
            "down payment must be less than the vehicle price".to_string(),
        ));
    }
    let floor = price * min_percent / Decimal::ONE_HUNDRED;
    if down_payment < floor {
        return Err(PurchaseError::InvalidDownPayment(format!(
            "down payment must be at least {min_percent}% of the price"
        )));
    }
    Ok(())
}

/// Resolves the annual rate: explicit override, then the vehicle's rate,
/// then the configured default.
#[must_use]
pub fn resolve_annual_rate(
    requested: Option<Decimal>,
    vehicle_override: Option<Decimal>,
    default_rate: Decimal,
) -> Decimal {
    requested.or(vehicle_override).unwrap_or(default_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_down_payment_at_floor_accepted() {
        assert!(validate_down_payment(dec!(500000), dec!(50000), dec!(10)).is_ok());
    }

    #[test]
    fn test_down_payment_below_floor_rejected() {
        let result = validate_down_payment(dec!(500000), dec!(49999.99), dec!(10));
        assert!(matches!(result, Err(PurchaseError::InvalidDownPayment(_))));
    }

    #[test]
    fn test_down_payment_must_be_positive() {
        assert!(matches!(
            validate_down_payment(dec!(500000), dec!(0), dec!(10)),
            Err(PurchaseError::InvalidDownPayment(_))
        ));
        assert!(matches!(
            validate_down_payment(dec!(500000), dec!(-100), dec!(10)),
            Err(PurchaseError::InvalidDownPayment(_))
        ));
    }

    #[test]
    fn test_down_payment_covering_price_rejected() {
        assert!(matches!(
            validate_down_payment(dec!(500000), dec!(500000), dec!(10)),
            Err(PurchaseError::InvalidDownPayment(_))
        ));
    }

    #[test]
    fn test_rate_resolution_order() {
        assert_eq!(
            resolve_annual_rate(Some(dec!(7.25)), Some(dec!(9.00)), dec!(8.50)),
            dec!(7.25)
        );
        assert_eq!(
            resolve_annual_rate(None, Some(dec!(9.00)), dec!(8.50)),
            dec!(9.00)
        );
        assert_eq!(resolve_annual_rate(None, None, dec!(8.50)), dec!(8.50));
    }
}
