//! Initial database migration.
//!
//! Creates the enums, the catalog tables (vehicles, variants, customers),
//! and the financing tables (loan plans, payments, sales).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(ENUMS_SQL).await?;

        db.execute_unprepared(CUSTOMERS_SQL).await?;
        db.execute_unprepared(VEHICLES_SQL).await?;
        db.execute_unprepared(VEHICLE_VARIANTS_SQL).await?;

        db.execute_unprepared(LOAN_PLANS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;
        db.execute_unprepared(SALES_SQL).await?;

        db.execute_unprepared(INDEXES_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
-- Loan plan lifecycle
CREATE TYPE plan_status AS ENUM (
    'active',
    'completed',
    'closed',
    'defaulted'
);

-- Payment methods; 'checkout' is reserved for the external channel
CREATE TYPE payment_method AS ENUM (
    'cash',
    'card',
    'netbanking',
    'cheque',
    'checkout'
);

CREATE TYPE payment_status AS ENUM (
    'pending',
    'completed',
    'failed'
);
";

const CUSTOMERS_SQL: &str = r"
CREATE TABLE customers (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    email VARCHAR(255) NOT NULL UNIQUE,
    phone VARCHAR(32) NOT NULL,
    address TEXT NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const VEHICLES_SQL: &str = r"
CREATE TABLE vehicles (
    id UUID PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    brand VARCHAR(255) NOT NULL,
    model_year INTEGER NOT NULL,
    price DECIMAL(12, 2) NOT NULL CHECK (price > 0),
    annual_rate_override DECIMAL(5, 2) CHECK (annual_rate_override >= 0),
    stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    is_available BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const VEHICLE_VARIANTS_SQL: &str = r"
CREATE TABLE vehicle_variants (
    id UUID PRIMARY KEY,
    vehicle_id UUID NOT NULL REFERENCES vehicles(id) ON DELETE CASCADE,
    name VARCHAR(255) NOT NULL,
    stock INTEGER NOT NULL DEFAULT 0 CHECK (stock >= 0),
    is_available BOOLEAN NOT NULL DEFAULT TRUE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    UNIQUE (vehicle_id, name)
);
";

const LOAN_PLANS_SQL: &str = r"
CREATE TABLE loan_plans (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    vehicle_id UUID NOT NULL REFERENCES vehicles(id),
    variant_id UUID REFERENCES vehicle_variants(id),
    down_payment DECIMAL(12, 2) NOT NULL CHECK (down_payment > 0),
    loan_amount DECIMAL(12, 2) NOT NULL CHECK (loan_amount > 0),
    annual_rate DECIMAL(5, 2) NOT NULL CHECK (annual_rate >= 0),
    term_months INTEGER NOT NULL CHECK (term_months > 0),
    monthly_installment DECIMAL(12, 2) NOT NULL,
    total_interest DECIMAL(12, 2) NOT NULL,
    total_payable DECIMAL(12, 2) NOT NULL,
    status plan_status NOT NULL DEFAULT 'active',
    start_date DATE NOT NULL,
    next_due_date DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    vehicle_id UUID NOT NULL REFERENCES vehicles(id),
    variant_id UUID REFERENCES vehicle_variants(id),
    plan_id UUID REFERENCES loan_plans(id),
    amount DECIMAL(12, 2) NOT NULL CHECK (amount > 0),
    method payment_method NOT NULL,
    status payment_status NOT NULL DEFAULT 'pending',
    external_ref VARCHAR(255),
    is_down_payment BOOLEAN NOT NULL DEFAULT FALSE,
    paid_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

-- Idempotency for retried checkout callbacks
CREATE UNIQUE INDEX idx_payments_external_ref
    ON payments(external_ref)
    WHERE external_ref IS NOT NULL;
";

const SALES_SQL: &str = r"
CREATE TABLE sales (
    id UUID PRIMARY KEY,
    customer_id UUID NOT NULL REFERENCES customers(id),
    vehicle_id UUID NOT NULL REFERENCES vehicles(id),
    variant_id UUID REFERENCES vehicle_variants(id),
    sale_price DECIMAL(12, 2) NOT NULL CHECK (sale_price > 0),
    sold_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
);
";

const INDEXES_SQL: &str = r"
CREATE INDEX idx_vehicle_variants_vehicle ON vehicle_variants(vehicle_id);
CREATE INDEX idx_loan_plans_customer ON loan_plans(customer_id);
CREATE INDEX idx_loan_plans_status ON loan_plans(status);
CREATE INDEX idx_payments_customer ON payments(customer_id);
CREATE INDEX idx_payments_plan ON payments(plan_id);
CREATE INDEX idx_sales_customer ON sales(customer_id);
CREATE INDEX idx_sales_vehicle ON sales(vehicle_id);
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS sales;
DROP TABLE IF EXISTS payments;
DROP TABLE IF EXISTS loan_plans;
DROP TABLE IF EXISTS vehicle_variants;
DROP TABLE IF EXISTS vehicles;
DROP TABLE IF EXISTS customers;
DROP TYPE IF EXISTS payment_status;
DROP TYPE IF EXISTS payment_method;
DROP TYPE IF EXISTS plan_status;
";
