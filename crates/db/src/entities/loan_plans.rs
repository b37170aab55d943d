//! `SeaORM` Entity for the loan_plans table.
//!
//! A plan snapshots the amortization terms at purchase time; installment
//! payments reference their plan through `payments.plan_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::PlanStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "loan_plans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub variant_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub down_payment: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub loan_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub annual_rate: Decimal,
    pub term_months: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub monthly_installment: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_interest: Decimal,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub total_payable: Decimal,
    pub status: PlanStatus,
    pub start_date: Date,
    pub next_due_date: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customers,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
    #[sea_orm(
        belongs_to = "super::vehicle_variants::Entity",
        from = "Column::VariantId",
        to = "super::vehicle_variants::Column::Id"
    )]
    VehicleVariants,
    #[sea_orm(
        belongs_to = "super::vehicles::Entity",
        from = "Column::VehicleId",
        to = "super::vehicles::Column::Id"
    )]
    Vehicles,
}

impl Related<super::customers::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customers.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::vehicle_variants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VehicleVariants.def()
    }
}

impl Related<super::vehicles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
