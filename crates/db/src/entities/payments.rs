//! `SeaORM` Entity for the payments table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{PaymentMethod, PaymentStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_id: Uuid,
    pub vehicle_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub plan_id: Option<Uuid>,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub amount: Decimal,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Idempotency key for payments originating from an external processor.
    pub external_ref: Option<String>,
    pub is_down_payment: bool,
    pub paid_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customers::Entity",
        from = "Column::CustomerId",
        to = "super::customers::Column::Id"
    )]
    Customers,
    #[sea_orm(
        belongs_to = "super::loan_plans::Entity",
        from = "Column::PlanId",
        to = "super::loan_plans::Column::Id"
    )]
    LoanPlans,
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

impl Related<super::loan_plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoanPlans.def()
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
