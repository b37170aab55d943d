//! `SeaORM` Entity for the vehicles table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub brand: String,
    pub model_year: i32,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,
    /// Optional annual rate (%) overriding the configured default.
    #[sea_orm(column_type = "Decimal(Some((5, 2)))", nullable)]
    pub annual_rate_override: Option<Decimal>,
    /// Stock counter used when the vehicle has no variants.
    pub stock: i32,
    pub is_available: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::vehicle_variants::Entity")]
    VehicleVariants,
    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,
    #[sea_orm(has_many = "super::sales::Entity")]
    Sales,
    #[sea_orm(has_many = "super::loan_plans::Entity")]
    LoanPlans,
}

impl Related<super::vehicle_variants::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VehicleVariants.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::sales::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

impl Related<super::loan_plans::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoanPlans.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
