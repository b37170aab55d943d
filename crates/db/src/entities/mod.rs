//! `SeaORM` entity definitions.

pub mod customers;
pub mod loan_plans;
pub mod payments;
pub mod sales;
pub mod sea_orm_active_enums;
pub mod vehicle_variants;
pub mod vehicles;
