//! Repository layer for database operations.
//!
//! Repositories own the transactional workflows: each multi-step write runs
//! inside a single database transaction so partial updates never become
//! visible.

pub mod plan;
pub mod purchase;

pub use plan::{PlanError, PlanRepository};
pub use purchase::{PurchaseError, PurchaseRepository};
