//! Core financing logic for Vantra.
//!
//! This crate contains pure business logic with ZERO web or database
//! dependencies. All domain types, validation rules, and calculations live
//! here.
//!
//! # Modules
//!
//! - `finance` - Amortization, due-date scheduling, loan plan lifecycle,
//!   and payment reconciliation

pub mod finance;
