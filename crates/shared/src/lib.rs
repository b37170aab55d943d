//! Shared types and configuration for Vantra.
//!
//! This crate provides common types used across all other crates:
//! - Money quantization helpers with decimal precision
//! - Typed IDs for type-safe entity references
//! - Configuration management

pub mod config;
pub mod types;

pub use config::{AppConfig, FinanceConfig};
