//! Shared types for the QMT trading gateway.
//!
//! This crate contains:
//! - Order primitives (Side, OrderType, OrderStatus, OrderTicket)
//! - Account and position snapshots returned by read-only queries
//! - Instrument code validation

pub mod types;

pub use types::*;
