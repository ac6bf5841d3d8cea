//! Session gateway in front of the QMT trading terminal.
//!
//! The gateway fronts one backend trading terminal with two equivalent
//! protocol surfaces (REST and line-delimited JSON RPC) and enforces a
//! single process-wide safety interlock: an order reaches the real
//! backend only when the configured operating mode allows real orders
//! AND the session holds a live account handle. Everything else is
//! simulated, acknowledged with a `sim-` prefixed id, and audited.

pub mod adapters;
pub mod audit;
pub mod backend;
pub mod config;
pub mod error;
pub mod gateway;
pub mod interceptor;
pub mod policy;
pub mod session;

pub use error::GatewayError;
pub use gateway::Gateway;
pub use policy::{ModePolicy, OperatingMode};
