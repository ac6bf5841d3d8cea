//! Error taxonomy for the gateway.
//!
//! Every operation exposed to the protocol adapters returns
//! `Result<_, GatewayError>`. Backend/connection failures are absorbed into
//! degraded behavior at the connector boundary; everything that reaches a
//! caller is one of these variants, mapped to a transport shape by the
//! adapter that received the request.

use thiserror::Error;

/// Errors surfaced by gateway operations.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Invalid or missing configuration. Fatal at startup, never at runtime.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Backend unreachable or failed mid-operation. Most paths degrade to
    /// simulated behavior instead; this surfaces only where a live handle
    /// is mandatory, such as cancelling a real order.
    #[error("Backend connection error: {0}")]
    Connection(String),

    /// Unknown or already-closed session id.
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// Caller-supplied account id failed validation.
    #[error("Invalid account: {0}")]
    InvalidAccount(String),

    /// Caller-supplied order failed validation.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The backend declined an order or cancel. Reported verbatim, never
    /// retried.
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// A real-money call timed out mid-flight. The order may or may not
    /// have executed; resubmitting risks a duplicate fill.
    #[error("Order outcome unknown: {0}")]
    AmbiguousOutcome(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Stable machine-readable code for transport error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::Config(_) => "CONFIGURATION_ERROR",
            GatewayError::Connection(_) => "CONNECTION_ERROR",
            GatewayError::SessionNotFound(_) => "SESSION_NOT_FOUND",
            GatewayError::InvalidAccount(_) => "INVALID_ACCOUNT",
            GatewayError::InvalidOrder(_) => "INVALID_ORDER",
            GatewayError::OrderRejected(_) => "ORDER_REJECTED",
            GatewayError::AmbiguousOutcome(_) => "AMBIGUOUS_OUTCOME",
            GatewayError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// True for errors caused by the caller's input (bad session, bad
    /// order), as opposed to backend or gateway failures.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            GatewayError::SessionNotFound(_)
                | GatewayError::InvalidAccount(_)
                | GatewayError::InvalidOrder(_)
        )
    }
}
