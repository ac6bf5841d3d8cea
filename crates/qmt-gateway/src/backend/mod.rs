//! Backend SDK abstraction and connection management.
//!
//! The gateway talks to the QMT trading terminal exclusively through the
//! `BackendSdk` trait. The trait is the seam that lets tests drive the
//! gateway with a scripted backend and lets the connector bound every
//! establishment attempt without knowing transport details.

pub mod connector;
pub mod native;

use async_trait::async_trait;
use thiserror::Error;

use qmt_common::{AssetSnapshot, OrderTicket, PositionSnapshot};

pub use connector::{BackendConnector, ConnectionStatus, Connectivity};
pub use native::NativeQmtSdk;

/// Errors raised by the backend SDK.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("rejected by backend: {0}")]
    Rejected(String),

    #[error("unknown order: {0}")]
    UnknownOrder(String),
}

/// Opaque handle to one authenticated backend account.
///
/// Issued by `connect_account`, owned exclusively by one session, and
/// returned to the SDK on disconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountHandle {
    pub account_id: String,
    /// SDK-issued token distinguishing re-connections of the same account.
    pub token: u64,
}

/// The backend trading terminal, as consumed by the gateway.
///
/// Every method may block on network I/O and may fail with a
/// backend-specific error. Nothing here retries: retry policy for
/// financial operations belongs to the caller, and for order submission
/// the policy is "never".
#[async_trait]
pub trait BackendSdk: Send + Sync {
    /// Bring up the process-wide link to the terminal.
    async fn establish(&self) -> Result<(), BackendError>;

    /// Tear the process-wide link down.
    async fn shutdown(&self);

    /// Authenticate one trading account over the established link.
    async fn connect_account(
        &self,
        account_id: &str,
        credentials: Option<&str>,
    ) -> Result<AccountHandle, BackendError>;

    /// Release an account handle.
    async fn disconnect_account(&self, handle: &AccountHandle);

    /// Submit an order. Returns the backend-issued order id.
    async fn submit_order(
        &self,
        handle: &AccountHandle,
        ticket: &OrderTicket,
    ) -> Result<String, BackendError>;

    /// Cancel a previously submitted order.
    async fn cancel_order(&self, handle: &AccountHandle, order_id: &str)
        -> Result<(), BackendError>;

    /// Read-only asset query.
    async fn query_asset(&self, handle: &AccountHandle) -> Result<AssetSnapshot, BackendError>;

    /// Read-only position query.
    async fn query_positions(
        &self,
        handle: &AccountHandle,
    ) -> Result<Vec<PositionSnapshot>, BackendError>;
}
