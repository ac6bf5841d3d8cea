//! Native QMT terminal binding.
//!
//! The terminal only exposes its order API through a vendor IPC channel
//! that is not available on every deployment target. This binding probes
//! terminal reachability over TCP so connection handling, mode policy and
//! degraded fallback are exercised end to end; the trading calls
//! themselves report the backend as unreachable until the vendor channel
//! is wired in.
//!
//! TODO: replace the per-call `Unreachable` stubs with the vendor IPC
//! calls once the channel library ships for linux builds.

use async_trait::async_trait;
use tokio::net::TcpStream;
use tracing::{debug, info};

use qmt_common::{AssetSnapshot, OrderTicket, PositionSnapshot};

use super::{AccountHandle, BackendError, BackendSdk};

pub struct NativeQmtSdk {
    endpoint: String,
}

impl NativeQmtSdk {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    fn unavailable(&self, op: &str) -> BackendError {
        BackendError::Unreachable(format!(
            "{op}: vendor channel to {} not available in this build",
            self.endpoint
        ))
    }
}

#[async_trait]
impl BackendSdk for NativeQmtSdk {
    async fn establish(&self) -> Result<(), BackendError> {
        debug!(endpoint = %self.endpoint, "probing terminal");
        TcpStream::connect(&self.endpoint)
            .await
            .map_err(|e| BackendError::Unreachable(format!("{}: {e}", self.endpoint)))?;
        info!(endpoint = %self.endpoint, "terminal reachable");
        Ok(())
    }

    async fn shutdown(&self) {
        debug!(endpoint = %self.endpoint, "terminal link closed");
    }

    async fn connect_account(
        &self,
        _account_id: &str,
        _credentials: Option<&str>,
    ) -> Result<AccountHandle, BackendError> {
        Err(self.unavailable("connect_account"))
    }

    async fn disconnect_account(&self, _handle: &AccountHandle) {}

    async fn submit_order(
        &self,
        _handle: &AccountHandle,
        _ticket: &OrderTicket,
    ) -> Result<String, BackendError> {
        Err(self.unavailable("submit_order"))
    }

    async fn cancel_order(
        &self,
        _handle: &AccountHandle,
        _order_id: &str,
    ) -> Result<(), BackendError> {
        Err(self.unavailable("cancel_order"))
    }

    async fn query_asset(&self, _handle: &AccountHandle) -> Result<AssetSnapshot, BackendError> {
        Err(self.unavailable("query_asset"))
    }

    async fn query_positions(
        &self,
        _handle: &AccountHandle,
    ) -> Result<Vec<PositionSnapshot>, BackendError> {
        Err(self.unavailable("query_positions"))
    }
}
