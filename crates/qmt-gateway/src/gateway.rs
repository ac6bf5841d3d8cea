//! The gateway core: one object both protocol adapters call into.
//!
//! Every externally visible operation lives here, so REST and RPC are
//! thin translations over the same code paths and necessarily have the
//! same side effects.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

use qmt_common::{AssetSnapshot, OrderTicket, PositionSnapshot};

use crate::audit::{AuditHandle, AuditLog, AuditRecord};
use crate::backend::{BackendConnector, BackendSdk, ConnectionStatus};
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::interceptor::{OrderInterceptor, OrderReceipt, OrderRecord};
use crate::policy::{ModePolicy, OperatingMode};
use crate::session::{SessionInfo, SessionRegistry};

/// Gateway-wide status, served on the health surface of both adapters.
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStatus {
    pub mode: OperatingMode,
    pub allows_real_orders: bool,
    pub connection: ConnectionStatus,
    pub active_sessions: usize,
    pub audit_records: u64,
}

pub struct Gateway {
    policy: ModePolicy,
    connector: Arc<BackendConnector>,
    registry: Arc<SessionRegistry>,
    interceptor: Arc<OrderInterceptor>,
    audit: AuditHandle,
}

impl Gateway {
    /// Wire the gateway up from config and a backend SDK. The SDK is
    /// injected so tests can drive the whole stack with a scripted one.
    pub fn new(config: &GatewayConfig, sdk: Arc<dyn BackendSdk>) -> Arc<Self> {
        let policy = ModePolicy::new(config.mode);
        let audit = AuditLog::new(config.audit.capacity);
        let connector =
            BackendConnector::new(policy, sdk, config.establish_timeout(), audit.clone());
        let registry = SessionRegistry::new(connector.clone(), audit.clone());
        let interceptor = OrderInterceptor::new(
            policy.allows_real_orders(),
            registry.clone(),
            audit.clone(),
            config.order_timeout(),
        );

        info!(
            mode = %config.mode,
            allows_real_orders = policy.allows_real_orders(),
            "gateway initialized"
        );

        Arc::new(Self {
            policy,
            connector,
            registry,
            interceptor,
            audit,
        })
    }

    pub fn status(&self) -> GatewayStatus {
        let active_sessions = self.registry.list().len();
        GatewayStatus {
            mode: self.policy.mode(),
            allows_real_orders: self.policy.allows_real_orders(),
            connection: self.connector.status(),
            active_sessions,
            audit_records: self.audit.total_recorded(),
        }
    }

    pub async fn open_session(
        &self,
        account_id: &str,
        credentials: Option<&str>,
    ) -> Result<SessionInfo, GatewayError> {
        self.registry.open(account_id, credentials).await
    }

    pub async fn close_session(&self, session_id: &str) -> Result<SessionInfo, GatewayError> {
        self.registry.close(session_id).await
    }

    pub fn session(&self, session_id: &str) -> Result<SessionInfo, GatewayError> {
        self.registry.info(session_id)
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        self.registry.list()
    }

    pub async fn submit_order(
        &self,
        session_id: &str,
        ticket: OrderTicket,
    ) -> Result<OrderReceipt, GatewayError> {
        self.interceptor.submit(session_id, ticket).await
    }

    pub async fn cancel_order(
        &self,
        session_id: &str,
        order_id: &str,
    ) -> Result<OrderReceipt, GatewayError> {
        self.interceptor.cancel(session_id, order_id).await
    }

    pub fn orders(&self, session_id: &str) -> Result<Vec<OrderRecord>, GatewayError> {
        self.interceptor.orders(session_id)
    }

    /// Account asset query. Sessions without a live handle get a fixed
    /// simulated snapshot so read paths stay usable in disabled and
    /// degraded operation.
    pub async fn query_asset(&self, session_id: &str) -> Result<AssetSnapshot, GatewayError> {
        match self.registry.execution_target(session_id)? {
            Some((sdk, handle)) => sdk
                .query_asset(&handle)
                .await
                .map_err(|e| GatewayError::Connection(e.to_string())),
            None => Ok(simulated_asset()),
        }
    }

    /// Account position query; same fallback rule as `query_asset`.
    pub async fn query_positions(
        &self,
        session_id: &str,
    ) -> Result<Vec<PositionSnapshot>, GatewayError> {
        match self.registry.execution_target(session_id)? {
            Some((sdk, handle)) => sdk
                .query_positions(&handle)
                .await
                .map_err(|e| GatewayError::Connection(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    /// Most recent audit records, newest last.
    pub fn audit_tail(&self, limit: usize) -> Vec<AuditRecord> {
        let records = self.audit.records();
        let skip = records.len().saturating_sub(limit);
        records.into_iter().skip(skip).collect()
    }

    pub fn audit(&self) -> &AuditHandle {
        &self.audit
    }

    /// Close all sessions and tear the backend link down.
    pub async fn shutdown(&self) {
        info!("gateway shutting down");
        self.registry.close_all().await;
    }
}

/// Snapshot reported for sessions with no backend handle. The figures are
/// intentionally round so they cannot be mistaken for a real account.
fn simulated_asset() -> AssetSnapshot {
    AssetSnapshot {
        total_asset: Decimal::new(1_000_000, 0),
        market_value: Decimal::ZERO,
        cash: Decimal::new(1_000_000, 0),
        frozen_cash: Decimal::ZERO,
    }
}
