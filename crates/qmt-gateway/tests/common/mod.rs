//! Shared test fixtures: a scripted backend SDK driving the whole stack.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal_macros::dec;

use qmt_gateway::backend::{AccountHandle, BackendError, BackendSdk};
use qmt_gateway::config::GatewayConfig;
use qmt_gateway::{Gateway, OperatingMode};
use qmt_common::{AssetSnapshot, OrderTicket, PositionSnapshot};

/// How the scripted backend behaves on establish and submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Script {
    /// Everything succeeds.
    Healthy,
    /// Establishment hangs forever; the connector must time out.
    HangingEstablish,
    /// Establishment succeeds but every submit is rejected.
    RejectingOrders,
}

pub struct ScriptedSdk {
    script: Script,
    pub establish_calls: AtomicU64,
    pub submit_calls: AtomicU64,
    next_order: AtomicU64,
    next_token: AtomicU64,
}

impl ScriptedSdk {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            establish_calls: AtomicU64::new(0),
            submit_calls: AtomicU64::new(0),
            next_order: AtomicU64::new(1),
            next_token: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl BackendSdk for ScriptedSdk {
    async fn establish(&self) -> Result<(), BackendError> {
        self.establish_calls.fetch_add(1, Ordering::SeqCst);
        match self.script {
            Script::HangingEstablish => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            _ => Ok(()),
        }
    }

    async fn shutdown(&self) {}

    async fn connect_account(
        &self,
        account_id: &str,
        _credentials: Option<&str>,
    ) -> Result<AccountHandle, BackendError> {
        Ok(AccountHandle {
            account_id: account_id.to_string(),
            token: self.next_token.fetch_add(1, Ordering::SeqCst),
        })
    }

    async fn disconnect_account(&self, _handle: &AccountHandle) {}

    async fn submit_order(
        &self,
        _handle: &AccountHandle,
        _ticket: &OrderTicket,
    ) -> Result<String, BackendError> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        if self.script == Script::RejectingOrders {
            return Err(BackendError::Rejected("insufficient funds".into()));
        }
        Ok(format!("qmt-{}", self.next_order.fetch_add(1, Ordering::SeqCst)))
    }

    async fn cancel_order(
        &self,
        _handle: &AccountHandle,
        _order_id: &str,
    ) -> Result<(), BackendError> {
        Ok(())
    }

    async fn query_asset(&self, _handle: &AccountHandle) -> Result<AssetSnapshot, BackendError> {
        Ok(AssetSnapshot {
            total_asset: dec!(500000),
            market_value: dec!(200000),
            cash: dec!(280000),
            frozen_cash: dec!(20000),
        })
    }

    async fn query_positions(
        &self,
        _handle: &AccountHandle,
    ) -> Result<Vec<PositionSnapshot>, BackendError> {
        Ok(vec![PositionSnapshot {
            stock_code: "000001.SZ".into(),
            volume: 2000,
            available_volume: 1000,
            cost_price: dec!(12.80),
            market_price: dec!(13.20),
        }])
    }
}

/// Build a gateway with short timeouts suitable for tests.
pub fn gateway(mode: OperatingMode, sdk: Arc<ScriptedSdk>) -> Arc<Gateway> {
    let mut config = GatewayConfig::default();
    config.mode = mode;
    config.backend.establish_timeout_ms = 100;
    config.backend.order_timeout_ms = 100;
    Gateway::new(&config, sdk)
}
