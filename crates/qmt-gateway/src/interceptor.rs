//! Order interceptor: the one place that decides real vs. simulated.
//!
//! The decision depends on exactly two inputs: whether the mode policy
//! allows real orders, and whether the session holds a live account
//! handle. Both must hold for an order to reach the backend; in every
//! other combination the order is intercepted and acknowledged with a
//! synthetic id. Nothing downstream re-checks the policy, and nothing
//! here retries: a backend rejection is reported verbatim and a timeout
//! is reported as ambiguous, because resubmitting a possibly-filled
//! order risks a duplicate fill.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};

use qmt_common::{validate_stock_code, OrderStatus, OrderTicket, OrderType};

use crate::audit::{AuditEvent, AuditHandle};
use crate::error::GatewayError;
use crate::session::SessionRegistry;

/// Every simulated order id starts with this prefix, so no downstream
/// consumer can mistake one for a backend-issued id.
pub const SIMULATED_ORDER_PREFIX: &str = "sim-";

/// Simulated order numbering starts well above zero so the ids read as
/// plausible order numbers in logs and dashboards.
const SIMULATED_COUNTER_START: u64 = 1000;

/// How an order was (or would have been) executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionClass {
    /// Submitted to the backend for real.
    Real,
    /// Intercepted before the backend; acknowledged with a synthetic id.
    Simulated,
}

/// Ledger entry for one order that passed through the interceptor.
#[derive(Debug, Clone, Serialize)]
pub struct OrderRecord {
    pub order_id: String,
    pub session_id: String,
    pub account_id: String,
    pub ticket: OrderTicket,
    pub execution_class: ExecutionClass,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// What the caller gets back from a submit.
#[derive(Debug, Clone, Serialize)]
pub struct OrderReceipt {
    pub order_id: String,
    pub execution_class: ExecutionClass,
    pub status: OrderStatus,
}

pub struct OrderInterceptor {
    registry: Arc<SessionRegistry>,
    audit: AuditHandle,
    allows_real_orders: bool,
    order_timeout: Duration,
    sim_counter: AtomicU64,
    ledger: RwLock<HashMap<String, OrderRecord>>,
}

impl OrderInterceptor {
    pub fn new(
        allows_real_orders: bool,
        registry: Arc<SessionRegistry>,
        audit: AuditHandle,
        order_timeout: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            registry,
            audit,
            allows_real_orders,
            order_timeout,
            sim_counter: AtomicU64::new(SIMULATED_COUNTER_START),
            ledger: RwLock::new(HashMap::new()),
        })
    }

    fn validate(ticket: &OrderTicket) -> Result<(), GatewayError> {
        if !validate_stock_code(&ticket.stock_code) {
            return Err(GatewayError::InvalidOrder(format!(
                "invalid stock code: {}",
                ticket.stock_code
            )));
        }
        if ticket.volume == 0 {
            return Err(GatewayError::InvalidOrder("volume must be positive".into()));
        }
        match ticket.order_type {
            OrderType::Limit => match ticket.price {
                Some(p) if p > rust_decimal::Decimal::ZERO => Ok(()),
                _ => Err(GatewayError::InvalidOrder(
                    "limit order requires a positive price".into(),
                )),
            },
            OrderType::Market => Ok(()),
        }
    }

    /// Submit an order through the interlock. The audit record is
    /// appended before the receipt (or error) is returned.
    pub async fn submit(
        &self,
        session_id: &str,
        ticket: OrderTicket,
    ) -> Result<OrderReceipt, GatewayError> {
        Self::validate(&ticket)?;

        let target = self.registry.execution_target(session_id)?;
        let account_id = self.registry.info(session_id)?.account_id;

        let (sdk, handle) = match (self.allows_real_orders, target) {
            (true, Some(target)) => target,
            // Policy forbids real orders, or the session has no live
            // handle. Either way the order is simulated.
            _ => return Ok(self.simulate(session_id, &account_id, ticket)),
        };

        info!(session_id, stock_code = %ticket.stock_code, "submitting real order");
        let outcome =
            tokio::time::timeout(self.order_timeout, sdk.submit_order(&handle, &ticket)).await;

        match outcome {
            Ok(Ok(order_id)) => {
                self.audit.record(AuditEvent::OrderSubmitted {
                    session_id: session_id.to_string(),
                    account_id: account_id.clone(),
                    order_id: order_id.clone(),
                    ticket: ticket.clone(),
                });
                Ok(self.remember(session_id, &account_id, order_id, ticket, ExecutionClass::Real))
            }
            Ok(Err(e)) => {
                warn!(session_id, error = %e, "backend rejected order");
                self.audit.record(AuditEvent::OrderRejected {
                    session_id: session_id.to_string(),
                    account_id,
                    ticket,
                    reason: e.to_string(),
                });
                Err(GatewayError::OrderRejected(e.to_string()))
            }
            Err(_) => {
                let reason = format!(
                    "submit timed out after {}ms; order may have executed",
                    self.order_timeout.as_millis()
                );
                warn!(session_id, %reason, "real order outcome unknown");
                self.audit.record(AuditEvent::OrderAmbiguous {
                    session_id: session_id.to_string(),
                    account_id,
                    ticket,
                    reason: reason.clone(),
                });
                Err(GatewayError::AmbiguousOutcome(reason))
            }
        }
    }

    fn simulate(&self, session_id: &str, account_id: &str, ticket: OrderTicket) -> OrderReceipt {
        let n = self.sim_counter.fetch_add(1, Ordering::SeqCst);
        let order_id = format!("{SIMULATED_ORDER_PREFIX}{n}");
        info!(session_id, order_id, stock_code = %ticket.stock_code, "order intercepted");
        self.audit.record(AuditEvent::OrderIntercepted {
            session_id: session_id.to_string(),
            account_id: account_id.to_string(),
            order_id: order_id.clone(),
            ticket: ticket.clone(),
        });
        self.remember(session_id, account_id, order_id, ticket, ExecutionClass::Simulated)
    }

    fn remember(
        &self,
        session_id: &str,
        account_id: &str,
        order_id: String,
        ticket: OrderTicket,
        execution_class: ExecutionClass,
    ) -> OrderReceipt {
        let record = OrderRecord {
            order_id: order_id.clone(),
            session_id: session_id.to_string(),
            account_id: account_id.to_string(),
            ticket,
            execution_class,
            status: OrderStatus::Submitted,
            created_at: Utc::now(),
        };
        self.ledger.write().insert(order_id.clone(), record);
        OrderReceipt {
            order_id,
            execution_class,
            status: OrderStatus::Submitted,
        }
    }

    /// Cancel an order previously accepted through this gateway.
    /// Cancelling an already-cancelled simulated order succeeds (cancel
    /// is idempotent on our own ledger); cancelling an id the gateway
    /// never issued is an invalid-order error.
    pub async fn cancel(&self, session_id: &str, order_id: &str) -> Result<OrderReceipt, GatewayError> {
        // Session must exist and be active even for simulated cancels.
        let target = self.registry.execution_target(session_id)?;

        let record = self
            .ledger
            .read()
            .get(order_id)
            .cloned()
            .ok_or_else(|| GatewayError::InvalidOrder(format!("unknown order id: {order_id}")))?;

        if record.session_id != session_id {
            return Err(GatewayError::InvalidOrder(format!(
                "order {order_id} does not belong to session {session_id}"
            )));
        }

        match record.execution_class {
            ExecutionClass::Simulated => {
                self.mark_cancelled(order_id);
                self.audit.record(AuditEvent::OrderCancelled {
                    session_id: session_id.to_string(),
                    order_id: order_id.to_string(),
                    execution_class: ExecutionClass::Simulated,
                });
                Ok(OrderReceipt {
                    order_id: order_id.to_string(),
                    execution_class: ExecutionClass::Simulated,
                    status: OrderStatus::Cancelled,
                })
            }
            ExecutionClass::Real => {
                let (sdk, handle) = target.ok_or_else(|| {
                    GatewayError::Connection(
                        "session lost its backend handle; cannot cancel a real order".into(),
                    )
                })?;

                let outcome =
                    tokio::time::timeout(self.order_timeout, sdk.cancel_order(&handle, order_id))
                        .await;
                match outcome {
                    Ok(Ok(())) => {
                        self.mark_cancelled(order_id);
                        self.audit.record(AuditEvent::OrderCancelled {
                            session_id: session_id.to_string(),
                            order_id: order_id.to_string(),
                            execution_class: ExecutionClass::Real,
                        });
                        Ok(OrderReceipt {
                            order_id: order_id.to_string(),
                            execution_class: ExecutionClass::Real,
                            status: OrderStatus::Cancelled,
                        })
                    }
                    Ok(Err(e)) => {
                        self.audit.record(AuditEvent::CancelRejected {
                            session_id: session_id.to_string(),
                            order_id: order_id.to_string(),
                            reason: e.to_string(),
                        });
                        Err(GatewayError::OrderRejected(e.to_string()))
                    }
                    Err(_) => {
                        let reason = format!(
                            "cancel timed out after {}ms; order state unknown",
                            self.order_timeout.as_millis()
                        );
                        self.audit.record(AuditEvent::CancelAmbiguous {
                            session_id: session_id.to_string(),
                            order_id: order_id.to_string(),
                            reason: reason.clone(),
                        });
                        Err(GatewayError::AmbiguousOutcome(reason))
                    }
                }
            }
        }
    }

    fn mark_cancelled(&self, order_id: &str) {
        if let Some(record) = self.ledger.write().get_mut(order_id) {
            record.status = OrderStatus::Cancelled;
        }
    }

    /// Ledger entries for one session, oldest first.
    pub fn orders(&self, session_id: &str) -> Result<Vec<OrderRecord>, GatewayError> {
        // Resolves the session so unknown ids are rejected consistently.
        self.registry.info(session_id)?;
        let mut records: Vec<_> = self
            .ledger
            .read()
            .values()
            .filter(|r| r.session_id == session_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.order_id.cmp(&b.order_id)));
        Ok(records)
    }

    pub fn order(&self, order_id: &str) -> Option<OrderRecord> {
        self.ledger.read().get(order_id).cloned()
    }
}
