//! Lazily-established, process-wide backend connection.
//!
//! The connector owns the single link to the trading terminal. The link is
//! brought up on first demand, never at startup, and at most one
//! establishment attempt runs at a time: concurrent callers queue on the
//! state mutex and observe the outcome of the attempt already in flight.
//!
//! A failed attempt is sticky. The gateway degrades to simulated behavior
//! for the rest of the process lifetime rather than hammering a backend
//! that already refused us; the failure is recorded in the audit trail
//! exactly once.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::audit::{AuditEvent, AuditHandle};
use crate::policy::ModePolicy;

use super::BackendSdk;

/// Coarse connection state, readable without awaiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Unestablished,
    Connecting,
    Ready,
    Failed,
}

/// Outcome of an acquire: what the caller may do with the backend.
pub enum Connectivity {
    /// Mode policy does not require a backend; no I/O was attempted.
    Disabled,
    /// Link is up; the SDK may be used for account and order calls.
    Ready(Arc<dyn BackendSdk>),
    /// Establishment failed; callers fall back to simulated behavior.
    Degraded { reason: String },
}

enum ConnState {
    Unestablished,
    Ready,
    Failed(String),
}

pub struct BackendConnector {
    policy: ModePolicy,
    sdk: Arc<dyn BackendSdk>,
    establish_timeout: Duration,
    audit: AuditHandle,
    // Held across the establishment attempt so only one runs at a time.
    state: tokio::sync::Mutex<ConnState>,
    status: parking_lot::Mutex<ConnectionStatus>,
    failure_audited: AtomicBool,
    leases: AtomicUsize,
}

impl BackendConnector {
    pub fn new(
        policy: ModePolicy,
        sdk: Arc<dyn BackendSdk>,
        establish_timeout: Duration,
        audit: AuditHandle,
    ) -> Arc<Self> {
        Arc::new(Self {
            policy,
            sdk,
            establish_timeout,
            audit,
            state: tokio::sync::Mutex::new(ConnState::Unestablished),
            status: parking_lot::Mutex::new(ConnectionStatus::Unestablished),
            failure_audited: AtomicBool::new(false),
            leases: AtomicUsize::new(0),
        })
    }

    /// Acquire the backend link, establishing it if this is the first
    /// caller. `Ready` leases must be paired with a later `release`.
    pub async fn acquire(&self) -> Connectivity {
        if !self.policy.requires_backend() {
            return Connectivity::Disabled;
        }

        let mut state = self.state.lock().await;
        match &*state {
            ConnState::Ready => {
                self.leases.fetch_add(1, Ordering::SeqCst);
                return Connectivity::Ready(self.sdk.clone());
            }
            ConnState::Failed(reason) => {
                return Connectivity::Degraded {
                    reason: reason.clone(),
                };
            }
            ConnState::Unestablished => {}
        }

        *self.status.lock() = ConnectionStatus::Connecting;
        info!(timeout_ms = self.establish_timeout.as_millis() as u64, "establishing backend link");

        let outcome = tokio::time::timeout(self.establish_timeout, self.sdk.establish()).await;
        match outcome {
            Ok(Ok(())) => {
                *state = ConnState::Ready;
                *self.status.lock() = ConnectionStatus::Ready;
                self.leases.fetch_add(1, Ordering::SeqCst);
                info!("backend link established");
                Connectivity::Ready(self.sdk.clone())
            }
            Ok(Err(e)) => self.fail(&mut state, e.to_string()),
            Err(_) => self.fail(
                &mut state,
                format!(
                    "establishment timed out after {}ms",
                    self.establish_timeout.as_millis()
                ),
            ),
        }
    }

    fn fail(&self, state: &mut ConnState, reason: String) -> Connectivity {
        warn!(%reason, "backend establishment failed; degrading to simulated behavior");
        *state = ConnState::Failed(reason.clone());
        *self.status.lock() = ConnectionStatus::Failed;
        if !self.failure_audited.swap(true, Ordering::SeqCst) {
            self.audit.record(AuditEvent::ConnectorFailed {
                reason: reason.clone(),
            });
        }
        Connectivity::Degraded { reason }
    }

    /// Return a `Ready` lease. When the last lease is returned the link is
    /// torn down; a later acquire establishes it again from scratch.
    pub async fn release(&self) {
        let prev = self.leases.fetch_sub(1, Ordering::SeqCst);
        debug_assert!(prev > 0, "release without matching acquire");
        if prev != 1 {
            return;
        }

        let mut state = self.state.lock().await;
        // Re-check under the lock: a new lease may have raced in.
        if self.leases.load(Ordering::SeqCst) > 0 {
            return;
        }
        if matches!(*state, ConnState::Ready) {
            info!("last lease released; shutting backend link down");
            self.sdk.shutdown().await;
            *state = ConnState::Unestablished;
            *self.status.lock() = ConnectionStatus::Unestablished;
        }
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    #[cfg(test)]
    pub(crate) fn lease_count(&self) -> usize {
        self.leases.load(Ordering::SeqCst)
    }
}
