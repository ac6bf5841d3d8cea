//! Session registry: account sessions layered over the shared backend link.
//!
//! A session is the unit callers authenticate against. Ids are never
//! reused; a closed session stays in the registry as a tombstone so a
//! second disconnect of the same id is distinguishable from an id that
//! never existed (both report `SessionNotFound`, but the tombstone keeps
//! the history inspectable).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditHandle};
use crate::backend::{AccountHandle, BackendConnector, BackendSdk, Connectivity};
use crate::error::GatewayError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Active,
    Closed,
}

/// Caller-visible snapshot of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub session_id: String,
    pub account_id: String,
    pub state: SessionState,
    /// True when the session holds a live backend account handle.
    pub live: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub degraded_reason: Option<String>,
    pub opened_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
}

struct Session {
    account_id: String,
    state: SessionState,
    /// Present only when the backend link was up and account auth
    /// succeeded at open time. Owned exclusively by this session.
    link: Option<(Arc<dyn BackendSdk>, AccountHandle)>,
    degraded_reason: Option<String>,
    opened_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

impl Session {
    fn info(&self, session_id: &str) -> SessionInfo {
        SessionInfo {
            session_id: session_id.to_string(),
            account_id: self.account_id.clone(),
            state: self.state,
            live: self.link.is_some(),
            degraded_reason: self.degraded_reason.clone(),
            opened_at: self.opened_at,
            closed_at: self.closed_at,
        }
    }
}

pub struct SessionRegistry {
    connector: Arc<BackendConnector>,
    audit: AuditHandle,
    sessions: RwLock<HashMap<String, Session>>,
}

impl SessionRegistry {
    pub fn new(connector: Arc<BackendConnector>, audit: AuditHandle) -> Arc<Self> {
        Arc::new(Self {
            connector,
            audit,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    /// Open a session for `account_id`, establishing the backend link on
    /// first demand. Backend or account-auth failure does not fail the
    /// open: the session comes up degraded and every order through it
    /// will be simulated.
    pub async fn open(
        &self,
        account_id: &str,
        credentials: Option<&str>,
    ) -> Result<SessionInfo, GatewayError> {
        let account_id = account_id.trim();
        if account_id.is_empty() || account_id.contains(char::is_whitespace) {
            return Err(GatewayError::InvalidAccount(format!(
                "account id must be a non-empty token, got {account_id:?}"
            )));
        }

        let (link, degraded_reason) = match self.connector.acquire().await {
            Connectivity::Disabled => (None, None),
            Connectivity::Degraded { reason } => (None, Some(reason)),
            Connectivity::Ready(sdk) => match sdk.connect_account(account_id, credentials).await {
                Ok(handle) => (Some((sdk, handle)), None),
                Err(e) => {
                    warn!(account_id, error = %e, "account auth failed; opening degraded session");
                    // The lease backing this open is not kept.
                    self.connector.release().await;
                    (None, Some(e.to_string()))
                }
            },
        };

        let session_id = format!("sess-{}", Uuid::new_v4());
        let session = Session {
            account_id: account_id.to_string(),
            state: SessionState::Active,
            link,
            degraded_reason,
            opened_at: Utc::now(),
            closed_at: None,
        };
        let info = session.info(&session_id);

        self.sessions.write().insert(session_id.clone(), session);

        self.audit.record(AuditEvent::SessionOpened {
            session_id: session_id.clone(),
            account_id: account_id.to_string(),
            live: info.live,
            degraded_reason: info.degraded_reason.clone(),
        });
        info!(session_id, account_id, live = info.live, "session opened");

        Ok(info)
    }

    /// Close an active session. A second close of the same id is an
    /// error, not a no-op: the caller's view of the session is stale and
    /// it should know.
    pub async fn close(&self, session_id: &str) -> Result<SessionInfo, GatewayError> {
        let (info, link) = {
            let mut sessions = self.sessions.write();
            let session = sessions
                .get_mut(session_id)
                .filter(|s| s.state == SessionState::Active)
                .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?;

            session.state = SessionState::Closed;
            session.closed_at = Some(Utc::now());
            (session.info(session_id), session.link.take())
        };

        if let Some((sdk, handle)) = link {
            sdk.disconnect_account(&handle).await;
            self.connector.release().await;
        }

        self.audit.record(AuditEvent::SessionClosed {
            session_id: session_id.to_string(),
            account_id: info.account_id.clone(),
        });
        info!(session_id, account_id = %info.account_id, "session closed");

        Ok(info)
    }

    /// Snapshot one active session. A closed id is invalid for every
    /// operation, lookups included; the tombstone exists only so the id
    /// can never be reissued.
    pub fn info(&self, session_id: &str) -> Result<SessionInfo, GatewayError> {
        self.sessions
            .read()
            .get(session_id)
            .filter(|s| s.state == SessionState::Active)
            .map(|s| s.info(session_id))
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))
    }

    /// Snapshot every active session.
    pub fn list(&self) -> Vec<SessionInfo> {
        let mut infos: Vec<_> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, s)| s.state == SessionState::Active)
            .map(|(id, s)| s.info(id))
            .collect();
        infos.sort_by(|a, b| a.opened_at.cmp(&b.opened_at));
        infos
    }

    /// Resolve the execution target for an active session: the live SDK
    /// and account handle when present, `None` when the session is
    /// degraded or backend-less. Closed and unknown ids are rejected.
    pub fn execution_target(
        &self,
        session_id: &str,
    ) -> Result<Option<(Arc<dyn BackendSdk>, AccountHandle)>, GatewayError> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(session_id)
            .filter(|s| s.state == SessionState::Active)
            .ok_or_else(|| GatewayError::SessionNotFound(session_id.to_string()))?;
        Ok(session.link.clone())
    }

    /// Close every active session. Used on graceful shutdown.
    pub async fn close_all(&self) {
        let active: Vec<String> = self
            .sessions
            .read()
            .iter()
            .filter(|(_, s)| s.state == SessionState::Active)
            .map(|(id, _)| id.clone())
            .collect();
        for session_id in active {
            if let Err(e) = self.close(&session_id).await {
                warn!(session_id, error = %e, "close during shutdown failed");
            }
        }
    }
}
