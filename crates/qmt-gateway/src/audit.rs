//! Audit trail for every order decision the gateway makes.
//!
//! Each record carries a monotonically increasing sequence number. Records
//! are appended to a bounded in-memory ring and published on a broadcast
//! channel for external log consumers. Appending happens synchronously,
//! before the operation's response is released, so an operator can always
//! reconstruct what was (or would have been) submitted.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use qmt_common::OrderTicket;

use crate::interceptor::ExecutionClass;

/// Default ring capacity.
pub const DEFAULT_AUDIT_CAPACITY: usize = 4096;

/// One auditable event.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    SessionOpened {
        session_id: String,
        account_id: String,
        live: bool,
        degraded_reason: Option<String>,
    },
    SessionClosed {
        session_id: String,
        account_id: String,
    },
    /// Backend establishment failed. Recorded exactly once per failure.
    ConnectorFailed {
        reason: String,
    },
    /// A real order reached the backend.
    OrderSubmitted {
        session_id: String,
        account_id: String,
        order_id: String,
        ticket: OrderTicket,
    },
    /// An order was intercepted and simulated instead of reaching the
    /// backend. Carries the full ticket so the intended order can be
    /// reconstructed.
    OrderIntercepted {
        session_id: String,
        account_id: String,
        order_id: String,
        ticket: OrderTicket,
    },
    OrderRejected {
        session_id: String,
        account_id: String,
        ticket: OrderTicket,
        reason: String,
    },
    /// A real order call timed out mid-flight; outcome unknown.
    OrderAmbiguous {
        session_id: String,
        account_id: String,
        ticket: OrderTicket,
        reason: String,
    },
    OrderCancelled {
        session_id: String,
        order_id: String,
        execution_class: ExecutionClass,
    },
    CancelRejected {
        session_id: String,
        order_id: String,
        reason: String,
    },
    CancelAmbiguous {
        session_id: String,
        order_id: String,
        reason: String,
    },
}

/// A sequenced, timestamped audit record.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: AuditEvent,
}

/// In-process audit log.
pub struct AuditLog {
    next_sequence: AtomicU64,
    ring: Mutex<VecDeque<AuditRecord>>,
    capacity: usize,
    tx: broadcast::Sender<AuditRecord>,
}

/// Shared audit log handle.
pub type AuditHandle = Arc<AuditLog>;

impl AuditLog {
    pub fn new(capacity: usize) -> AuditHandle {
        let (tx, _) = broadcast::channel(capacity.max(16));
        Arc::new(Self {
            next_sequence: AtomicU64::new(1),
            ring: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            tx,
        })
    }

    /// Append an event. Returns the assigned sequence number.
    pub fn record(&self, event: AuditEvent) -> u64 {
        let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
        let record = AuditRecord {
            sequence,
            timestamp: Utc::now(),
            event,
        };

        info!(sequence, event = ?record.event, "audit");

        {
            let mut ring = self.ring.lock();
            if ring.len() == self.capacity {
                ring.pop_front();
            }
            ring.push_back(record.clone());
        }

        // Broadcast is best-effort; the ring is the source of truth.
        let _ = self.tx.send(record);

        sequence
    }

    /// Subscribe to the live audit stream.
    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecord> {
        self.tx.subscribe()
    }

    /// Snapshot of retained records, oldest first.
    pub fn records(&self) -> Vec<AuditRecord> {
        self.ring.lock().iter().cloned().collect()
    }

    /// Number of records appended over the process lifetime.
    pub fn total_recorded(&self) -> u64 {
        self.next_sequence.load(Ordering::Relaxed) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed(session: &str) -> AuditEvent {
        AuditEvent::SessionClosed {
            session_id: session.to_string(),
            account_id: "A1".to_string(),
        }
    }

    #[test]
    fn test_sequences_strictly_increase() {
        let log = AuditLog::new(16);
        let a = log.record(closed("sess-1"));
        let b = log.record(closed("sess-2"));
        let c = log.record(closed("sess-3"));
        assert!(a < b && b < c);
        assert_eq!(log.total_recorded(), 3);
    }

    #[test]
    fn test_ring_drops_oldest_at_capacity() {
        let log = AuditLog::new(2);
        log.record(closed("sess-1"));
        log.record(closed("sess-2"));
        log.record(closed("sess-3"));

        let records = log.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sequence, 2);
        assert_eq!(records[1].sequence, 3);
        // Sequence numbers keep counting even when the ring wraps.
        assert_eq!(log.total_recorded(), 3);
    }

    #[tokio::test]
    async fn test_subscribers_receive_records() {
        let log = AuditLog::new(16);
        let mut rx = log.subscribe();

        log.record(AuditEvent::ConnectorFailed {
            reason: "timed out".to_string(),
        });

        let record = rx.recv().await.unwrap();
        assert_eq!(record.sequence, 1);
        assert!(matches!(record.event, AuditEvent::ConnectorFailed { .. }));
    }

    #[test]
    fn test_records_serialize_with_kind_tag() {
        let log = AuditLog::new(4);
        log.record(closed("sess-1"));
        let json = serde_json::to_string(&log.records()[0]).unwrap();
        assert!(json.contains("\"kind\":\"session_closed\""));
        assert!(json.contains("\"sequence\":1"));
    }

    #[test]
    fn test_concurrent_records_get_distinct_sequences() {
        let log = AuditLog::new(1024);
        let mut handles = Vec::new();
        for i in 0..8 {
            let log = log.clone();
            handles.push(std::thread::spawn(move || {
                let mut seqs = Vec::new();
                for _ in 0..100 {
                    seqs.push(log.record(closed(&format!("sess-{}", i))));
                }
                seqs
            }));
        }

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
    }
}
