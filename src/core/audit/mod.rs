//! Audit trail for policy mutations and access decisions
//!
//! Every domain event is recorded with:
//! - A gap-free sequence number (assigned under the history lock)
//! - Microsecond-precision timestamp
//! - Bounded in-memory history (oldest entries dropped first)
//! - Fan-out to live subscribers over a broadcast channel

use crate::core::condition::Condition;
use crate::core::engine::AccessDecision;
use crate::core::policy::{Policy, PolicyId};
use alloy_primitives::Address;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use tokio::sync::broadcast;
use tracing::info;

/// Domain and audit events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event")]
pub enum PolicyEvent {
    PolicyCreated {
        policy: Policy,
    },
    PolicyUpdated {
        policy: Policy,
    },
    PolicyStatusChanged {
        policy: Policy,
    },
    ConditionAdded {
        policy: Policy,
        condition: Condition,
    },
    ConditionRemoved {
        policy: Policy,
        condition: Condition,
    },
    AccessChecked {
        decision: AccessDecision,
    },
    PolicyEnforced {
        policy_id: PolicyId,
        account: Address,
        satisfied: bool,
    },
}

impl PolicyEvent {
    /// Event name as exposed to consumers
    pub fn name(&self) -> &'static str {
        match self {
            PolicyEvent::PolicyCreated { .. } => "PolicyCreated",
            PolicyEvent::PolicyUpdated { .. } => "PolicyUpdated",
            PolicyEvent::PolicyStatusChanged { .. } => "PolicyStatusChanged",
            PolicyEvent::ConditionAdded { .. } => "ConditionAdded",
            PolicyEvent::ConditionRemoved { .. } => "ConditionRemoved",
            PolicyEvent::AccessChecked { .. } => "AccessChecked",
            PolicyEvent::PolicyEnforced { .. } => "PolicyEnforced",
        }
    }
}

/// Single audit log entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuditRecord {
    /// Position in the global event order, starting at 0
    pub sequence: u64,
    /// Microsecond timestamp since UNIX epoch
    pub timestamp_us: i64,
    pub event: PolicyEvent,
}

struct History {
    entries: VecDeque<AuditRecord>,
    next_sequence: u64,
}

/// Bounded, subscribable audit log
pub struct AuditLog {
    history: Mutex<History>,
    capacity: usize,
    sender: broadcast::Sender<AuditRecord>,
}

impl AuditLog {
    /// Create a log retaining at most `capacity` records
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);

        AuditLog {
            history: Mutex::new(History {
                entries: VecDeque::with_capacity(capacity),
                next_sequence: 0,
            }),
            capacity,
            sender,
        }
    }

    /// Record an event and return its sequence number
    pub fn record(&self, event: PolicyEvent) -> u64 {
        let mut history = self.history.lock();

        let record = AuditRecord {
            sequence: history.next_sequence,
            timestamp_us: chrono::Utc::now().timestamp_micros(),
            event,
        };
        history.next_sequence += 1;

        info!(
            target: "pbac::audit",
            sequence = record.sequence,
            event = record.event.name(),
            "audit event recorded"
        );

        if history.entries.len() == self.capacity {
            history.entries.pop_front();
        }
        history.entries.push_back(record.clone());

        // No subscribers is not an error
        let _ = self.sender.send(record);

        history.next_sequence - 1
    }

    /// Receive every record logged after this call
    pub fn subscribe(&self) -> broadcast::Receiver<AuditRecord> {
        self.sender.subscribe()
    }

    /// Most recent records, oldest first, at most `limit`
    pub fn recent(&self, limit: usize) -> Vec<AuditRecord> {
        let history = self.history.lock();
        let skip = history.entries.len().saturating_sub(limit);
        history.entries.iter().skip(skip).cloned().collect()
    }

    /// Number of retained records
    pub fn len(&self) -> usize {
        self.history.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of records ever logged (including evicted ones)
    pub fn total_recorded(&self) -> u64 {
        self.history.lock().next_sequence
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(1024)
    }
}
