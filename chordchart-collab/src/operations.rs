//! Outbound operation dispatch and inbound operation log.
//!
//! ```text
//! send_operation(draft)
//!       │  id = uuid v4, pending += id
//!       ▼
//! collaboration_operation ──► server ──► collaboration_update (every member)
//!                                              │
//!                                              ▼
//!                               pending -= operation_id (if ours)
//!                               log.push_back(update)   (retention window)
//! ```
//!
//! Acknowledgements may arrive in any order; each one is matched by id.
//! Updates are never reordered or merged here.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::protocol::{CollaborationOperation, CollaborationUpdate, OperationDraft};

#[derive(Debug, Clone)]
struct RetainedUpdate {
    received_at: Instant,
    update: CollaborationUpdate,
}

/// Pending-acknowledgement set plus a bounded log of received updates.
#[derive(Debug)]
pub struct OperationChannel {
    pending: HashSet<String>,
    log: VecDeque<RetainedUpdate>,
    retention: Duration,
}

impl OperationChannel {
    pub fn new(retention: Duration) -> Self {
        Self {
            pending: HashSet::new(),
            log: VecDeque::new(),
            retention,
        }
    }

    /// Draw an id that is not currently pending.
    fn fresh_id(&self) -> String {
        loop {
            let id = Uuid::new_v4().to_string();
            if !self.pending.contains(&id) {
                return id;
            }
        }
    }

    /// Enrich a draft and mark it pending.
    pub fn prepare(&mut self, draft: OperationDraft, user_id: &str) -> CollaborationOperation {
        let id = self.fresh_id();
        self.pending.insert(id.clone());
        CollaborationOperation {
            id,
            kind: draft.kind,
            position: draft.position,
            content: draft.content,
            length: draft.length,
            user_id: user_id.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Take back an id whose frame never left.
    pub fn withdraw(&mut self, id: &str) -> bool {
        self.pending.remove(id)
    }

    /// Record an inbound update. Returns `true` if it acknowledged one of
    /// our pending operations.
    pub fn receive(&mut self, update: CollaborationUpdate, now: Instant) -> bool {
        let acknowledged = self.pending.remove(&update.operation_id);
        self.log.push_back(RetainedUpdate {
            received_at: now,
            update,
        });
        acknowledged
    }

    /// Drop log entries older than the retention window. Returns how many went.
    pub fn prune(&mut self, now: Instant) -> usize {
        let before = self.log.len();
        while let Some(front) = self.log.front() {
            if now.saturating_duration_since(front.received_at) > self.retention {
                self.log.pop_front();
            } else {
                break;
            }
        }
        before - self.log.len()
    }

    pub fn is_pending(&self, id: &str) -> bool {
        self.pending.contains(id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn pending_ids(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(String::as_str)
    }

    /// Retained updates, oldest first.
    pub fn recent(&self) -> impl Iterator<Item = &CollaborationUpdate> {
        self.log.iter().map(|entry| &entry.update)
    }

    pub fn log_len(&self) -> usize {
        self.log.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
        self.log.clear();
    }
}
