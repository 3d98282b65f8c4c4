//! Per-session leases
//!
//! Every lifecycle action holds the lease of the session id it touches.
//! A second action on the same id fails to acquire and is skipped.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct LeaseTable {
    held: Arc<DashMap<String, ()>>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lease for `session_id`, or `None` if someone holds it
    pub fn try_acquire(&self, session_id: &str) -> Option<SessionLease> {
        match self.held.entry(session_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                slot.insert(());
                Some(SessionLease {
                    session_id: session_id.to_string(),
                    held: Arc::clone(&self.held),
                })
            }
        }
    }

    pub fn is_held(&self, session_id: &str) -> bool {
        self.held.contains_key(session_id)
    }

    pub fn len(&self) -> usize {
        self.held.len()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }
}

/// Exclusive hold on one session id, released on drop
#[derive(Debug)]
pub struct SessionLease {
    session_id: String,
    held: Arc<DashMap<String, ()>>,
}

impl SessionLease {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        self.held.remove(&self.session_id);
    }
}
