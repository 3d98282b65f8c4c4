//! Shared fixtures for engine integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use radsim_engine::{Clock, Engine, Operation, Outcome, RadiusClient, SchedulerSettings, SessionStore};
use radsim_proto::{AttributeGenerator, AttributeSet, AttributeType, GeneratorDefaults};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// RADIUS client that accepts everything unless told otherwise
///
/// Authenticate assigns `S1`, `S2`, ... when the request carries no
/// Acct-Session-Id. Queued outcomes are returned, in order, before falling
/// back to acceptance.
pub struct ScriptedClient {
    calls: Mutex<Vec<(Operation, AttributeSet)>>,
    queued: Mutex<VecDeque<Outcome>>,
    next_id: AtomicU32,
    session_timeout: AtomicU32,
    delay: Option<Duration>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            next_id: AtomicU32::new(1),
            session_timeout: AtomicU32::new(3600),
            delay: None,
        }
    }

    /// Every exchange takes `delay` of (tokio) time
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::new()
        }
    }

    pub fn set_session_timeout(&self, seconds: u32) {
        self.session_timeout.store(seconds, Ordering::SeqCst);
    }

    pub fn push_outcome(&self, outcome: Outcome) {
        self.queued.lock().unwrap().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<(Operation, AttributeSet)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, _)| *op == operation)
            .count()
    }

    pub fn calls_for(&self, operation: Operation, session_id: &str) -> Vec<AttributeSet> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(op, attrs)| {
                *op == operation && attrs.get(AttributeType::AcctSessionId) == Some(session_id)
            })
            .map(|(_, attrs)| attrs.clone())
            .collect()
    }
}

#[async_trait]
impl RadiusClient for ScriptedClient {
    async fn exchange(&self, operation: Operation, attributes: &AttributeSet) -> Outcome {
        self.calls
            .lock()
            .unwrap()
            .push((operation, attributes.clone()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(outcome) = self.queued.lock().unwrap().pop_front() {
            return outcome;
        }

        let session_id = match attributes.get(AttributeType::AcctSessionId) {
            Some(id) => id.to_string(),
            None if operation == Operation::Authenticate => {
                format!("S{}", self.next_id.fetch_add(1, Ordering::SeqCst))
            }
            None => return Outcome::Rejected("missing Acct-Session-Id".to_string()),
        };

        let mut reply = AttributeSet::new();
        if operation == Operation::Authenticate {
            reply.insert(
                AttributeType::SessionTimeout,
                self.session_timeout.load(Ordering::SeqCst).to_string(),
            );
            reply.insert(AttributeType::Class, format!("CACS:{}", session_id));
        }
        Outcome::accepted(session_id, reply)
    }
}

pub fn anchor() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
}

pub fn settings() -> SchedulerSettings {
    SchedulerSettings {
        password: Some("C1sco12345".to_string()),
        ..SchedulerSettings::default()
    }
}

pub fn generator() -> AttributeGenerator {
    AttributeGenerator::new(GeneratorDefaults {
        username: Some("alice".to_string()),
        password: Some("C1sco12345".to_string()),
        ..GeneratorDefaults::default()
    })
}

pub fn build_engine(
    dir: &TempDir,
    client: Arc<ScriptedClient>,
    clock: Arc<dyn Clock>,
    settings: SchedulerSettings,
) -> Engine {
    let store = SessionStore::with_clock(dir.path().join("sessions.jsonl"), clock);
    Engine::new(store, client, generator(), settings).with_seed(7)
}
