//! Session lifecycle engine
//!
//! Every lifecycle change goes through one of four actions:
//!
//! - **create**: generate attributes, authenticate, start accounting, persist
//! - **re-authenticate**: authenticate again, send an interim update, refresh
//!   the deadline with the new Session-Timeout
//! - **expire**: stop accounting for sessions past their deadline
//! - **disconnect**: stop accounting for a randomly chosen live session
//!
//! The one-shot CLI calls the actions directly. [`Engine::run`] drives them
//! from a [`TimerQueue`] until shutdown. A session's record is only created,
//! updated or stopped after the server accepted the corresponding exchange,
//! and every action holds the session's lease while it works on it.

mod error;
pub mod timers;

pub use error::{ActionError, ActionResult};
pub use timers::{RearmPolicy, Timer, TimerKind, TimerQueue};

use crate::client::{Accepted, ExchangeError, Operation, RadiusClient};
use crate::journal::{EventJournal, JournalEntry, JournalEventType};
use crate::lease::{LeaseTable, SessionLease};
use crate::stats::EngineStats;
use crate::store::{SessionRecord, SessionStore, StoreError};
use chrono::{DateTime, Utc};
use radsim_proto::{
    AcctStatusType, AcctTerminateCause, AttributeGenerator, AttributeSet, AttributeType,
    Overrides, Scenario, ScenarioError,
};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Timer windows and pools for the continuous scheduler
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerSettings {
    pub scenarios: Vec<Scenario>,
    pub usernames: Vec<String>,
    /// Password for 802.1X and VPN sessions, new and re-authenticated
    pub password: Option<String>,
    pub auth_min: Duration,
    pub auth_max: Duration,
    pub reauth_probability: f64,
    pub sweep_period: Duration,
    pub disconnect_min: Duration,
    pub disconnect_max: Duration,
    pub disconnect_delay: Duration,
    pub report_period: Duration,
    /// Stopped rows older than this are pruned by the sweep
    pub history_retention: chrono::Duration,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        crate::config::Config::default().scheduler_settings()
    }
}

/// Outcome of a sweep or bulk stop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub stopped: usize,
    pub failed: usize,
    pub pruned: usize,
}

pub struct Engine {
    store: SessionStore,
    client: Arc<dyn RadiusClient>,
    generator: AttributeGenerator,
    settings: SchedulerSettings,
    leases: LeaseTable,
    rng: Mutex<StdRng>,
    journal: Arc<EventJournal>,
    stats: Arc<EngineStats>,
}

impl Engine {
    pub fn new(
        store: SessionStore,
        client: Arc<dyn RadiusClient>,
        generator: AttributeGenerator,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            store,
            client,
            generator,
            settings,
            leases: LeaseTable::new(),
            rng: Mutex::new(StdRng::from_entropy()),
            journal: Arc::new(EventJournal::disabled()),
            stats: Arc::new(EngineStats::new()),
        }
    }

    /// Make every random decision reproducible
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_journal(mut self, journal: Arc<EventJournal>) -> Self {
        self.journal = journal;
        self
    }

    /// Share a lease table with other engines on the same store
    pub fn with_leases(mut self, leases: LeaseTable) -> Self {
        self.leases = leases;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn leases(&self) -> &LeaseTable {
        &self.leases
    }

    fn now(&self) -> DateTime<Utc> {
        self.store.clock().now()
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> T {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut rng)
    }

    fn lease(&self, session_id: &str) -> ActionResult<SessionLease> {
        self.leases.try_acquire(session_id).ok_or_else(|| {
            self.stats.record_skipped();
            ActionError::Busy(session_id.to_string())
        })
    }

    async fn journal(&self, entry: JournalEntry) {
        self.journal.log(entry).await;
    }

    /// Run one exchange, counting and journaling failures
    async fn exchange(
        &self,
        operation: Operation,
        attributes: &AttributeSet,
        record: Option<&SessionRecord>,
    ) -> ActionResult<Accepted> {
        let error = match self.client.exchange(operation, attributes).await.into_result() {
            Ok(accepted) => return Ok(accepted),
            Err(error) => error,
        };

        self.stats.record_exchange_failure(&error);
        let event = match (&error, operation) {
            (ExchangeError::Rejected(_), Operation::Authenticate) => JournalEventType::AuthRejected,
            _ => JournalEventType::ExchangeFailed,
        };
        let mut entry = JournalEntry::new(event, self.now())
            .with_details(format!("{}: {}", operation, error));
        if let Some(record) = record {
            entry = entry.with_session(record);
        } else {
            if let Some(user) = attributes.get(AttributeType::UserName) {
                entry = entry.with_username(user);
            }
            if let Some(calling) = attributes.get(AttributeType::CallingStationId) {
                entry = entry.with_calling_station_id(calling);
            }
        }
        self.journal(entry).await;

        Err(error.into())
    }

    /// Authenticate and start accounting for a new endpoint
    ///
    /// If the endpoint's user and calling station already have a live
    /// session, that session is re-authenticated instead.
    pub async fn start_session(
        &self,
        scenario: Scenario,
        overrides: &Overrides,
    ) -> ActionResult<SessionRecord> {
        let attrs = self.with_rng(|rng| self.generator.generate(scenario, overrides, rng))?;

        if let Some(existing) = self
            .store
            .active_for_station(&attrs.user_name, &attrs.calling_station_id)
            .await?
        {
            info!(
                session_id = %existing.session_id,
                user = %attrs.user_name,
                calling_station_id = %attrs.calling_station_id,
                "Endpoint already has a live session, re-authenticating"
            );
            return self
                .reauthenticate_with(&existing.session_id, overrides.password.clone())
                .await;
        }

        // A requested id must be free before anything reaches the server
        let requested_lease = match overrides.session_id.as_deref() {
            Some(id) => {
                let lease = self.lease(id)?;
                if self.store.get(id).await?.is_some() {
                    return Err(StoreError::DuplicateSessionId(id.to_string()).into());
                }
                Some(lease)
            }
            None => None,
        };

        debug!(scenario = %scenario, user = %attrs.user_name, "Authenticating new session");
        let accepted = self
            .exchange(Operation::Authenticate, &attrs.access_request(), None)
            .await?;

        // Nothing is accounted for an assigned id that collides with a known one
        let _lease = match &requested_lease {
            Some(lease) if lease.session_id() == accepted.session_id => None,
            _ => {
                let lease = self.lease(&accepted.session_id)?;
                if self.store.get(&accepted.session_id).await?.is_some() {
                    return Err(StoreError::DuplicateSessionId(accepted.session_id).into());
                }
                Some(lease)
            }
        };

        let record = SessionRecord::started(
            accepted.session_id.clone(),
            &attrs,
            accepted.session_timeout(),
            accepted.class().map(str::to_string),
            self.now(),
        );

        self.exchange(Operation::AcctStart, &record.accounting_attributes(), Some(&record))
            .await?;
        self.store.record_start(record.clone()).await?;

        self.stats.record_started();
        info!(
            session_id = %record.session_id,
            method = %record.method,
            user = %record.user_name,
            calling_station_id = %record.calling_station_id,
            session_timeout = record.session_timeout,
            "Session started"
        );
        self.journal(
            JournalEntry::new(JournalEventType::SessionStarted, record.created_at)
                .with_session(&record)
                .with_details(format!("scenario={} timeout={}", scenario, record.session_timeout)),
        )
        .await;

        Ok(record)
    }

    /// Re-authenticate a live session and refresh its deadline
    pub async fn reauthenticate(&self, session_id: &str) -> ActionResult<SessionRecord> {
        self.reauthenticate_with(session_id, None).await
    }

    async fn reauthenticate_with(
        &self,
        session_id: &str,
        password: Option<String>,
    ) -> ActionResult<SessionRecord> {
        let _lease = self.lease(session_id)?;
        let record = self.live_record(session_id, AcctStatusType::InterimUpdate).await?;

        let password = password
            .or_else(|| self.settings.password.clone())
            .or_else(|| self.generator.defaults().password.clone());
        let attrs = record.session_attributes(password);
        if record.method.needs_password() && attrs.user_password.is_none() {
            return Err(ScenarioError::MissingCredential {
                scenario: record.scenario(),
                attribute: AttributeType::UserPassword.name(),
            }
            .into());
        }

        let accepted = self
            .exchange(Operation::Authenticate, &attrs.access_request(), Some(&record))
            .await?;

        let mut interim = record.accounting_attributes();
        if let Some(class) = accepted.class() {
            interim.insert(AttributeType::Class, class);
        }
        interim.insert(
            AttributeType::AcctSessionTime,
            record.session_time(self.now()).to_string(),
        );
        self.exchange(Operation::AcctInterim, &interim, Some(&record))
            .await?;

        let updated = self
            .store
            .record_update(session_id, accepted.session_timeout(), AcctStatusType::InterimUpdate)
            .await?;

        self.stats.record_reauthenticated();
        info!(
            session_id = %updated.session_id,
            user = %updated.user_name,
            session_timeout = updated.session_timeout,
            "Session re-authenticated"
        );
        self.journal(
            JournalEntry::new(JournalEventType::SessionReauthenticated, updated.authenticated_at)
                .with_session(&updated)
                .with_details(format!("timeout={}", updated.session_timeout)),
        )
        .await;

        Ok(updated)
    }

    /// Send Accounting-Stop and mark the session stopped
    pub async fn stop_session(
        &self,
        session_id: &str,
        cause: AcctTerminateCause,
    ) -> ActionResult<SessionRecord> {
        let _lease = self.lease(session_id)?;
        let record = self.live_record(session_id, AcctStatusType::Stop).await?;
        if cause == AcctTerminateCause::SessionTimeout && !record.is_expired(self.now()) {
            return Err(ActionError::NotExpired(session_id.to_string()));
        }

        let mut stop = record.accounting_attributes();
        stop.insert(
            AttributeType::AcctSessionTime,
            record.session_time(self.now()).to_string(),
        );
        stop.insert(AttributeType::AcctTerminateCause, cause.name());
        self.exchange(Operation::AcctStop, &stop, Some(&record)).await?;

        let stopped = self.store.record_stop(session_id).await?;

        match cause {
            AcctTerminateCause::SessionTimeout => self.stats.record_expired(),
            AcctTerminateCause::LostCarrier => self.stats.record_disconnected(),
            _ => self.stats.record_stopped(),
        }
        info!(
            session_id = %stopped.session_id,
            user = %stopped.user_name,
            cause = %cause,
            "Session stopped"
        );
        self.journal(
            JournalEntry::new(
                JournalEventType::SessionStopped,
                stopped.stopped_at.unwrap_or_else(|| self.now()),
            )
            .with_session(&stopped)
            .with_details(format!("cause={}", cause)),
        )
        .await;

        Ok(stopped)
    }

    /// Stop every live session with User-Request
    pub async fn stop_all(&self) -> ActionResult<SweepReport> {
        let active = self.store.active_sessions().await?;
        let mut report = SweepReport::default();
        for record in active.iter() {
            match self
                .stop_session(&record.session_id, AcctTerminateCause::UserRequest)
                .await
            {
                Ok(_) => report.stopped += 1,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(session_id = %record.session_id, "Stop failed: {}", e);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    /// Stop every session whose deadline has passed, then prune old history
    ///
    /// Walks live sessions in deadline order and stops at the first one that
    /// has not expired. A rejected stop leaves its record for the next sweep;
    /// an unreachable or silent server aborts the sweep.
    pub async fn sweep_expired(&self) -> ActionResult<SweepReport> {
        let now = self.now();
        let active = self.store.active_sessions().await?;
        let mut report = SweepReport::default();

        for record in active.iter() {
            if !record.is_expired(now) {
                break;
            }
            match self
                .stop_session(&record.session_id, AcctTerminateCause::SessionTimeout)
                .await
            {
                Ok(_) => report.stopped += 1,
                Err(ActionError::Exchange(ExchangeError::Rejected(reason))) => {
                    warn!(session_id = %record.session_id, reason = %reason, "Expired session stop rejected");
                    report.failed += 1;
                }
                Err(ActionError::Busy(id)) => {
                    debug!(session_id = %id, "Expired session busy, leaving for next sweep");
                    report.failed += 1;
                }
                Err(ActionError::NotExpired(id)) => {
                    debug!(session_id = %id, "Session renewed while sweep was running");
                }
                Err(ActionError::Store(e)) if !e.is_fatal() => {
                    warn!(session_id = %record.session_id, "Expired session changed underneath sweep: {}", e);
                    report.failed += 1;
                }
                Err(e) => return Err(e),
            }
        }

        report.pruned = self
            .store
            .prune_stopped(now - self.settings.history_retention)
            .await?;

        if report.stopped > 0 || report.failed > 0 || report.pruned > 0 {
            info!(
                expired = report.stopped,
                failed = report.failed,
                pruned = report.pruned,
                "Expiration sweep finished"
            );
        }
        Ok(report)
    }

    /// Stop one uniformly chosen live session with Lost-Carrier
    pub async fn disconnect_random(&self) -> ActionResult<Option<SessionRecord>> {
        let active = self.store.active_sessions().await?;
        if active.is_empty() {
            debug!("No live sessions to disconnect");
            return Ok(None);
        }
        let index = self.with_rng(|rng| rng.gen_range(0..active.len()));
        let Some(victim) = active.get(index) else {
            return Ok(None);
        };
        self.stop_session(&victim.session_id, AcctTerminateCause::LostCarrier)
            .await
            .map(Some)
    }

    /// Start a new session, or occasionally re-authenticate a live one
    pub async fn random_auth(&self) -> ActionResult<SessionRecord> {
        let active = self.store.active_sessions().await?;
        let probability = self.settings.reauth_probability.clamp(0.0, 1.0);
        let reauth = !active.is_empty() && self.with_rng(|rng| rng.gen_bool(probability));

        if reauth {
            let index = self.with_rng(|rng| rng.gen_range(0..active.len()));
            if let Some(record) = active.get(index) {
                return self.reauthenticate(&record.session_id).await;
            }
        }

        let (scenario, username) = self.with_rng(|rng| {
            (
                self.settings.scenarios.choose(rng).copied(),
                self.settings.usernames.choose(rng).cloned(),
            )
        });
        let scenario = scenario
            .ok_or_else(|| ScenarioError::InvalidScenario("no scenarios configured".to_string()))?;

        let overrides = if scenario.method().needs_password() {
            Overrides {
                username,
                password: self.settings.password.clone(),
                ..Overrides::default()
            }
        } else {
            Overrides::default()
        };
        self.start_session(scenario, &overrides).await
    }

    /// Log the live session count and cumulative counters
    pub async fn report(&self) -> ActionResult<usize> {
        let active = self.store.active_sessions().await?;
        info!(
            active = active.len(),
            stats = %self.stats.snapshot(),
            "Status report"
        );
        for record in active.iter() {
            debug!(
                session_id = %record.session_id,
                method = %record.method,
                status = %record.status,
                user = %record.user_name,
                deadline = %record.deadline(),
                "Live session"
            );
        }
        Ok(active.len())
    }

    async fn live_record(
        &self,
        session_id: &str,
        target: AcctStatusType,
    ) -> ActionResult<SessionRecord> {
        let record = self
            .store
            .get(session_id)
            .await?
            .ok_or_else(|| StoreError::UnknownSessionId(session_id.to_string()))?;
        if !record.is_active() {
            return Err(StoreError::InvalidTransition {
                id: session_id.to_string(),
                from: record.status,
                to: target,
            }
            .into());
        }
        Ok(record)
    }

    async fn dispatch(&self, kind: TimerKind) -> ActionResult<()> {
        debug!(timer = kind.name(), "Timer fired");
        let result = match kind {
            TimerKind::RandomAuth => self.random_auth().await.map(drop),
            TimerKind::ExpirationSweep => self.sweep_expired().await.map(drop),
            TimerKind::RandomDisconnect => self.disconnect_random().await.map(drop),
            TimerKind::StatusReport => self.report().await.map(drop),
        };

        if let Err(e) = &result {
            match e {
                ActionError::Exchange(_) => warn!(timer = kind.name(), "Action aborted: {}", e),
                ActionError::Busy(_) | ActionError::NotExpired(_) => {
                    info!(timer = kind.name(), "Action skipped: {}", e)
                }
                _ if e.is_fatal() => error!(timer = kind.name(), "Session store failed: {}", e),
                _ => error!(timer = kind.name(), "Action failed: {:?}", e),
            }
        }
        result
    }

    /// Drive the timers until `shutdown` turns true
    ///
    /// The signal is checked before each action starts; an action already
    /// in flight runs to completion. Returns early only on a fatal store
    /// error.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> ActionResult<()> {
        let settings = &self.settings;
        let start = Instant::now();
        let auth = RearmPolicy::between(settings.auth_min, settings.auth_max);
        let disconnect = RearmPolicy::between(settings.disconnect_min, settings.disconnect_max);

        let mut queue = TimerQueue::new();
        self.with_rng(|rng| {
            queue.arm(TimerKind::ExpirationSweep, RearmPolicy::Fixed(settings.sweep_period), start);
            queue.arm(TimerKind::RandomAuth, auth, start + auth.next_delay(rng));
            queue.arm(
                TimerKind::RandomDisconnect,
                disconnect,
                start + settings.disconnect_delay + disconnect.next_delay(rng),
            );
            queue.arm(
                TimerKind::StatusReport,
                RearmPolicy::Fixed(settings.report_period),
                start + settings.report_period,
            );
        });

        info!(
            scenarios = settings.scenarios.len(),
            usernames = settings.usernames.len(),
            "Scheduler started"
        );
        self.journal(JournalEntry::new(JournalEventType::SchedulerStarted, self.now()))
            .await;

        let result = loop {
            if *shutdown.borrow_and_update() {
                break Ok(());
            }
            let Some(timer) = queue.pop() else {
                break Ok(());
            };

            tokio::select! {
                changed = shutdown.changed() => {
                    queue.restore(timer);
                    if changed.is_err() {
                        break Ok(());
                    }
                    continue;
                }
                _ = tokio::time::sleep_until(timer.due) => {}
            }

            if *shutdown.borrow() {
                break Ok(());
            }

            if let Err(e) = self.dispatch(timer.kind).await {
                if e.is_fatal() {
                    break Err(e);
                }
            }

            let now = Instant::now();
            self.with_rng(|rng| queue.rearm(timer, now, rng));
        };

        info!(stats = %self.stats.snapshot(), "Scheduler stopped");
        self.journal(
            JournalEntry::new(JournalEventType::SchedulerStopped, self.now())
                .with_details(self.stats.snapshot().to_string()),
        )
        .await;
        result
    }
}
