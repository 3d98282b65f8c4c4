//! RADIUS session lifecycle simulator
//!
//! Simulates 802.1X, MAB and VPN endpoints against a RADIUS server by
//! driving the FreeRADIUS `radclient` utility, and keeps the resulting
//! sessions in a durable store so later runs can re-authenticate, expire or
//! disconnect them.
//!
//! # Features
//!
//! - Scenario-driven attribute generation (see `radsim-proto`)
//! - JSON Lines session store with atomic rewrites
//! - Pluggable RADIUS client behind the [`RadiusClient`] trait
//! - Timer-driven scheduler with per-session leases
//! - JSON configuration and an optional event journal
//!
//! # Example
//!
//! ```rust,no_run
//! use radsim_engine::{Config, Engine, RadclientClient, SessionStore};
//! use radsim_proto::{AttributeGenerator, Overrides, Scenario};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = RadclientClient::new(config.radclient("10.1.1.5", "s3cret")?);
//!     let engine = Engine::new(
//!         SessionStore::new(&config.store_path),
//!         Arc::new(client),
//!         AttributeGenerator::new(config.generator_defaults()),
//!         config.scheduler_settings(),
//!     );
//!
//!     let record = engine.start_session(Scenario::Mab, &Overrides::default()).await?;
//!     println!("started {}", record.session_id);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod clock;
pub mod config;
pub mod journal;
pub mod lease;
pub mod scheduler;
pub mod stats;
pub mod store;

pub use client::{Accepted, ExchangeError, Operation, Outcome, RadclientClient, RadclientConfig, RadiusClient};
pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::{Config, ConfigError, SchedulerConfig};
pub use journal::{EventJournal, JournalEntry, JournalEventType};
pub use lease::{LeaseTable, SessionLease};
pub use scheduler::{ActionError, ActionResult, Engine, SchedulerSettings, SweepReport};
pub use stats::{EngineStats, StatsSnapshot};
pub use store::{ActiveSessions, SessionRecord, SessionStore, StoreError};
