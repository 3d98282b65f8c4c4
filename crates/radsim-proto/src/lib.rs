//! RADIUS session simulation vocabulary
//!
//! This crate holds the pure, I/O-free half of the simulator:
//!
//! - the attribute vocabulary exchanged with `radclient`
//! - accounting status and terminate-cause values (RFC 2866)
//! - the scenario-driven attribute generator
//! - the text codec for `radclient -x` transcripts
//!
//! # Example
//!
//! ```rust
//! use radsim_proto::{AttributeGenerator, GeneratorDefaults, Overrides, Scenario};
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let generator = AttributeGenerator::new(GeneratorDefaults {
//!     username: Some("alice".into()),
//!     password: Some("secret".into()),
//!     ..GeneratorDefaults::default()
//! });
//! let scenario: Scenario = "wireless".parse().unwrap();
//! let attrs = generator
//!     .generate(scenario, &Overrides::default(), &mut StdRng::seed_from_u64(1))
//!     .unwrap();
//! let request = attrs.access_request();
//! assert_eq!(request.get("NAS-Port-Type"), Some("Wireless-802.11"));
//! ```

pub mod accounting;
pub mod attributes;
pub mod generator;
pub mod radclient;
pub mod scenario;

pub use accounting::{AcctStatusType, AcctTerminateCause};
pub use attributes::{AttributeSet, AttributeType, NasPortType, ServiceType};
pub use generator::{AttributeGenerator, GeneratorDefaults, Overrides, SessionAttributes};
pub use radclient::{PacketCode, Transcript, TranscriptError};
pub use scenario::{AccessMethod, Scenario, ScenarioError};
