//! RADIUS attribute vocabulary
//!
//! Attributes travel to and from radclient as dictionary names and text
//! values, so the set keeps them as ordered string pairs and the typed enums
//! only cover the values the simulator reasons about.

pub mod set;
pub mod types;

pub use set::{AttributeSet, Redacted};
pub use types::{AttributeType, NasPortType, ServiceType};
