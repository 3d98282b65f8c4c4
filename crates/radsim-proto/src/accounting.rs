//! RADIUS accounting vocabulary (RFC 2866)
//!
//! radclient takes enumerated attributes by their dictionary names, so the
//! values here are only ever rendered as text.
//!
//! # Example
//!
//! ```rust
//! use radsim_proto::accounting::{AcctStatusType, AcctTerminateCause};
//!
//! assert_eq!(AcctStatusType::InterimUpdate.name(), "Interim-Update");
//! assert_eq!(AcctTerminateCause::LostCarrier.name(), "Lost-Carrier");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Accounting Status-Type values (RFC 2866 Section 5.1)
///
/// Only the session statuses are simulated, so these double as the lifecycle
/// status of a stored session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcctStatusType {
    /// Start (1) - Session has begun
    #[serde(rename = "Start")]
    Start,
    /// Stop (2) - Session has ended
    #[serde(rename = "Stop")]
    Stop,
    /// Interim-Update (3) - Session was re-authenticated
    #[serde(rename = "Interim-Update")]
    InterimUpdate,
}

impl AcctStatusType {
    /// Dictionary name understood by radclient
    pub fn name(self) -> &'static str {
        match self {
            AcctStatusType::Start => "Start",
            AcctStatusType::Stop => "Stop",
            AcctStatusType::InterimUpdate => "Interim-Update",
        }
    }

    /// True until the session has been stopped
    pub fn is_active(self) -> bool {
        !matches!(self, AcctStatusType::Stop)
    }
}

impl fmt::Display for AcctStatusType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Accounting Terminate-Cause values the simulator sends (RFC 2866 Section 5.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcctTerminateCause {
    /// User Request (1) - operator stop
    UserRequest,
    /// Lost Carrier (2) - random disconnect
    LostCarrier,
    /// Session Timeout (5) - Session-Timeout elapsed
    SessionTimeout,
}

impl AcctTerminateCause {
    /// Dictionary name understood by radclient
    pub fn name(self) -> &'static str {
        match self {
            AcctTerminateCause::UserRequest => "User-Request",
            AcctTerminateCause::LostCarrier => "Lost-Carrier",
            AcctTerminateCause::SessionTimeout => "Session-Timeout",
        }
    }
}

impl fmt::Display for AcctTerminateCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acct_status_type_serde_uses_dictionary_names() {
        for status in [
            AcctStatusType::Start,
            AcctStatusType::InterimUpdate,
            AcctStatusType::Stop,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.name()));
            assert_eq!(serde_json::from_str::<AcctStatusType>(&json).unwrap(), status);
        }
        assert!(serde_json::from_str::<AcctStatusType>("\"Accounting-On\"").is_err());
    }

    #[test]
    fn test_is_active() {
        assert!(AcctStatusType::Start.is_active());
        assert!(AcctStatusType::InterimUpdate.is_active());
        assert!(!AcctStatusType::Stop.is_active());
    }

    #[test]
    fn test_terminate_cause_names() {
        assert_eq!(AcctTerminateCause::UserRequest.name(), "User-Request");
        assert_eq!(AcctTerminateCause::SessionTimeout.to_string(), "Session-Timeout");
    }
}
