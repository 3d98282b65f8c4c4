//! RADIUS client adapter
//!
//! The simulator never speaks RADIUS itself. Each exchange is handed to a
//! [`RadiusClient`], which returns a structured [`Outcome`]:
//!
//! - **Accepted**: the server answered Access-Accept or Accounting-Response
//! - **Rejected**: the server refused the request
//! - **Unreachable**: the exchange could not be attempted or its output was unusable
//! - **Timeout**: no answer within the exchange deadline
//!
//! # Implementations
//!
//! - `RadclientClient`: runs the FreeRADIUS `radclient` utility per exchange

pub mod radclient;

pub use radclient::{RadclientClient, RadclientConfig};

use async_trait::async_trait;
use radsim_proto::{AttributeSet, AttributeType};
use std::fmt;
use thiserror::Error;

/// Session-Timeout assumed when the server does not send one
pub const DEFAULT_SESSION_TIMEOUT: u32 = 3600;

/// The request an exchange carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Authenticate,
    AcctStart,
    AcctInterim,
    AcctStop,
}

impl Operation {
    pub fn is_accounting(self) -> bool {
        !matches!(self, Operation::Authenticate)
    }

    pub fn name(self) -> &'static str {
        match self {
            Operation::Authenticate => "authenticate",
            Operation::AcctStart => "acct-start",
            Operation::AcctInterim => "acct-interim",
            Operation::AcctStop => "acct-stop",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Successful exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Accepted {
    /// Acct-Session-Id the request went out with
    pub session_id: String,
    /// Attributes of the server's reply
    pub attributes: AttributeSet,
}

impl Accepted {
    /// Server-assigned Session-Timeout, or the default
    pub fn session_timeout(&self) -> u32 {
        self.attributes
            .get_u32(AttributeType::SessionTimeout)
            .unwrap_or(DEFAULT_SESSION_TIMEOUT)
    }

    pub fn class(&self) -> Option<&str> {
        self.attributes.get(AttributeType::Class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Accepted(Accepted),
    Rejected(String),
    Unreachable(String),
    Timeout,
}

impl Outcome {
    pub fn accepted(session_id: impl Into<String>, attributes: AttributeSet) -> Self {
        Outcome::Accepted(Accepted {
            session_id: session_id.into(),
            attributes,
        })
    }

    pub fn into_result(self) -> Result<Accepted, ExchangeError> {
        match self {
            Outcome::Accepted(accepted) => Ok(accepted),
            Outcome::Rejected(reason) => Err(ExchangeError::Rejected(reason)),
            Outcome::Unreachable(detail) => Err(ExchangeError::Unreachable(detail)),
            Outcome::Timeout => Err(ExchangeError::Timeout),
        }
    }
}

/// Failed exchange; routine, never fatal to the scheduler
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExchangeError {
    #[error("rejected by server: {0}")]
    Rejected(String),

    #[error("server unreachable: {0}")]
    Unreachable(String),

    #[error("exchange timed out")]
    Timeout,
}

/// One request/response exchange with a RADIUS server
#[async_trait]
pub trait RadiusClient: Send + Sync {
    /// Send `attributes` as `operation` and classify the reply
    ///
    /// Authenticate assigns an Acct-Session-Id when the attributes carry
    /// none and reports it in [`Accepted::session_id`]. Accounting requests
    /// must already carry one.
    async fn exchange(&self, operation: Operation, attributes: &AttributeSet) -> Outcome;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_timeout_defaults() {
        let accepted = Accepted {
            session_id: "S1".to_string(),
            attributes: AttributeSet::new(),
        };
        assert_eq!(accepted.session_timeout(), DEFAULT_SESSION_TIMEOUT);
        assert_eq!(accepted.class(), None);

        let attributes: AttributeSet = [("Session-Timeout", "120"), ("Class", "CACS:1")]
            .into_iter()
            .collect();
        let accepted = Accepted {
            session_id: "S1".to_string(),
            attributes,
        };
        assert_eq!(accepted.session_timeout(), 120);
        assert_eq!(accepted.class(), Some("CACS:1"));
    }

    #[test]
    fn test_into_result() {
        assert_eq!(
            Outcome::Rejected("no".into()).into_result(),
            Err(ExchangeError::Rejected("no".into()))
        );
        assert_eq!(Outcome::Timeout.into_result(), Err(ExchangeError::Timeout));
        assert!(Outcome::accepted("S1", AttributeSet::new())
            .into_result()
            .is_ok());
    }

    #[test]
    fn test_operation_kinds() {
        assert!(!Operation::Authenticate.is_accounting());
        assert!(Operation::AcctStop.is_accounting());
        assert_eq!(Operation::AcctInterim.to_string(), "acct-interim");
    }
}
