use crate::client::ExchangeError;
use crate::store::StoreError;
use radsim_proto::ScenarioError;
use thiserror::Error;

/// Why a lifecycle action did not complete
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Scenario(#[from] ScenarioError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Exchange(#[from] ExchangeError),

    #[error("session {0} is held by another action")]
    Busy(String),

    /// Re-authenticated after the sweep picked it
    #[error("session {0} was renewed before it expired")]
    NotExpired(String),
}

impl ActionError {
    /// Ends the continuous scheduler
    pub fn is_fatal(&self) -> bool {
        matches!(self, ActionError::Store(e) if e.is_fatal())
    }

    /// Process exit code for one-shot commands
    pub fn exit_code(&self) -> u8 {
        match self {
            ActionError::Exchange(_) => 1,
            ActionError::Scenario(_)
            | ActionError::Store(_)
            | ActionError::Busy(_)
            | ActionError::NotExpired(_) => 3,
        }
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

#[cfg(test)]
mod tests {
    use super::*;
    use radsim_proto::Scenario;

    #[test]
    fn test_exchange_failures_exit_1() {
        for error in [
            ExchangeError::Rejected("Access-Reject".to_string()),
            ExchangeError::Unreachable("no route".to_string()),
            ExchangeError::Timeout,
        ] {
            let error = ActionError::from(error);
            assert_eq!(error.exit_code(), 1);
            assert!(!error.is_fatal());
        }
    }

    #[test]
    fn test_local_failures_exit_3() {
        let errors = [
            ActionError::from(ScenarioError::MissingCredential {
                scenario: Scenario::Vpn,
                attribute: "User-Password",
            }),
            ActionError::from(StoreError::DuplicateSessionId("S1".to_string())),
            ActionError::from(StoreError::UnknownSessionId("S9".to_string())),
            ActionError::Busy("S1".to_string()),
            ActionError::NotExpired("S1".to_string()),
        ];
        for error in &errors {
            assert_eq!(error.exit_code(), 3, "{error}");
            assert!(!error.is_fatal(), "{error}");
        }
    }

    #[test]
    fn test_io_failure_is_fatal() {
        let error = ActionError::from(StoreError::Io(std::io::Error::other("disk gone")));
        assert!(error.is_fatal());
        assert_eq!(error.exit_code(), 3);
    }
}
