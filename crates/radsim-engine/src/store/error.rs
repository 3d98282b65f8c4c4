//! Error types for session store operations

use radsim_proto::AcctStatusType;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session {0} already exists")]
    DuplicateSessionId(String),

    #[error("unknown session {0}")]
    UnknownSessionId(String),

    #[error("session {id} cannot move from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: AcctStatusType,
        to: AcctStatusType,
    },

    #[error("session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session store corrupt at line {line}: {source}")]
    Corrupt {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// The backing file can no longer be trusted; the scheduler must stop
    pub fn is_fatal(&self) -> bool {
        matches!(self, StoreError::Io(_) | StoreError::Corrupt { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
