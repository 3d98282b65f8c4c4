//! Session lifecycle journal
//!
//! One JSON object per line for every lifecycle event, so a run can be
//! replayed or audited with `jq` after the fact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::error;

use crate::store::SessionRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalEventType {
    SessionStarted,
    SessionReauthenticated,
    SessionStopped,
    AuthRejected,
    ExchangeFailed,
    SchedulerStarted,
    SchedulerStopped,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Unix epoch seconds
    pub timestamp: i64,
    pub timestamp_iso: String,
    pub event_type: JournalEventType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calling_station_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl JournalEntry {
    pub fn new(event_type: JournalEventType, at: DateTime<Utc>) -> Self {
        JournalEntry {
            timestamp: at.timestamp(),
            timestamp_iso: at.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            event_type,
            session_id: None,
            username: None,
            calling_station_id: None,
            method: None,
            details: None,
        }
    }

    /// Fill the session fields from a stored record
    pub fn with_session(mut self, record: &SessionRecord) -> Self {
        self.session_id = Some(record.session_id.clone());
        self.username = Some(record.user_name.clone());
        self.calling_station_id = Some(record.calling_station_id.clone());
        self.method = Some(record.method.to_string());
        self
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_calling_station_id(mut self, calling: impl Into<String>) -> Self {
        self.calling_station_id = Some(calling.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

struct JournalSink {
    path: PathBuf,
    file: Mutex<File>,
}

/// Append-only journal writer; a no-op when no path is configured
#[derive(Default)]
pub struct EventJournal {
    sink: Option<JournalSink>,
}

impl EventJournal {
    /// Open (or create) the journal for appending
    pub fn new(path: Option<PathBuf>) -> std::io::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::disabled());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(EventJournal {
            sink: Some(JournalSink {
                path,
                file: Mutex::new(File::from_std(file)),
            }),
        })
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn path(&self) -> Option<&Path> {
        self.sink.as_ref().map(|sink| sink.path.as_path())
    }

    /// Append one entry; failures are logged and never reach the caller
    pub async fn log(&self, entry: JournalEntry) {
        let Some(sink) = &self.sink else {
            return;
        };
        let mut line = match serde_json::to_string(&entry) {
            Ok(json) => json,
            Err(e) => {
                error!(event = ?entry.event_type, "Journal entry not serializable: {}", e);
                return;
            }
        };
        line.push('\n');

        let mut file = sink.file.lock().await;
        let written = async {
            file.write_all(line.as_bytes()).await?;
            file.flush().await
        }
        .await;
        if let Err(e) = written {
            error!(path = %sink.path.display(), "Journal write failed: {}", e);
        }
    }
}

impl std::fmt::Debug for EventJournal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventJournal")
            .field("path", &self.path())
            .finish()
    }
}
