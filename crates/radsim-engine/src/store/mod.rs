//! Durable session store
//!
//! Sessions live in a JSON Lines file that is read in full at the start of
//! every operation and rewritten in full on flush. A flush writes a sibling
//! temp file, fsyncs it and renames it over the target, so the file always
//! holds either the complete old table or the complete new one.
//!
//! Every load → mutate → flush sequence runs under the store's async mutex,
//! which serializes timers that share one [`SessionStore`] handle, and under
//! an exclusive advisory lock on `<path>.lock`, which serializes separate
//! handles and separate `radsim` processes on the same file.
//!
//! # Example
//!
//! ```no_run
//! use radsim_engine::store::SessionStore;
//!
//! # async fn demo() -> Result<(), radsim_engine::store::StoreError> {
//! let store = SessionStore::new("radsim.sessions.jsonl");
//! for record in store.active_sessions().await?.iter() {
//!     println!("{} expires at {}", record.session_id, record.deadline());
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod record;
mod table;

pub use error::{StoreError, StoreResult};
pub use record::SessionRecord;
pub use table::SessionTable;

use crate::clock::{Clock, SystemClock};
use chrono::{DateTime, Utc};
use fs4::FileExt;
use radsim_proto::AcctStatusType;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

/// Cloneable handle to the session file
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    path: PathBuf,
    lock: Mutex<()>,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_clock(path, Arc::new(SystemClock))
    }

    pub fn with_clock(path: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                path: path.into(),
                lock: Mutex::new(()),
                clock,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// The clock used to stamp deadlines and stop times
    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.inner.clock)
    }

    /// Acquire the store and read the current table
    ///
    /// Dropping the scope without calling [`StoreScope::flush`] discards
    /// every change made through it.
    pub async fn load(&self) -> StoreResult<StoreScope<'_>> {
        let guard = self.inner.lock.lock().await;
        let file_lock = lock_file(&self.inner.path).await?;
        let table = read_table(&self.inner.path).await?;
        Ok(StoreScope {
            path: &self.inner.path,
            _file_lock: file_lock,
            _guard: guard,
            table,
        })
    }

    /// Read-only copy of the current table
    pub async fn snapshot(&self) -> StoreResult<SessionTable> {
        Ok(self.load().await?.table)
    }

    pub async fn record_start(&self, record: SessionRecord) -> StoreResult<()> {
        let mut scope = self.load().await?;
        scope.table.insert(record)?;
        scope.flush().await
    }

    pub async fn record_update(
        &self,
        session_id: &str,
        new_timeout: u32,
        new_status: AcctStatusType,
    ) -> StoreResult<SessionRecord> {
        let now = self.inner.clock.now();
        let mut scope = self.load().await?;
        let updated = scope
            .table
            .update(session_id, new_timeout, new_status, now)?
            .clone();
        scope.flush().await?;
        Ok(updated)
    }

    pub async fn record_stop(&self, session_id: &str) -> StoreResult<SessionRecord> {
        let now = self.inner.clock.now();
        let mut scope = self.load().await?;
        let stopped = scope.table.stop(session_id, now)?.clone();
        scope.flush().await?;
        Ok(stopped)
    }

    /// Live sessions, earliest deadline first
    pub async fn active_sessions(&self) -> StoreResult<ActiveSessions> {
        let table = self.snapshot().await?;
        let records = table.active().into_iter().cloned().collect();
        Ok(ActiveSessions { records })
    }

    pub async fn get(&self, session_id: &str) -> StoreResult<Option<SessionRecord>> {
        Ok(self.snapshot().await?.get(session_id).cloned())
    }

    /// Every row, stopped ones included, in file order
    pub async fn all_sessions(&self) -> StoreResult<Vec<SessionRecord>> {
        Ok(self.snapshot().await?.iter().cloned().collect())
    }

    pub async fn active_for_station(
        &self,
        user_name: &str,
        calling_station_id: &str,
    ) -> StoreResult<Option<SessionRecord>> {
        Ok(self
            .snapshot()
            .await?
            .active_for_station(user_name, calling_station_id)
            .cloned())
    }

    /// Remove stopped rows that ended before `before`
    pub async fn prune_stopped(&self, before: DateTime<Utc>) -> StoreResult<usize> {
        let mut scope = self.load().await?;
        let removed = scope.table.prune_stopped(before);
        if removed > 0 {
            scope.flush().await?;
        }
        Ok(removed)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("path", &self.inner.path)
            .finish()
    }
}

/// Exclusive, in-memory view of the store between load and flush
pub struct StoreScope<'a> {
    path: &'a Path,
    // Closing the file releases the advisory lock
    _file_lock: File,
    _guard: MutexGuard<'a, ()>,
    table: SessionTable,
}

impl StoreScope<'_> {
    pub fn table(&self) -> &SessionTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut SessionTable {
        &mut self.table
    }

    /// Persist the table and release the store
    pub async fn flush(self) -> StoreResult<()> {
        write_table(self.path, &self.table).await
    }
}

/// Snapshot of the live sessions in deadline order
///
/// Iterating does not consume it, so a sweep can walk it more than once.
#[derive(Debug, Clone, Default)]
pub struct ActiveSessions {
    records: Vec<SessionRecord>,
}

impl ActiveSessions {
    pub fn iter(&self) -> std::slice::Iter<'_, SessionRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&SessionRecord> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl<'a> IntoIterator for &'a ActiveSessions {
    type Item = &'a SessionRecord;
    type IntoIter = std::slice::Iter<'a, SessionRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Block until this process holds `<path>.lock` exclusively
async fn lock_file(path: &Path) -> StoreResult<File> {
    let lock_path = sibling(path, ".lock");
    let file = tokio::task::spawn_blocking(move || -> std::io::Result<File> {
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()?;
        Ok(file)
    })
    .await
    .map_err(std::io::Error::other)??;
    Ok(file)
}

async fn read_table(path: &Path) -> StoreResult<SessionTable> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => SessionTable::parse(&text),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionTable::new()),
        Err(e) => Err(e.into()),
    }
}

async fn write_table(path: &Path, table: &SessionTable) -> StoreResult<()> {
    let text = table.render()?;

    let tmp_path = sibling(path, ".tmp");

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(text.as_bytes()).await?;
    file.sync_all().await?;
    drop(file);
    tokio::fs::rename(&tmp_path, path).await?;

    debug!(path = %path.display(), sessions = table.len(), "Session store flushed");
    Ok(())
}
