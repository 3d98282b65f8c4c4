//! In-memory session table and its JSON Lines encoding
//!
//! The table is the unit the store loads and flushes: one record per line,
//! in insertion order, so an unmodified table renders byte-for-byte the same.

use super::error::{StoreError, StoreResult};
use super::record::SessionRecord;
use chrono::{DateTime, Utc};
use radsim_proto::AcctStatusType;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTable {
    records: Vec<SessionRecord>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode JSON Lines; blank lines are skipped
    pub fn parse(text: &str) -> StoreResult<Self> {
        let mut records = Vec::new();
        for (index, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(line).map_err(|source| StoreError::Corrupt {
                line: index + 1,
                source,
            })?;
            records.push(record);
        }
        Ok(Self { records })
    }

    pub fn render(&self) -> StoreResult<String> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record).map_err(std::io::Error::from)?);
            out.push('\n');
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SessionRecord> {
        self.records.iter()
    }

    pub fn get(&self, session_id: &str) -> Option<&SessionRecord> {
        self.records.iter().find(|r| r.session_id == session_id)
    }

    fn get_mut(&mut self, session_id: &str) -> StoreResult<&mut SessionRecord> {
        self.records
            .iter_mut()
            .find(|r| r.session_id == session_id)
            .ok_or_else(|| StoreError::UnknownSessionId(session_id.to_string()))
    }

    /// Insert a new session with status Start
    pub fn insert(&mut self, mut record: SessionRecord) -> StoreResult<()> {
        if self.get(&record.session_id).is_some() {
            return Err(StoreError::DuplicateSessionId(record.session_id));
        }
        record.status = AcctStatusType::Start;
        record.stopped_at = None;
        self.records.push(record);
        Ok(())
    }

    /// Move a live session forward and restart its deadline at `now`
    pub fn update(
        &mut self,
        session_id: &str,
        new_timeout: u32,
        new_status: AcctStatusType,
        now: DateTime<Utc>,
    ) -> StoreResult<&SessionRecord> {
        let current = self
            .get(session_id)
            .map(|r| r.status)
            .ok_or_else(|| StoreError::UnknownSessionId(session_id.to_string()))?;
        match (current, new_status) {
            (AcctStatusType::Stop, to) | (_, to @ AcctStatusType::Start) => {
                Err(StoreError::InvalidTransition {
                    id: session_id.to_string(),
                    from: current,
                    to,
                })
            }
            (_, AcctStatusType::Stop) => self.stop(session_id, now),
            (_, AcctStatusType::InterimUpdate) => {
                let record = self.get_mut(session_id)?;
                record.status = AcctStatusType::InterimUpdate;
                record.session_timeout = new_timeout;
                record.authenticated_at = now;
                Ok(&*record)
            }
        }
    }

    /// Mark a session stopped; the row stays for reporting
    pub fn stop(&mut self, session_id: &str, now: DateTime<Utc>) -> StoreResult<&SessionRecord> {
        let record = self.get_mut(session_id)?;
        if record.status == AcctStatusType::Stop {
            return Err(StoreError::InvalidTransition {
                id: session_id.to_string(),
                from: AcctStatusType::Stop,
                to: AcctStatusType::Stop,
            });
        }
        record.status = AcctStatusType::Stop;
        record.stopped_at = Some(now);
        Ok(&*record)
    }

    /// Live sessions, earliest deadline first, ties by session id
    pub fn active(&self) -> Vec<&SessionRecord> {
        let mut active: Vec<_> = self.records.iter().filter(|r| r.is_active()).collect();
        active.sort_by(|a, b| {
            a.deadline()
                .cmp(&b.deadline())
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        active
    }

    pub fn active_for_station(&self, user_name: &str, calling_station_id: &str) -> Option<&SessionRecord> {
        self.records.iter().find(|r| {
            r.is_active() && r.user_name == user_name && r.calling_station_id == calling_station_id
        })
    }

    /// Drop stopped rows that ended before `before`; returns how many went
    pub fn prune_stopped(&mut self, before: DateTime<Utc>) -> usize {
        let len = self.records.len();
        self.records.retain(|r| {
            r.is_active() || r.stopped_at.unwrap_or(r.authenticated_at) >= before
        });
        len - self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use radsim_proto::{AccessMethod, NasPortType};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap()
    }

    fn record(id: &str, timeout: u32) -> SessionRecord {
        SessionRecord {
            session_id: id.to_string(),
            method: AccessMethod::Dot1x,
            status: AcctStatusType::Start,
            user_name: "alice".to_string(),
            calling_station_id: format!("02-00-00-00-00-{:02X}", id.len()),
            called_station_id: "06-11-22-33-44-55".to_string(),
            framed_ip_address: "203.1.2.3".parse().unwrap(),
            session_timeout: timeout,
            nas_port_type: NasPortType::Ethernet,
            nas_port_id: "GigabitEthernet1/3".to_string(),
            nas_port: 3,
            nas_identifier: "radsim".to_string(),
            created_at: t0(),
            authenticated_at: t0(),
            class: None,
            stopped_at: None,
        }
    }

    #[test]
    fn test_insert_rejects_duplicates() {
        let mut table = SessionTable::new();
        table.insert(record("S1", 60)).unwrap();
        assert!(matches!(
            table.insert(record("S1", 60)),
            Err(StoreError::DuplicateSessionId(id)) if id == "S1"
        ));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_active_ordered_by_deadline() {
        let mut table = SessionTable::new();
        table.insert(record("A", 500)).unwrap();
        table.insert(record("B", 100)).unwrap();
        table.insert(record("C", 300)).unwrap();

        let timeouts: Vec<_> = table.active().iter().map(|r| r.session_timeout).collect();
        assert_eq!(timeouts, vec![100, 300, 500]);
    }

    #[test]
    fn test_active_ties_broken_by_session_id() {
        let mut table = SessionTable::new();
        table.insert(record("Z", 100)).unwrap();
        table.insert(record("M", 100)).unwrap();
        let ids: Vec<_> = table.active().iter().map(|r| r.session_id.as_str()).collect();
        assert_eq!(ids, vec!["M", "Z"]);
    }

    #[test]
    fn test_update_refreshes_deadline_with_new_timeout() {
        let mut table = SessionTable::new();
        table.insert(record("S1", 60)).unwrap();
        let later = t0() + chrono::Duration::seconds(30);
        let updated = table
            .update("S1", 120, AcctStatusType::InterimUpdate, later)
            .unwrap();
        assert_eq!(updated.status, AcctStatusType::InterimUpdate);
        assert_eq!(updated.deadline(), later + chrono::Duration::seconds(120));
        assert_eq!(updated.created_at, t0());
    }

    #[test]
    fn test_update_on_stopped_is_invalid_for_every_status() {
        let mut table = SessionTable::new();
        table.insert(record("S1", 60)).unwrap();
        table.stop("S1", t0()).unwrap();
        for status in [
            AcctStatusType::Start,
            AcctStatusType::InterimUpdate,
            AcctStatusType::Stop,
        ] {
            assert!(matches!(
                table.update("S1", 60, status, t0()),
                Err(StoreError::InvalidTransition { from: AcctStatusType::Stop, .. })
            ));
        }
    }

    #[test]
    fn test_update_back_to_start_is_invalid() {
        let mut table = SessionTable::new();
        table.insert(record("S1", 60)).unwrap();
        assert!(matches!(
            table.update("S1", 60, AcctStatusType::Start, t0()),
            Err(StoreError::InvalidTransition { to: AcctStatusType::Start, .. })
        ));
    }

    #[test]
    fn test_update_to_stop_stops() {
        let mut table = SessionTable::new();
        table.insert(record("S1", 60)).unwrap();
        let stopped = table.update("S1", 0, AcctStatusType::Stop, t0()).unwrap();
        assert_eq!(stopped.status, AcctStatusType::Stop);
        assert_eq!(stopped.stopped_at, Some(t0()));
        assert!(table.active().is_empty());
    }

    #[test]
    fn test_unknown_session() {
        let mut table = SessionTable::new();
        assert!(matches!(
            table.stop("nope", t0()),
            Err(StoreError::UnknownSessionId(_))
        ));
        assert!(matches!(
            table.update("nope", 1, AcctStatusType::InterimUpdate, t0()),
            Err(StoreError::UnknownSessionId(_))
        ));
    }

    #[test]
    fn test_render_parse_preserves_records() {
        let mut table = SessionTable::new();
        for (i, timeout) in [30, 60, 90, 120].into_iter().enumerate() {
            table.insert(record(&format!("S{i}"), timeout)).unwrap();
        }
        table.stop("S2", t0()).unwrap();

        let text = table.render().unwrap();
        assert_eq!(text.lines().count(), 4);
        let parsed = SessionTable::parse(&text).unwrap();
        assert_eq!(parsed, table);
        assert_eq!(parsed.render().unwrap(), text);
    }

    #[test]
    fn test_parse_reports_corrupt_line() {
        let mut table = SessionTable::new();
        table.insert(record("S1", 60)).unwrap();
        let text = format!("{}\n{{not json\n", table.render().unwrap());
        assert!(matches!(
            SessionTable::parse(&text),
            Err(StoreError::Corrupt { line: 3, .. })
        ));
    }

    #[test]
    fn test_active_for_station_ignores_stopped() {
        let mut table = SessionTable::new();
        let first = record("S1", 60);
        let calling = first.calling_station_id.clone();
        table.insert(first).unwrap();
        table.stop("S1", t0()).unwrap();
        assert!(table.active_for_station("alice", &calling).is_none());

        let mut second = record("S2", 60);
        second.calling_station_id = calling.clone();
        table.insert(second).unwrap();
        assert_eq!(
            table.active_for_station("alice", &calling).map(|r| r.session_id.as_str()),
            Some("S2")
        );
    }

    #[test]
    fn test_prune_stopped() {
        let mut table = SessionTable::new();
        table.insert(record("old", 60)).unwrap();
        table.insert(record("recent", 60)).unwrap();
        table.insert(record("live", 60)).unwrap();
        table.stop("old", t0()).unwrap();
        table.stop("recent", t0() + chrono::Duration::days(3)).unwrap();

        let removed = table.prune_stopped(t0() + chrono::Duration::days(1));
        assert_eq!(removed, 1);
        assert!(table.get("old").is_none());
        assert!(table.get("recent").is_some());
        assert!(table.get("live").is_some());
    }
}
