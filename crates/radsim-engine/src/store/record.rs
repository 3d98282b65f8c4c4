use chrono::{DateTime, Utc};
use radsim_proto::{
    AccessMethod, AcctStatusType, AttributeSet, AttributeType, NasPortType, Scenario,
    SessionAttributes,
};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// One simulated session as persisted in the store file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Acct-Session-Id assigned during the exchange
    pub session_id: String,
    pub method: AccessMethod,
    pub status: AcctStatusType,
    pub user_name: String,
    /// Client MAC, or source IP for VPN
    pub calling_station_id: String,
    /// NAS MAC, with `:SSID` for wireless
    pub called_station_id: String,
    pub framed_ip_address: Ipv4Addr,
    /// Seconds, as returned by the server
    pub session_timeout: u32,
    pub nas_port_type: NasPortType,
    pub nas_port_id: String,
    pub nas_port: u32,
    pub nas_identifier: String,
    pub created_at: DateTime<Utc>,
    /// Last successful (re)authentication; the deadline counts from here
    pub authenticated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl SessionRecord {
    /// Build the record for a freshly started session
    pub fn started(
        session_id: impl Into<String>,
        attrs: &SessionAttributes,
        session_timeout: u32,
        class: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            method: attrs.scenario.method(),
            status: AcctStatusType::Start,
            user_name: attrs.user_name.clone(),
            calling_station_id: attrs.calling_station_id.clone(),
            called_station_id: attrs.called_station_id.clone(),
            framed_ip_address: attrs.framed_ip_address,
            session_timeout,
            nas_port_type: attrs.nas_port_type,
            nas_port_id: attrs.nas_port_id.clone(),
            nas_port: attrs.nas_port,
            nas_identifier: attrs.nas_identifier.clone(),
            created_at: now,
            authenticated_at: now,
            class,
            stopped_at: None,
        }
    }

    pub fn deadline(&self) -> DateTime<Utc> {
        self.authenticated_at + chrono::Duration::seconds(i64::from(self.session_timeout))
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Strictly past the deadline
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.is_active() && now > self.deadline()
    }

    pub fn scenario(&self) -> Scenario {
        Scenario::from_parts(self.method, self.nas_port_type)
    }

    /// Whole seconds since the session started, for Acct-Session-Time
    pub fn session_time(&self, now: DateTime<Utc>) -> u32 {
        let seconds = (now - self.created_at).num_seconds().max(0);
        u32::try_from(seconds).unwrap_or(u32::MAX)
    }

    /// Rebuild the endpoint this session was created from
    ///
    /// Passwords are never persisted, so the caller supplies one when the
    /// session is re-authenticated.
    pub fn session_attributes(&self, password: Option<String>) -> SessionAttributes {
        let scenario = self.scenario();
        SessionAttributes {
            scenario,
            user_name: self.user_name.clone(),
            user_password: password.filter(|_| self.method.needs_password()),
            calling_station_id: self.calling_station_id.clone(),
            called_station_id: self.called_station_id.clone(),
            framed_ip_address: self.framed_ip_address,
            nas_port_type: self.nas_port_type,
            nas_port: self.nas_port,
            nas_port_id: self.nas_port_id.clone(),
            nas_identifier: self.nas_identifier.clone(),
            service_type: scenario.service_type(),
            tunnel_client_endpoint: (self.nas_port_type == NasPortType::Virtual)
                .then(|| self.calling_station_id.clone()),
            acct_session_id: Some(self.session_id.clone()),
        }
    }

    /// Attributes for this session's Accounting-Requests, Class included
    pub fn accounting_attributes(&self) -> AttributeSet {
        let mut attrs = self.session_attributes(None).accounting_request();
        if let Some(class) = &self.class {
            attrs.insert(AttributeType::Class, class.as_str());
        }
        attrs
    }
}
