use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// RADIUS attributes the simulator sends or reads, by RFC number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName,
    /// User-Password (2) - RFC 2865
    UserPassword,
    /// CHAP-Password (3) - RFC 2865
    ChapPassword,
    /// NAS-Port (5) - RFC 2865
    NasPort,
    /// Service-Type (6) - RFC 2865
    ServiceType,
    /// Framed-IP-Address (8) - RFC 2865
    FramedIpAddress,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage,
    /// State (24) - RFC 2865
    State,
    /// Class (25) - RFC 2865
    Class,
    /// Session-Timeout (27) - RFC 2865
    SessionTimeout,
    /// Called-Station-Id (30) - RFC 2865
    CalledStationId,
    /// Calling-Station-Id (31) - RFC 2865
    CallingStationId,
    /// NAS-Identifier (32) - RFC 2865
    NasIdentifier,
    /// Acct-Status-Type (40) - RFC 2866
    AcctStatusType,
    /// Acct-Session-Id (44) - RFC 2866
    AcctSessionId,
    /// Acct-Session-Time (46) - RFC 2866
    AcctSessionTime,
    /// Acct-Terminate-Cause (49) - RFC 2866
    AcctTerminateCause,
    /// NAS-Port-Type (61) - RFC 2865
    NasPortType,
    /// Tunnel-Client-Endpoint (66) - RFC 2868
    TunnelClientEndpoint,
    /// NAS-Port-Id (87) - RFC 2869
    NasPortId,
}

impl AttributeType {
    /// Dictionary name as radclient prints and parses it
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::UserName => "User-Name",
            AttributeType::UserPassword => "User-Password",
            AttributeType::ChapPassword => "CHAP-Password",
            AttributeType::NasPort => "NAS-Port",
            AttributeType::ServiceType => "Service-Type",
            AttributeType::FramedIpAddress => "Framed-IP-Address",
            AttributeType::ReplyMessage => "Reply-Message",
            AttributeType::State => "State",
            AttributeType::Class => "Class",
            AttributeType::SessionTimeout => "Session-Timeout",
            AttributeType::CalledStationId => "Called-Station-Id",
            AttributeType::CallingStationId => "Calling-Station-Id",
            AttributeType::NasIdentifier => "NAS-Identifier",
            AttributeType::AcctStatusType => "Acct-Status-Type",
            AttributeType::AcctSessionId => "Acct-Session-Id",
            AttributeType::AcctSessionTime => "Acct-Session-Time",
            AttributeType::AcctTerminateCause => "Acct-Terminate-Cause",
            AttributeType::NasPortType => "NAS-Port-Type",
            AttributeType::TunnelClientEndpoint => "Tunnel-Client-Endpoint",
            AttributeType::NasPortId => "NAS-Port-Id",
        }
    }
}

impl AsRef<str> for AttributeType {
    fn as_ref(&self) -> &str {
        self.name()
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// NAS-Port-Type values (RFC 2865 Section 5.41)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NasPortType {
    /// Virtual (5) - VPN tunnel
    #[serde(rename = "Virtual")]
    Virtual,
    /// Ethernet (15) - wired switch port
    #[serde(rename = "Ethernet")]
    Ethernet,
    /// Wireless - IEEE 802.11 (19)
    #[serde(rename = "Wireless-802.11")]
    Wireless80211,
}

impl NasPortType {
    pub fn name(self) -> &'static str {
        match self {
            NasPortType::Virtual => "Virtual",
            NasPortType::Ethernet => "Ethernet",
            NasPortType::Wireless80211 => "Wireless-802.11",
        }
    }

    /// NAS-Port numbers a real NAS of this kind would hand out
    pub fn port_range(self) -> RangeInclusive<u32> {
        match self {
            NasPortType::Ethernet => 1..=48,
            NasPortType::Wireless80211 => 1..=1000,
            NasPortType::Virtual => 1..=10000,
        }
    }

    pub fn is_wireless(self) -> bool {
        matches!(self, NasPortType::Wireless80211)
    }
}

impl fmt::Display for NasPortType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Service-Type values (RFC 2865 Section 5.6)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServiceType {
    /// Framed (2) - 802.1X and VPN users
    #[serde(rename = "Framed-User")]
    FramedUser,
    /// Call Check (10) - MAC Authentication Bypass
    #[serde(rename = "Call-Check")]
    CallCheck,
}

impl ServiceType {
    pub fn name(self) -> &'static str {
        match self {
            ServiceType::FramedUser => "Framed-User",
            ServiceType::CallCheck => "Call-Check",
        }
    }
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
