//! Simulated access scenarios and the access methods they map to

use crate::attributes::{NasPortType, ServiceType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How an endpoint gained network access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessMethod {
    #[serde(rename = "802.1X")]
    Dot1x,
    #[serde(rename = "MAB")]
    Mab,
    #[serde(rename = "VPN")]
    Vpn,
}

impl AccessMethod {
    pub fn name(self) -> &'static str {
        match self {
            AccessMethod::Dot1x => "802.1X",
            AccessMethod::Mab => "MAB",
            AccessMethod::Vpn => "VPN",
        }
    }

    /// Whether the server expects a User-Password with this method
    pub fn needs_password(self) -> bool {
        !matches!(self, AccessMethod::Mab)
    }
}

impl fmt::Display for AccessMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A simulated endpoint type
///
/// Deserializes through [`FromStr`], so configuration files accept the
/// same aliases as the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", try_from = "String")]
pub enum Scenario {
    /// 802.1X on a wired switch port
    Dot1x,
    /// 802.1X on a WLAN
    Dot1xWireless,
    /// MAC Authentication Bypass on a wired switch port
    Mab,
    /// MAC Authentication Bypass on a WLAN
    MabWireless,
    /// Remote access VPN
    Vpn,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Dot1x,
        Scenario::Dot1xWireless,
        Scenario::Mab,
        Scenario::MabWireless,
        Scenario::Vpn,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Scenario::Dot1x => "dot1x",
            Scenario::Dot1xWireless => "dot1x-wireless",
            Scenario::Mab => "mab",
            Scenario::MabWireless => "mab-wireless",
            Scenario::Vpn => "vpn",
        }
    }

    pub fn method(self) -> AccessMethod {
        match self {
            Scenario::Dot1x | Scenario::Dot1xWireless => AccessMethod::Dot1x,
            Scenario::Mab | Scenario::MabWireless => AccessMethod::Mab,
            Scenario::Vpn => AccessMethod::Vpn,
        }
    }

    pub fn nas_port_type(self) -> NasPortType {
        match self {
            Scenario::Dot1x | Scenario::Mab => NasPortType::Ethernet,
            Scenario::Dot1xWireless | Scenario::MabWireless => NasPortType::Wireless80211,
            Scenario::Vpn => NasPortType::Virtual,
        }
    }

    /// Service-Type sent in the Access-Request; VPN concentrators omit it
    pub fn service_type(self) -> Option<ServiceType> {
        match self.method() {
            AccessMethod::Dot1x => Some(ServiceType::FramedUser),
            AccessMethod::Mab => Some(ServiceType::CallCheck),
            AccessMethod::Vpn => None,
        }
    }

    /// Recover the scenario of a stored session
    pub fn from_parts(method: AccessMethod, port_type: NasPortType) -> Self {
        match (method, port_type.is_wireless()) {
            (AccessMethod::Dot1x, false) => Scenario::Dot1x,
            (AccessMethod::Dot1x, true) => Scenario::Dot1xWireless,
            (AccessMethod::Mab, false) => Scenario::Mab,
            (AccessMethod::Mab, true) => Scenario::MabWireless,
            (AccessMethod::Vpn, _) => Scenario::Vpn,
        }
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dot1x" | "dot1x-wired" | "wired-dot1x" | "wired" => Ok(Scenario::Dot1x),
            "dot1x-wireless" | "wireless-dot1x" | "wireless" => Ok(Scenario::Dot1xWireless),
            "mab" | "mab-wired" | "wired-mab" => Ok(Scenario::Mab),
            "mab-wireless" | "wireless-mab" => Ok(Scenario::MabWireless),
            "vpn" => Ok(Scenario::Vpn),
            _ => Err(ScenarioError::InvalidScenario(s.to_string())),
        }
    }
}

impl TryFrom<String> for Scenario {
    type Error = ScenarioError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// Caller mistakes when asking for a scenario's attributes
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScenarioError {
    #[error("unknown scenario: {0}")]
    InvalidScenario(String),

    #[error("{scenario} requires a {attribute}")]
    MissingCredential {
        scenario: Scenario,
        attribute: &'static str,
    },

    #[error("invalid {attribute} override: {reason}")]
    InvalidOverride {
        attribute: &'static str,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_names_parse() {
        for scenario in Scenario::ALL {
            assert_eq!(scenario.name().parse::<Scenario>(), Ok(scenario));
        }
    }

    #[test]
    fn test_aliases() {
        let cases = [
            ("dot1x-wired", Scenario::Dot1x),
            ("wired-dot1x", Scenario::Dot1x),
            ("wired", Scenario::Dot1x),
            ("wireless", Scenario::Dot1xWireless),
            ("wireless-dot1x", Scenario::Dot1xWireless),
            ("mab-wired", Scenario::Mab),
            ("wired-mab", Scenario::Mab),
            ("wireless-mab", Scenario::MabWireless),
            ("VPN", Scenario::Vpn),
        ];
        for (alias, expected) in cases {
            assert_eq!(alias.parse::<Scenario>(), Ok(expected), "alias {alias}");
        }
    }

    #[test]
    fn test_serde_accepts_aliases() {
        let scenarios: Vec<Scenario> =
            serde_json::from_str(r#"["wired", "mab-wired", "wireless-mab", "dot1x-wireless"]"#)
                .unwrap();
        assert_eq!(
            scenarios,
            vec![
                Scenario::Dot1x,
                Scenario::Mab,
                Scenario::MabWireless,
                Scenario::Dot1xWireless
            ]
        );
        assert_eq!(
            serde_json::to_string(&Scenario::MabWireless).unwrap(),
            "\"mab-wireless\""
        );
        assert!(serde_json::from_str::<Scenario>("\"guest\"").is_err());
    }

    #[test]
    fn test_unknown_scenario() {
        assert_eq!(
            "guest".parse::<Scenario>(),
            Err(ScenarioError::InvalidScenario("guest".to_string()))
        );
    }

    #[test]
    fn test_scenario_properties() {
        assert_eq!(Scenario::MabWireless.method(), AccessMethod::Mab);
        assert_eq!(
            Scenario::Dot1xWireless.nas_port_type(),
            NasPortType::Wireless80211
        );
        assert_eq!(Scenario::Vpn.service_type(), None);
        assert_eq!(Scenario::Mab.service_type(), Some(ServiceType::CallCheck));
        assert!(!AccessMethod::Mab.needs_password());
    }

    #[test]
    fn test_from_parts_inverts_scenario() {
        for scenario in Scenario::ALL {
            assert_eq!(
                Scenario::from_parts(scenario.method(), scenario.nas_port_type()),
                scenario
            );
        }
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&Scenario::Dot1xWireless).unwrap();
        assert_eq!(json, "\"dot1x-wireless\"");
        let method = serde_json::to_string(&AccessMethod::Dot1x).unwrap();
        assert_eq!(method, "\"802.1X\"");
    }
}
