//! Scenario-driven attribute generation
//!
//! Produces a plausible endpoint for each [`Scenario`]: a locally
//! administered MAC, a NAS port within the bounds of its port type and a
//! public-looking IPv4 address. Every randomized value has an override in
//! [`Overrides`], and an explicit override always wins.
//!
//! # Example
//!
//! ```rust
//! use radsim_proto::generator::{AttributeGenerator, GeneratorDefaults, Overrides};
//! use radsim_proto::Scenario;
//! use rand::{rngs::StdRng, SeedableRng};
//!
//! let generator = AttributeGenerator::new(GeneratorDefaults::default());
//! let mut rng = StdRng::seed_from_u64(7);
//! let attrs = generator
//!     .generate(Scenario::Mab, &Overrides::default(), &mut rng)
//!     .unwrap();
//! assert_eq!(attrs.user_name, attrs.calling_station_id);
//! ```

use crate::attributes::{AttributeSet, AttributeType, NasPortType, ServiceType};
use crate::scenario::{Scenario, ScenarioError};
use rand::Rng;
use std::net::Ipv4Addr;

/// Caller-supplied values that replace generated ones
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub username: Option<String>,
    pub password: Option<String>,
    pub calling_station_id: Option<String>,
    pub called_station_id: Option<String>,
    pub nas_port: Option<u32>,
    pub nas_port_id: Option<String>,
    pub session_id: Option<String>,
    pub nas_identifier: Option<String>,
}

impl Overrides {
    fn check(&self) -> Result<(), ScenarioError> {
        let strings = [
            (AttributeType::UserName, &self.username),
            (AttributeType::UserPassword, &self.password),
            (AttributeType::CallingStationId, &self.calling_station_id),
            (AttributeType::CalledStationId, &self.called_station_id),
            (AttributeType::NasPortId, &self.nas_port_id),
            (AttributeType::AcctSessionId, &self.session_id),
            (AttributeType::NasIdentifier, &self.nas_identifier),
        ];
        for (attribute, value) in strings {
            if let Some(value) = value {
                if value.trim().is_empty() {
                    return Err(ScenarioError::InvalidOverride {
                        attribute: attribute.name(),
                        reason: "must not be empty".to_string(),
                    });
                }
            }
        }
        if self.nas_port == Some(0) {
            return Err(ScenarioError::InvalidOverride {
                attribute: AttributeType::NasPort.name(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

/// Fallbacks used when neither an override nor randomness applies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorDefaults {
    pub username: Option<String>,
    pub password: Option<String>,
    pub nas_identifier: String,
    /// SSID appended to the Called-Station-Id of 802.1X wireless sessions
    pub corp_ssid: String,
    /// SSID appended to the Called-Station-Id of MAB wireless sessions
    pub iot_ssid: String,
}

impl Default for GeneratorDefaults {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            nas_identifier: "radsim".to_string(),
            corp_ssid: "corp".to_string(),
            iot_ssid: "iot".to_string(),
        }
    }
}

/// Everything one simulated endpoint presents to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionAttributes {
    pub scenario: Scenario,
    pub user_name: String,
    pub user_password: Option<String>,
    pub calling_station_id: String,
    pub called_station_id: String,
    pub framed_ip_address: Ipv4Addr,
    pub nas_port_type: NasPortType,
    pub nas_port: u32,
    pub nas_port_id: String,
    pub nas_identifier: String,
    pub service_type: Option<ServiceType>,
    pub tunnel_client_endpoint: Option<String>,
    pub acct_session_id: Option<String>,
}

impl SessionAttributes {
    /// Attributes for the Access-Request
    pub fn access_request(&self) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        attrs.insert(AttributeType::UserName, self.user_name.as_str());
        if let Some(password) = &self.user_password {
            attrs.insert(AttributeType::UserPassword, password.as_str());
        }
        if let Some(service_type) = self.service_type {
            attrs.insert(AttributeType::ServiceType, service_type.name());
        }
        self.push_endpoint(&mut attrs);
        attrs
    }

    /// Attributes shared by every Accounting-Request of this session
    ///
    /// Carries no credentials; the accounting status is added per request.
    pub fn accounting_request(&self) -> AttributeSet {
        let mut attrs = AttributeSet::new();
        attrs.insert(AttributeType::UserName, self.user_name.as_str());
        self.push_endpoint(&mut attrs);
        attrs.insert(
            AttributeType::FramedIpAddress,
            self.framed_ip_address.to_string(),
        );
        attrs
    }

    fn push_endpoint(&self, attrs: &mut AttributeSet) {
        attrs.insert(AttributeType::NasPortType, self.nas_port_type.name());
        attrs.insert(AttributeType::NasPort, self.nas_port.to_string());
        attrs.insert(AttributeType::NasPortId, self.nas_port_id.as_str());
        attrs.insert(
            AttributeType::CallingStationId,
            self.calling_station_id.as_str(),
        );
        attrs.insert(
            AttributeType::CalledStationId,
            self.called_station_id.as_str(),
        );
        attrs.insert(AttributeType::NasIdentifier, self.nas_identifier.as_str());
        if let Some(endpoint) = &self.tunnel_client_endpoint {
            attrs.insert(AttributeType::TunnelClientEndpoint, endpoint.as_str());
        }
        if let Some(session_id) = &self.acct_session_id {
            attrs.insert(AttributeType::AcctSessionId, session_id.as_str());
        }
    }
}

/// Maps a scenario and overrides to a complete attribute set
#[derive(Debug, Clone, Default)]
pub struct AttributeGenerator {
    defaults: GeneratorDefaults,
}

impl AttributeGenerator {
    pub fn new(defaults: GeneratorDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &GeneratorDefaults {
        &self.defaults
    }

    pub fn generate<R: Rng>(
        &self,
        scenario: Scenario,
        overrides: &Overrides,
        rng: &mut R,
    ) -> Result<SessionAttributes, ScenarioError> {
        overrides.check()?;

        let method = scenario.method();
        let port_type = scenario.nas_port_type();

        let calling_station_id = match (&overrides.calling_station_id, port_type) {
            (Some(calling), _) => calling.clone(),
            (None, NasPortType::Virtual) => random_public_ipv4(rng).to_string(),
            (None, _) => random_mac(rng),
        };

        let called_station_id = match &overrides.called_station_id {
            Some(called) => called.clone(),
            None => {
                let nas_mac = random_mac(rng);
                match scenario {
                    Scenario::Dot1xWireless => format!("{}:{}", nas_mac, self.defaults.corp_ssid),
                    Scenario::MabWireless => format!("{}:{}", nas_mac, self.defaults.iot_ssid),
                    _ => nas_mac,
                }
            }
        };

        let (user_name, user_password) = if method.needs_password() {
            let user_name = overrides
                .username
                .clone()
                .or_else(|| self.defaults.username.clone())
                .filter(|u| !u.is_empty())
                .ok_or(ScenarioError::MissingCredential {
                    scenario,
                    attribute: AttributeType::UserName.name(),
                })?;
            let password = overrides
                .password
                .clone()
                .or_else(|| self.defaults.password.clone())
                .filter(|p| !p.is_empty())
                .ok_or(ScenarioError::MissingCredential {
                    scenario,
                    attribute: AttributeType::UserPassword.name(),
                })?;
            (user_name, Some(password))
        } else {
            let user_name = overrides
                .username
                .clone()
                .unwrap_or_else(|| calling_station_id.clone());
            (user_name, None)
        };

        let nas_port = overrides
            .nas_port
            .unwrap_or_else(|| random_port(port_type, rng));
        let nas_port_id = match (&overrides.nas_port_id, port_type) {
            (Some(port_id), _) => port_id.clone(),
            (None, NasPortType::Ethernet) => format!("GigabitEthernet1/{}", nas_port),
            (None, _) => calling_station_id.clone(),
        };

        let tunnel_client_endpoint =
            (port_type == NasPortType::Virtual).then(|| calling_station_id.clone());

        Ok(SessionAttributes {
            scenario,
            user_name,
            user_password,
            framed_ip_address: random_public_ipv4(rng),
            nas_port_type: port_type,
            nas_port,
            nas_port_id,
            nas_identifier: overrides
                .nas_identifier
                .clone()
                .unwrap_or_else(|| self.defaults.nas_identifier.clone()),
            service_type: scenario.service_type(),
            tunnel_client_endpoint,
            acct_session_id: overrides.session_id.clone(),
            calling_station_id,
            called_station_id,
        })
    }
}

/// Random locally administered unicast MAC, `AA-BB-CC-DD-EE-FF` style
pub fn random_mac<R: Rng>(rng: &mut R) -> String {
    let mut octets: [u8; 6] = rng.gen();
    octets[0] = (octets[0] & 0b1111_1100) | 0b0000_0010;
    octets
        .iter()
        .map(|o| format!("{:02X}", o))
        .collect::<Vec<_>>()
        .join("-")
}

/// Random IPv4 address outside private, shared, loopback, link-local,
/// multicast, reserved and documentation ranges
pub fn random_public_ipv4<R: Rng>(rng: &mut R) -> Ipv4Addr {
    loop {
        let addr = Ipv4Addr::from(rng.gen::<u32>());
        if is_public(addr) {
            return addr;
        }
    }
}

/// Random NAS-Port within the bounds of the port type
pub fn random_port<R: Rng>(port_type: NasPortType, rng: &mut R) -> u32 {
    rng.gen_range(port_type.port_range())
}

fn is_public(addr: Ipv4Addr) -> bool {
    let [a, b, _, _] = addr.octets();
    let shared = a == 100 && (b & 0b1100_0000) == 64;
    let benchmarking = a == 198 && (b & 0b1111_1110) == 18;
    !(a == 0
        || a >= 224
        || shared
        || benchmarking
        || addr.is_private()
        || addr.is_loopback()
        || addr.is_link_local()
        || addr.is_documentation())
}
