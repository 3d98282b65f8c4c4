//! Text codec for the FreeRADIUS `radclient` utility
//!
//! Requests are written to radclient's stdin as a single AVP list. With `-x`
//! radclient echoes what it sent and what it received:
//!
//! ```text
//! Sent Access-Request Id 41 from 0.0.0.0:52144 to 10.1.1.5:1812 length 96
//!     User-Name = "alice"
//!     NAS-Port-Type = Ethernet
//! Received Access-Accept Id 41 from 10.1.1.5:1812 to 10.1.1.20:52144 length 71
//!     Session-Timeout = 3600
//!     Class = 0x434143533a30
//! ```
//!
//! A missing `Received` line means the server never answered within
//! radclient's own retry budget.

use crate::attributes::AttributeSet;
use std::fmt;
use thiserror::Error;

/// RADIUS packet codes radclient prints by name (RFC 2865, RFC 2866)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PacketCode {
    /// Access-Request (1)
    AccessRequest,
    /// Access-Accept (2)
    AccessAccept,
    /// Access-Reject (3)
    AccessReject,
    /// Accounting-Request (4)
    AccountingRequest,
    /// Accounting-Response (5)
    AccountingResponse,
    /// Access-Challenge (11)
    AccessChallenge,
}

impl PacketCode {
    pub fn name(self) -> &'static str {
        match self {
            PacketCode::AccessRequest => "Access-Request",
            PacketCode::AccessAccept => "Access-Accept",
            PacketCode::AccessReject => "Access-Reject",
            PacketCode::AccountingRequest => "Accounting-Request",
            PacketCode::AccountingResponse => "Accounting-Response",
            PacketCode::AccessChallenge => "Access-Challenge",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "Access-Request" => Some(PacketCode::AccessRequest),
            "Access-Accept" => Some(PacketCode::AccessAccept),
            "Access-Reject" => Some(PacketCode::AccessReject),
            "Accounting-Request" => Some(PacketCode::AccountingRequest),
            "Accounting-Response" => Some(PacketCode::AccountingResponse),
            "Access-Challenge" => Some(PacketCode::AccessChallenge),
            _ => None,
        }
    }
}

impl fmt::Display for PacketCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One packet as echoed by radclient
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoedPacket {
    pub code: PacketCode,
    pub id: Option<u8>,
    pub attributes: AttributeSet,
}

/// A request and the reply radclient received for it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub request: Option<EchoedPacket>,
    pub reply: EchoedPacket,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("no reply received from server")]
    NoReply,
    #[error("unrecognised packet type in line: {0}")]
    UnknownPacket(String),
}

/// Encode an attribute set for radclient's stdin
pub fn encode_request(attributes: &AttributeSet) -> String {
    let mut line = attributes.to_avp_string();
    line.push('\n');
    line
}

/// Parse radclient `-x` output into the final request and its reply
///
/// Retransmissions repeat the `Sent` block, so only the last one is kept.
pub fn parse_transcript(output: &str) -> Result<Transcript, TranscriptError> {
    enum Section {
        None,
        Request,
        Reply,
    }

    let mut section = Section::None;
    let mut request: Option<EchoedPacket> = None;
    let mut reply: Option<EchoedPacket> = None;

    for raw in output.lines() {
        let line = strip_request_number(raw.trim());
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = line.strip_prefix("Sent ") {
            request = Some(parse_header(rest, line)?);
            section = Section::Request;
            continue;
        }
        if let Some(rest) = line.strip_prefix("Received ") {
            reply = Some(parse_header(rest, line)?);
            section = Section::Reply;
            continue;
        }

        let Some((name, value)) = parse_avp(line) else {
            // Diagnostics such as "Expected Access-Accept got Access-Reject"
            section = Section::None;
            continue;
        };
        let target = match section {
            Section::Request => request.as_mut(),
            Section::Reply => reply.as_mut(),
            Section::None => None,
        };
        if let Some(packet) = target {
            packet.attributes.append(name, value);
        }
    }

    match reply {
        Some(reply) => Ok(Transcript { request, reply }),
        None => Err(TranscriptError::NoReply),
    }
}

/// Newer radclient builds prefix lines with the request number, e.g. `(0) `
fn strip_request_number(line: &str) -> &str {
    if let Some(rest) = line.strip_prefix('(') {
        if let Some((number, tail)) = rest.split_once(") ") {
            if number.chars().all(|c| c.is_ascii_digit()) {
                return tail.trim_start();
            }
        }
    }
    line
}

fn parse_header(rest: &str, line: &str) -> Result<EchoedPacket, TranscriptError> {
    let mut words = rest.split_whitespace();
    let code = words
        .next()
        .and_then(PacketCode::from_name)
        .ok_or_else(|| TranscriptError::UnknownPacket(line.to_string()))?;
    let id = match (words.next(), words.next()) {
        (Some("Id"), Some(id)) => id.parse().ok(),
        _ => None,
    };
    Ok(EchoedPacket {
        code,
        id,
        attributes: AttributeSet::new(),
    })
}

fn parse_avp(line: &str) -> Option<(&str, String)> {
    let (name, value) = line.split_once('=')?;
    let name = name.trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return None;
    }
    Some((name, unquote(value.trim())))
}

fn unquote(value: &str) -> String {
    let inner = value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')));
    match inner {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\'", "'"),
        None => value.to_string(),
    }
}
