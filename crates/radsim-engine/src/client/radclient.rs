//! `radclient` subprocess adapter
//!
//! One process per exchange:
//!
//! ```text
//! radclient -x -r <retries> -t <timeout> <server>:<port> auth|acct <secret>
//! ```
//!
//! The request AVPs go in on stdin and the `-x` transcript comes back on
//! stdout, where [`radsim_proto::radclient::parse_transcript`] reads it.

use super::{Operation, Outcome, RadiusClient};
use async_trait::async_trait;
use radsim_proto::radclient::{encode_request, parse_transcript, TranscriptError};
use radsim_proto::{AcctStatusType, AcctTerminateCause, AttributeSet, AttributeType, PacketCode};
use std::io::ErrorKind;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

/// Attributes that belong to Access-Requests only
const AUTH_ONLY: [AttributeType; 4] = [
    AttributeType::UserPassword,
    AttributeType::ChapPassword,
    AttributeType::ReplyMessage,
    AttributeType::State,
];

#[derive(Debug, Clone)]
pub struct RadclientConfig {
    pub program: PathBuf,
    pub server: String,
    pub secret: String,
    pub auth_port: u16,
    pub acct_port: u16,
    pub retries: u32,
    /// Per-attempt timeout handed to radclient
    pub try_timeout: Duration,
    /// Hard bound on the whole exchange, retries included
    pub exchange_timeout: Duration,
    pub nas_identifier: String,
    /// Encoded into generated Acct-Session-Ids
    pub nas_ip: Ipv4Addr,
}

impl RadclientConfig {
    pub fn new(server: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            program: PathBuf::from("radclient"),
            server: server.into(),
            secret: secret.into(),
            auth_port: 1812,
            acct_port: 1813,
            retries: 3,
            try_timeout: Duration::from_secs(5),
            exchange_timeout: Duration::from_secs(30),
            nas_identifier: "radsim".to_string(),
            nas_ip: Ipv4Addr::LOCALHOST,
        }
    }
}

pub struct RadclientClient {
    config: RadclientConfig,
    counter: AtomicU32,
}

impl RadclientClient {
    /// The session counter starts at a random value so ids stay unique
    /// across invocations that share a NAS address.
    pub fn new(config: RadclientConfig) -> Self {
        Self::with_counter(config, rand::random())
    }

    pub fn with_counter(config: RadclientConfig, start: u32) -> Self {
        Self {
            config,
            counter: AtomicU32::new(start),
        }
    }

    /// 24 uppercase hex digits: NAS address, counter, unix time
    pub fn next_session_id(&self) -> String {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed);
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0);
        format!("{:08X}{:08X}{:08X}", u32::from(self.config.nas_ip), counter, now)
    }

    /// Final attribute list for `operation`, or why it cannot be sent
    fn prepare(&self, operation: Operation, attributes: &AttributeSet) -> Result<AttributeSet, String> {
        let mut request = attributes.clone();

        if !request.contains(AttributeType::NasIdentifier) {
            request.insert(AttributeType::NasIdentifier, self.config.nas_identifier.as_str());
        }

        let status = match operation {
            Operation::Authenticate => {
                if !request.contains(AttributeType::AcctSessionId) {
                    request.insert(AttributeType::AcctSessionId, self.next_session_id());
                }
                return Ok(request);
            }
            Operation::AcctStart => AcctStatusType::Start,
            Operation::AcctInterim => AcctStatusType::InterimUpdate,
            Operation::AcctStop => AcctStatusType::Stop,
        };

        if !request.contains(AttributeType::AcctSessionId) {
            return Err(format!("{} request has no Acct-Session-Id", operation));
        }
        for name in AUTH_ONLY {
            request.remove(name);
        }
        request.insert(AttributeType::AcctStatusType, status.name());
        if status == AcctStatusType::Stop && !request.contains(AttributeType::AcctTerminateCause) {
            request.insert(
                AttributeType::AcctTerminateCause,
                AcctTerminateCause::UserRequest.name(),
            );
        }
        Ok(request)
    }

    fn command(&self, operation: Operation) -> Command {
        let (port, kind) = if operation.is_accounting() {
            (self.config.acct_port, "acct")
        } else {
            (self.config.auth_port, "auth")
        };
        let mut command = Command::new(&self.config.program);
        command
            .arg("-x")
            .arg("-r")
            .arg(self.config.retries.to_string())
            .arg("-t")
            .arg(self.config.try_timeout.as_secs().max(1).to_string())
            .arg(format!("{}:{}", self.config.server, port))
            .arg(kind)
            .arg(&self.config.secret)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }

    async fn run(&self, operation: Operation, request: &AttributeSet) -> Result<Output, String> {
        let mut child = self
            .command(operation)
            .spawn()
            .map_err(|e| format!("cannot run {}: {}", self.config.program.display(), e))?;

        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(encode_request(request).as_bytes()).await {
                Ok(()) => {}
                // radclient gave up before reading; its exit status says why
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!(operation = %operation, "radclient closed stdin early");
                }
                Err(e) => return Err(format!("cannot write request: {}", e)),
            }
        }

        child
            .wait_with_output()
            .await
            .map_err(|e| format!("radclient failed: {}", e))
    }
}

#[async_trait]
impl RadiusClient for RadclientClient {
    async fn exchange(&self, operation: Operation, attributes: &AttributeSet) -> Outcome {
        let request = match self.prepare(operation, attributes) {
            Ok(request) => request,
            Err(reason) => return Outcome::Rejected(reason),
        };
        let session_id = request
            .get(AttributeType::AcctSessionId)
            .unwrap_or_default()
            .to_string();

        debug!(
            operation = %operation,
            server = %self.config.server,
            attributes = %request.redacted(),
            "radclient request"
        );

        let output = match tokio::time::timeout(self.config.exchange_timeout, self.run(operation, &request)).await {
            Err(_) => {
                warn!(operation = %operation, session_id = %session_id, "radclient exceeded exchange timeout");
                return Outcome::Timeout;
            }
            Ok(Err(detail)) => return Outcome::Unreachable(detail),
            Ok(Ok(output)) => output,
        };

        if !output.stderr.is_empty() {
            debug!(stderr = %String::from_utf8_lossy(&output.stderr).trim(), "radclient stderr");
        }

        classify(operation, session_id, &output)
    }
}

/// Map a finished radclient run to an outcome
///
/// A reply in the transcript decides the outcome whatever the exit status.
/// Without one, a request that went out and went unanswered is a timeout,
/// while a failing exit that never sent anything is unreachable.
pub fn classify(operation: Operation, session_id: String, output: &Output) -> Outcome {
    let text = match std::str::from_utf8(&output.stdout) {
        Ok(text) => text,
        Err(e) => return Outcome::Unreachable(format!("radclient output is not UTF-8: {}", e)),
    };

    let transcript = match parse_transcript(text) {
        Ok(transcript) => transcript,
        Err(TranscriptError::NoReply) if output.status.success() || request_sent(text) => {
            return Outcome::Timeout
        }
        Err(TranscriptError::NoReply) => return Outcome::Unreachable(failure_detail(output)),
        Err(e) => return Outcome::Unreachable(e.to_string()),
    };

    let reply = transcript.reply;
    let expected = if operation.is_accounting() {
        PacketCode::AccountingResponse
    } else {
        PacketCode::AccessAccept
    };

    match reply.code {
        code if code == expected => Outcome::accepted(session_id, reply.attributes),
        PacketCode::AccessReject => Outcome::Rejected(
            reply
                .attributes
                .get(AttributeType::ReplyMessage)
                .unwrap_or("Access-Reject")
                .to_string(),
        ),
        PacketCode::AccessChallenge => Outcome::Rejected("challenge not supported".to_string()),
        other => Outcome::Unreachable(format!("unexpected {} for {}", other, operation)),
    }
}

/// Whether the transcript shows a packet leaving for the server
fn request_sent(text: &str) -> bool {
    text.lines().any(|line| {
        let line = line.trim();
        let line = match line.strip_prefix('(').and_then(|rest| rest.split_once(") ")) {
            Some((_, rest)) => rest,
            None => line,
        };
        line.starts_with("Sent ") || line.starts_with("No reply from server")
    })
}

fn failure_detail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    match stderr.lines().map(str::trim).find(|line| !line.is_empty()) {
        Some(line) => format!("radclient {}: {}", output.status, line),
        None => format!("radclient {}", output.status),
    }
}
