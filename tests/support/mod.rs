// ABOUTME: Test support utilities.
// ABOUTME: Scripted fakes for the dialer, prompt, and directory seams.

#![allow(dead_code)]

pub mod sshd;

use async_trait::async_trait;
use kssh::directory::{Directory, NodeReport, RelayDescriptor, Result as DirectoryResult};
use kssh::prompt::Prompt;
use kssh::ssh::{AuthFailure, ConnectError, Credentials, FailedAuth, TunnelDialer, TunnelLink};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::{Arc, Once};
use tokio::io::DuplexStream;
use tokio::net::TcpStream;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("kssh=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

pub fn relay() -> RelayDescriptor {
    RelayDescriptor::new("relay.example.com", 22, "tunnel").password("relay-secret")
}

/// What the fake target does with the next authentication attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStep {
    Accept,
    Reset,
    Reject,
    Fatal,
}

/// Everything the fake dialer observed, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Dial(u32),
    Open { link: u32, port: u16 },
    Auth { link: u32, password: Option<String> },
    Close(u32),
}

#[derive(Default)]
struct Script {
    auth: VecDeque<AuthStep>,
    events: Vec<Event>,
    next_link: u32,
    dial_error: Option<fn() -> ConnectError>,
    refuse_open: bool,
}

/// Dialer whose inner authentication outcomes are scripted.
#[derive(Clone, Default)]
pub struct ScriptedDialer {
    script: Arc<Mutex<Script>>,
}

impl ScriptedDialer {
    pub fn new(steps: impl IntoIterator<Item = AuthStep>) -> Self {
        let dialer = Self::default();
        dialer.script.lock().auth = steps.into_iter().collect();
        dialer
    }

    pub fn failing_dial(error: fn() -> ConnectError) -> Self {
        let dialer = Self::default();
        dialer.script.lock().dial_error = Some(error);
        dialer
    }

    pub fn refusing_open() -> Self {
        let dialer = Self::default();
        dialer.script.lock().refuse_open = true;
        dialer
    }

    pub fn events(&self) -> Vec<Event> {
        self.script.lock().events.clone()
    }

    pub fn dials(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Dial(_)))
            .count()
    }

    pub fn passwords(&self) -> Vec<Option<String>> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Auth { password, .. } => Some(password),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl TunnelDialer for ScriptedDialer {
    type Link = ScriptedLink;

    async fn dial(&self, _relay: &RelayDescriptor) -> Result<ScriptedLink, ConnectError> {
        let mut script = self.script.lock();
        if let Some(error) = script.dial_error {
            return Err(error());
        }
        script.next_link += 1;
        let id = script.next_link;
        script.events.push(Event::Dial(id));
        Ok(ScriptedLink {
            id,
            script: Arc::clone(&self.script),
        })
    }
}

pub struct ScriptedLink {
    id: u32,
    script: Arc<Mutex<Script>>,
}

/// Stand-in for an authenticated target session.
pub struct FakeSession {
    pub link: u32,
    pub user: String,
}

#[async_trait]
impl TunnelLink for ScriptedLink {
    type Stream = DuplexStream;
    type Session = FakeSession;

    async fn open_forwarded(&mut self, port: u16) -> Result<DuplexStream, ConnectError> {
        let mut script = self.script.lock();
        script.events.push(Event::Open {
            link: self.id,
            port,
        });
        if script.refuse_open {
            return Err(ConnectError::Refused(format!("localhost:{port}")));
        }
        let (ours, _theirs) = tokio::io::duplex(64);
        Ok(ours)
    }

    async fn authenticate(
        self,
        _stream: DuplexStream,
        credentials: &Credentials,
    ) -> Result<FakeSession, FailedAuth<Self>> {
        let step = {
            let mut script = self.script.lock();
            script.events.push(Event::Auth {
                link: self.id,
                password: credentials.password.clone(),
            });
            script.auth.pop_front().unwrap_or(AuthStep::Accept)
        };
        let failure = match step {
            AuthStep::Accept => {
                return Ok(FakeSession {
                    link: self.id,
                    user: credentials.user.clone(),
                });
            }
            AuthStep::Reset => AuthFailure::TransportReset,
            AuthStep::Reject => AuthFailure::Rejected {
                user: credentials.user.clone(),
            },
            AuthStep::Fatal => AuthFailure::Fatal(russh::Error::Inconsistent),
        };
        Err(FailedAuth {
            link: self,
            failure,
        })
    }

    async fn close(self) {
        self.script.lock().events.push(Event::Close(self.id));
    }
}

/// Dialer whose "forwarded port" is a real TCP backend, for relay tests.
#[derive(Clone)]
pub struct BackendDialer {
    backend: std::net::SocketAddr,
    fail_first: Arc<Mutex<u32>>,
}

impl BackendDialer {
    pub fn new(backend: std::net::SocketAddr) -> Self {
        Self {
            backend,
            fail_first: Arc::new(Mutex::new(0)),
        }
    }

    /// Make the next `n` dials fail as unreachable.
    pub fn failing_first(self, n: u32) -> Self {
        *self.fail_first.lock() = n;
        self
    }
}

#[async_trait]
impl TunnelDialer for BackendDialer {
    type Link = BackendLink;

    async fn dial(&self, relay: &RelayDescriptor) -> Result<BackendLink, ConnectError> {
        {
            let mut remaining = self.fail_first.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ConnectError::Unreachable {
                    host: relay.host.clone(),
                    port: relay.port,
                    reason: "scripted failure".to_string(),
                });
            }
        }
        Ok(BackendLink {
            backend: self.backend,
        })
    }
}

pub struct BackendLink {
    backend: std::net::SocketAddr,
}

#[async_trait]
impl TunnelLink for BackendLink {
    type Stream = TcpStream;
    type Session = ();

    async fn open_forwarded(&mut self, _port: u16) -> Result<TcpStream, ConnectError> {
        TcpStream::connect(self.backend)
            .await
            .map_err(|e| ConnectError::Refused(format!("{}: {e}", self.backend)))
    }

    async fn authenticate(
        self,
        _stream: TcpStream,
        _credentials: &Credentials,
    ) -> Result<(), FailedAuth<Self>> {
        Ok(())
    }

    async fn close(self) {}
}

/// Prompt answering from a script and recording what it was asked.
#[derive(Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    pub asked: Mutex<Vec<String>>,
    pub notes: Mutex<Vec<String>>,
}

impl ScriptedPrompt {
    pub fn new<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }

    pub fn notes(&self) -> Vec<String> {
        self.notes.lock().clone()
    }
}

impl Prompt for ScriptedPrompt {
    fn read_line(&self, prompt: &str) -> io::Result<String> {
        self.asked.lock().push(prompt.to_string());
        self.answers
            .lock()
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }

    fn read_secret(&self, prompt: &str) -> io::Result<String> {
        self.read_line(prompt)
    }

    fn notify(&self, message: &str) {
        self.notes.lock().push(message.to_string());
    }
}

/// In-memory directory counting relay lookups.
#[derive(Default)]
pub struct FakeDirectory {
    pub nodes: Vec<NodeReport>,
    pub relays: HashMap<String, RelayDescriptor>,
    pub relay_lookups: Mutex<u32>,
}

impl FakeDirectory {
    pub fn with_nodes(nodes: Vec<NodeReport>) -> Self {
        Self {
            nodes,
            ..Self::default()
        }
    }

    pub fn relay(mut self, descriptor: RelayDescriptor) -> Self {
        self.relays.insert(descriptor.host.clone(), descriptor);
        self
    }
}

#[async_trait]
impl Directory for FakeDirectory {
    async fn find_node(&self, id: &str) -> DirectoryResult<Option<NodeReport>> {
        Ok(self.nodes.iter().find(|n| n.id == id).cloned())
    }

    async fn list_nodes_by_custom_id(&self, custom_id: &str) -> DirectoryResult<Vec<NodeReport>> {
        Ok(self
            .nodes
            .iter()
            .filter(|n| n.custom_id.as_deref() == Some(custom_id))
            .cloned()
            .collect())
    }

    async fn find_relay(&self, hostname: &str) -> DirectoryResult<Option<RelayDescriptor>> {
        *self.relay_lookups.lock() += 1;
        Ok(self.relays.get(hostname).cloned())
    }
}

/// Node report received `age_minutes` before `now`.
pub fn report(
    id: &str,
    custom_id: Option<&str>,
    port: u16,
    now: chrono::DateTime<chrono::Utc>,
    age_minutes: i64,
) -> NodeReport {
    NodeReport {
        id: id.to_string(),
        custom_id: custom_id.map(String::from),
        ssh_server_host: "relay.example.com".to_string(),
        ssh_remote_port: port,
        local_ipv4: "192.168.1.20".to_string(),
        local_ipv6: String::new(),
        adapter: "eth0".to_string(),
        hostname: format!("host-{id}"),
        server_time: (now - chrono::Duration::minutes(age_minutes)).timestamp(),
    }
}
