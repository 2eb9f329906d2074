// ABOUTME: SSH tunnel core: relay dialing, session establishment, terminal, and port relay.
// ABOUTME: Everything above the transport talks to the TunnelDialer/TunnelLink seams.

mod credentials;
mod dial;
mod error;
mod establish;
mod handler;
mod relay;
mod session;
pub mod terminal;

pub use credentials::{Credentials, current_user};
pub use dial::{FailedAuth, SshDialer, SshLink, TunnelDialer, TunnelLink};
pub use error::{AuthFailure, ConnectError, ConnectErrorKind, Error, Result};
pub use establish::{DEFAULT_MAX_RESETS, RetryPolicy, SessionEstablisher};
pub use handler::HostKeyPolicy;
pub use relay::{Direction, PortRelay, RelayError, RelayOutcome, pipe, relay_connection};
pub use session::{CommandOutput, Session};
