//! Connection targets for the shell socket.
//!
//! The socket scheme mirrors the REST scheme:
//! - `https` → `wss://`
//! - anything else (`http`) → `ws://`

pub mod websocket;

pub use websocket::{connect, MessageChannel, MessageReader, MessageWriter, WsStream};

use srep_core::error::{SrepError, SrepResult};

/// Status a not-yet-provisioned shell answers the upgrade request with.
pub const STATUS_TOO_EARLY: u16 = 425;

/// Sent on every request, REST and WebSocket alike.
pub const USER_AGENT: &str = concat!("srep-rs/", env!("CARGO_PKG_VERSION"));

/// Socket scheme, inferred from the REST scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketScheme {
    Ws,
    Wss,
}

impl SocketScheme {
    pub fn from_http(scheme: &str) -> Self {
        if scheme.eq_ignore_ascii_case("https") {
            Self::Wss
        } else {
            Self::Ws
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ws => "ws",
            Self::Wss => "wss",
        }
    }
}

/// Everything needed for one connection attempt to a play's shell.
#[derive(Debug, Clone)]
pub struct ShellTarget {
    pub url: String,
    pub token: String,
    /// Initial terminal size. Informational only; the relay sends the real
    /// size as its first resize message.
    pub rows: u16,
    pub cols: u16,
}

impl ShellTarget {
    pub fn new(
        http_scheme: &str,
        host: &str,
        session_id: &str,
        token: &str,
        rows: u16,
        cols: u16,
    ) -> SrepResult<Self> {
        Ok(Self {
            url: shell_url(http_scheme, host, session_id)?,
            token: token.to_string(),
            rows,
            cols,
        })
    }
}

/// Build `ws[s]://{host}/plays/{session_id}/shell`.
pub fn shell_url(http_scheme: &str, host: &str, session_id: &str) -> SrepResult<String> {
    let host = host.trim_end_matches('/');
    if host.is_empty() || host.contains("://") {
        return Err(SrepError::InvalidConfig(format!(
            "expected a bare host[:port], got {host:?}"
        )));
    }
    if session_id.is_empty() || session_id.contains('/') {
        return Err(SrepError::Validation(format!("invalid session id: {session_id:?}")));
    }
    let scheme = SocketScheme::from_http(http_scheme);
    Ok(format!("{}://{host}/plays/{session_id}/shell", scheme.as_str()))
}
