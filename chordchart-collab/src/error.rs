//! Error taxonomy surfaced through the session's error channel.
//!
//! Nothing here is returned from the session's mutating calls: failures are
//! emitted to `on_error` subscribers so UI code can render connection,
//! authentication and room state without wrapping every call.

/// Broad class of a [`CollabError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Transport,
    Auth,
    Application,
    Server,
    Fatal,
}

/// Session-level errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CollabError {
    /// Connect failure or refused send. Recovered by reconnecting.
    #[error("Transport error: {0}")]
    Transport(String),
    /// Handshake rejected by the server. Not retried.
    #[error("Authentication failed: {0}")]
    Auth(String),
    /// A call whose preconditions were not met. The call was a no-op.
    #[error("{0}")]
    Application(String),
    /// `error` frame pushed by the server.
    #[error("Server error: {0}")]
    Server(String),
    /// Reconnection gave up after the configured number of attempts.
    #[error("Reconnection abandoned after {attempts} attempts")]
    ReconnectExhausted { attempts: u32 },
    /// The session task is gone.
    #[error("Session closed")]
    SessionClosed,
}

impl CollabError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Transport(_) => ErrorKind::Transport,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Application(_) => ErrorKind::Application,
            Self::Server(_) => ErrorKind::Server,
            Self::ReconnectExhausted { .. } | Self::SessionClosed => ErrorKind::Fatal,
        }
    }

    pub(crate) fn application(message: impl Into<String>) -> Self {
        Self::Application(message.into())
    }
}
