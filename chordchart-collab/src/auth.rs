//! Authentication handshake state.
//!
//! `authenticate {token}` goes out once the socket is open; the server
//! answers with `authenticated {user_id}` or `auth_error {message}`.
//! The token outlives individual sockets so an automatic reconnect can
//! authenticate again without the caller's help. Rejections are final
//! until the caller supplies a token again.

use crate::events::AuthenticatedUser;
use crate::protocol::ClientMessage;

#[derive(Debug, Default)]
pub struct AuthHandshake {
    token: Option<String>,
    user_id: Option<String>,
}

impl AuthHandshake {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the credential used by later handshakes.
    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// Start a handshake with the stored token, if there is one.
    pub fn begin(&mut self) -> Option<ClientMessage> {
        let token = self.token.as_ref()?;
        self.user_id = None;
        Some(ClientMessage::authenticate(token.clone()))
    }

    /// Server accepted the credential.
    pub fn accept(&mut self, user_id: String) -> AuthenticatedUser {
        self.user_id = Some(user_id.clone());
        AuthenticatedUser { user_id }
    }

    /// Server rejected the credential. The token is dropped so a reconnect
    /// does not replay it.
    pub fn reject(&mut self) {
        self.user_id = None;
        self.token = None;
    }

    /// Socket went away; the identity must be re-established.
    pub fn reset(&mut self) {
        self.user_id = None;
    }

    /// Forget everything, credential included.
    pub fn clear(&mut self) {
        self.reset();
        self.token = None;
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }
}
