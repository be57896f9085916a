//! Collaboration session: connection state machine and the layers above it.
//!
//! Provides:
//! - Connection lifecycle (connect, disconnect, reconnect with capped backoff)
//! - Authentication handshake gating
//! - Single active room with roster
//! - Operation dispatch with pending-acknowledgement tracking
//! - Cursor broadcast and remote cursor map
//! - Heartbeat latency measurement
//!
//! ```text
//!              connect()                 transport connect
//! Disconnected ─────────► Connecting ─────────────────────► Connected
//!      ▲                   ▲      │ connect_error              │ token?
//!      │ disconnect()      │      ▼                            ▼
//!      │            timer  │  Reconnecting ◄── drop ──── Authenticating
//!      │                   └──────┘   ▲                        │ authenticated
//!      │                              └────── drop ────────── Ready
//! ```
//!
//! The manager never awaits. Method calls, [`TransportEvent`]s and
//! [`ConnectionManager::poll_timers`] are its only inputs, so the driver that
//! owns it decides the threading; see [`crate::runtime`].

use std::time::{Duration, Instant};

use crate::auth::AuthHandshake;
use crate::config::ClientConfig;
use crate::cursor::{CursorPosition, CursorSync};
use crate::error::CollabError;
use crate::events::{AuthenticatedUser, EventHub, Subscription};
use crate::operations::OperationChannel;
use crate::protocol::{
    ClientMessage, CollaborationUpdate, OperationDraft, Participant, ServerMessage, TextPosition,
};
use crate::room::{RoomEvent, RoomInfo, RoomSession};
use crate::timer::{backoff_delay, earliest, ScheduledTask};
use crate::transport::{Transport, TransportEvent};

const JOIN_PRECONDITION: &str = "Cannot join room: not connected or authenticated";
const SEND_NO_ROOM: &str = "Cannot send operation: not in a room";
const SEND_UNAUTHENTICATED: &str = "Cannot send operation: not authenticated";
const CURSOR_NO_ROOM: &str = "Cannot send cursor update: not in a room";
const CURSOR_UNAUTHENTICATED: &str = "Cannot send cursor update: not authenticated";
const AUTH_PRECONDITION: &str = "Cannot authenticate: not connected";

/// Position in the connection state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Authenticating,
    Ready,
    Reconnecting,
}

impl ConnectionState {
    /// Whether the socket is open in this state.
    pub fn is_link_up(self) -> bool {
        matches!(self, Self::Connected | Self::Authenticating | Self::Ready)
    }
}

/// Externally visible session status.
///
/// `authenticated` is never true while `connected` is false.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub connected: bool,
    pub authenticated: bool,
    pub reconnecting: bool,
    pub retry_count: u32,
    /// Round-trip time of the last answered heartbeat.
    pub latency: Option<Duration>,
    pub last_error: Option<String>,
    /// Server clock from the last pong, milliseconds since the Unix epoch.
    pub server_time: Option<i64>,
}

/// One collaboration session over one transport.
pub struct ConnectionManager<T: Transport> {
    config: ClientConfig,
    transport: T,
    state: ConnectionState,
    status: ConnectionStatus,
    /// Last status handed to `on_connection` subscribers
    published: ConnectionStatus,
    auth: AuthHandshake,
    rooms: RoomSession,
    operations: OperationChannel,
    cursors: CursorSync,
    events: EventHub,
    reconnect_timer: ScheduledTask,
    heartbeat_timer: ScheduledTask,
    pong_watchdog: ScheduledTask,
    prune_timer: ScheduledTask,
    ping_sent_at: Option<Instant>,
}

impl<T: Transport> ConnectionManager<T> {
    /// Create a disconnected session.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_events(config, transport, EventHub::new())
    }

    /// Create a session that publishes into an existing hub.
    pub fn with_events(config: ClientConfig, transport: T, events: EventHub) -> Self {
        let retention = config.operation_retention();
        Self {
            config,
            transport,
            state: ConnectionState::Disconnected,
            status: ConnectionStatus::default(),
            published: ConnectionStatus::default(),
            auth: AuthHandshake::new(),
            rooms: RoomSession::new(),
            operations: OperationChannel::new(retention),
            cursors: CursorSync::new(),
            events,
            reconnect_timer: ScheduledTask::idle(),
            heartbeat_timer: ScheduledTask::idle(),
            pong_watchdog: ScheduledTask::idle(),
            prune_timer: ScheduledTask::idle(),
            ping_sent_at: None,
        }
    }

    // ─── Connection ──────────────────────────────────────────────

    /// Open the connection, authenticating with `token` once it is up.
    ///
    /// From `Reconnecting` this cancels the pending retry and tries at once,
    /// keeping the retry count. From `Disconnected` the count starts over.
    pub fn connect(&mut self, token: Option<String>) {
        match self.state {
            ConnectionState::Disconnected => self.status.retry_count = 0,
            ConnectionState::Reconnecting => {}
            state => {
                log::debug!("connect() ignored while {state:?}");
                return;
            }
        }

        self.auth.set_token(token);
        self.reconnect_timer.cancel();
        self.status.reconnecting = false;
        self.open_transport();
        self.publish_status();
    }

    /// Tear the session down. The only way into the terminal `Disconnected` state.
    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            log::debug!("disconnect() ignored: already disconnected");
            return;
        }

        log::info!("Disconnecting from {}", self.config.server_url);
        self.reconnect_timer.cancel();
        if self.state.is_link_up() {
            if let Some(room_id) = self.rooms.current_id().map(str::to_owned) {
                self.transmit(&ClientMessage::leave_room(room_id));
            }
        }
        self.transport.close();
        self.teardown_session();
        self.rooms.set_rejoin(None);
        self.auth.clear();

        self.state = ConnectionState::Disconnected;
        self.status = ConnectionStatus::default();
        self.publish_status();
    }

    /// Disconnect and drop every subscriber.
    pub fn destroy(&mut self) {
        self.disconnect();
        self.events.destroy();
    }

    /// Feed a signal from the transport.
    pub fn handle_transport_event(&mut self, event: TransportEvent) {
        let now = Instant::now();
        match event {
            TransportEvent::Connected => self.on_transport_connected(),
            TransportEvent::Message(text) => self.on_frame(&text, now),
            TransportEvent::Disconnected(reason) => self.on_transport_lost(reason, now),
            TransportEvent::ConnectError(err) => self.on_connect_error(err, now),
        }
    }

    /// Fire every timer due at `now`.
    pub fn poll_timers(&mut self, now: Instant) {
        if self.reconnect_timer.fire_if_due(now) && self.state == ConnectionState::Reconnecting {
            log::debug!("Reconnect attempt {}", self.status.retry_count);
            self.open_transport();
            self.publish_status();
        }

        if self.pong_watchdog.fire_if_due(now) && self.state.is_link_up() {
            log::warn!("Heartbeat unanswered; treating connection as dead");
            self.transport.close();
            self.on_transport_lost("heartbeat timeout".to_string(), now);
        }

        if self.heartbeat_timer.fire_if_due(now) && self.state == ConnectionState::Ready {
            self.send_ping(now);
        }

        if self.prune_timer.fire_if_due(now) {
            let pruned = self.operations.prune(now);
            if pruned > 0 {
                log::debug!("Pruned {pruned} retained operations");
            }
            if self.operations.log_len() > 0 {
                self.prune_timer.schedule(now, self.config.prune_interval());
            }
        }
    }

    /// When [`poll_timers`](Self::poll_timers) next has work to do.
    pub fn next_deadline(&self) -> Option<Instant> {
        earliest([
            self.reconnect_timer.deadline(),
            self.heartbeat_timer.deadline(),
            self.pong_watchdog.deadline(),
            self.prune_timer.deadline(),
        ])
    }

    fn open_transport(&mut self) {
        self.state = ConnectionState::Connecting;
        log::info!("Connecting to {}", self.config.server_url);
        self.transport.open(&self.config.server_url);
    }

    fn on_transport_connected(&mut self) {
        if self.state != ConnectionState::Connecting {
            log::debug!("Ignoring connect signal while {:?}", self.state);
            return;
        }

        log::info!("Connected to {}", self.config.server_url);
        self.reconnect_timer.cancel();
        self.status.connected = true;
        self.status.reconnecting = false;
        self.status.retry_count = 0;
        self.status.last_error = None;
        self.state = ConnectionState::Connected;

        if let Some(message) = self.auth.begin() {
            self.state = ConnectionState::Authenticating;
            self.transmit(&message);
        }
        self.publish_status();
    }

    fn on_transport_lost(&mut self, reason: String, now: Instant) {
        match self.state {
            ConnectionState::Disconnected => {
                log::debug!("Ignoring disconnect signal after disconnect(): {reason}");
                return;
            }
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                self.on_connect_error(reason, now);
                return;
            }
            ConnectionState::Connected
            | ConnectionState::Authenticating
            | ConnectionState::Ready => {}
        }

        log::warn!("Connection lost: {reason}");
        let room_id = self.rooms.current_id().map(str::to_owned);
        self.teardown_session();
        if self.config.rejoin_on_reconnect {
            self.rooms.set_rejoin(room_id);
        }

        self.status.connected = false;
        self.status.authenticated = false;
        self.status.last_error = Some(reason);
        self.schedule_reconnect(now);
        self.publish_status();
    }

    fn on_connect_error(&mut self, err: String, now: Instant) {
        if !matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Reconnecting
        ) {
            log::debug!("Ignoring connect_error while {:?}: {err}", self.state);
            return;
        }

        log::warn!("Connection attempt failed: {err}");
        self.status.last_error = Some(err.clone());
        self.emit_error(CollabError::Transport(err));
        self.schedule_reconnect(now);
        self.publish_status();
    }

    fn schedule_reconnect(&mut self, now: Instant) {
        if let Some(max) = self.config.max_reconnect_attempts {
            if self.status.retry_count >= max {
                log::error!("Giving up after {} reconnect attempts", self.status.retry_count);
                self.reconnect_timer.cancel();
                self.rooms.set_rejoin(None);
                self.state = ConnectionState::Disconnected;
                self.status.reconnecting = false;
                self.emit_error(CollabError::ReconnectExhausted {
                    attempts: self.status.retry_count,
                });
                return;
            }
        }

        let delay = backoff_delay(
            self.config.reconnect_base_delay(),
            self.config.reconnect_max_delay(),
            self.status.retry_count,
        );
        self.status.retry_count = self.status.retry_count.saturating_add(1);
        self.status.reconnecting = true;
        self.state = ConnectionState::Reconnecting;
        self.reconnect_timer.schedule(now, delay);
        log::info!(
            "Reconnecting in {} ms (attempt {})",
            delay.as_millis(),
            self.status.retry_count
        );
    }

    /// Drop everything tied to the current socket.
    fn teardown_session(&mut self) {
        self.heartbeat_timer.cancel();
        self.pong_watchdog.cancel();
        self.prune_timer.cancel();
        self.ping_sent_at = None;
        self.auth.reset();
        self.operations.clear();
        self.cursors.clear();
        if let Some(room) = self.rooms.take() {
            self.events.room.emit(&RoomEvent::Left { room_id: room.id });
        }
    }

    // ─── Heartbeat ───────────────────────────────────────────────

    fn send_ping(&mut self, now: Instant) {
        if self.transmit(&ClientMessage::ping()) {
            self.ping_sent_at = Some(now);
            if let Some(timeout) = self.config.pong_timeout() {
                if !self.pong_watchdog.is_scheduled() {
                    self.pong_watchdog.schedule(now, timeout);
                }
            }
        }
        self.heartbeat_timer.schedule(now, self.config.heartbeat_interval());
    }

    fn on_pong(&mut self, timestamp: i64, now: Instant) {
        if let Some(sent_at) = self.ping_sent_at.take() {
            self.status.latency = Some(now.saturating_duration_since(sent_at));
        }
        self.status.server_time = Some(timestamp);
        self.pong_watchdog.cancel();
        self.publish_status();
    }

    // ─── Authentication ──────────────────────────────────────────

    /// Run the handshake on an already connected session.
    pub fn authenticate(&mut self, token: impl Into<String>) {
        if !self.status.connected {
            self.emit_error(CollabError::application(AUTH_PRECONDITION));
            return;
        }

        self.auth.set_token(Some(token.into()));
        if let Some(message) = self.auth.begin() {
            self.heartbeat_timer.cancel();
            self.pong_watchdog.cancel();
            self.status.authenticated = false;
            self.state = ConnectionState::Authenticating;
            self.transmit(&message);
            self.publish_status();
        }
    }

    fn handle_authenticated(&mut self, user_id: String, now: Instant) {
        if !self.status.connected {
            log::warn!("Dropping authenticated frame while disconnected");
            return;
        }

        let user = self.auth.accept(user_id);
        log::info!("Authenticated as {}", user.user_id);
        self.status.authenticated = true;
        self.status.last_error = None;
        self.state = ConnectionState::Ready;
        self.heartbeat_timer.schedule(now, self.config.heartbeat_interval());
        self.publish_status();
        self.events.authenticated.emit(&user);

        if let Some(room_id) = self.rooms.take_rejoin() {
            log::info!("Re-joining room {room_id} after reconnect");
            self.join_room(&room_id);
        }
    }

    fn on_auth_error(&mut self, message: String) {
        if !self.status.connected {
            log::warn!("Dropping auth_error frame while disconnected");
            return;
        }

        log::warn!("Authentication rejected: {message}");
        self.auth.reject();
        self.rooms.set_rejoin(None);
        // Rooms require an authenticated session
        self.leave_room();
        self.heartbeat_timer.cancel();
        self.pong_watchdog.cancel();
        self.status.authenticated = false;
        self.status.last_error = Some(message.clone());
        self.state = ConnectionState::Connected;
        self.publish_status();
        self.emit_error(CollabError::Auth(message));
    }

    // ─── Rooms ───────────────────────────────────────────────────

    /// Join `room_id`, leaving any other current room first.
    pub fn join_room(&mut self, room_id: &str) {
        if !(self.status.connected && self.status.authenticated) {
            self.emit_error(CollabError::application(JOIN_PRECONDITION));
            return;
        }
        if self.rooms.is_current(room_id) {
            log::debug!("Already in room {room_id}");
            return;
        }
        if self.rooms.current().is_some() {
            self.leave_room();
        }

        if self.transmit(&ClientMessage::join_room(room_id)) {
            log::info!("Joining room {room_id}");
            self.cursors.clear();
            self.rooms.enter(room_id);
        }
    }

    /// Leave the current room. No-op without one.
    pub fn leave_room(&mut self) {
        let Some(room) = self.rooms.take() else {
            log::debug!("leave_room() ignored: no current room");
            return;
        };

        if self.state.is_link_up() {
            self.transmit(&ClientMessage::leave_room(room.id.clone()));
        }
        log::info!("Left room {}", room.id);
        self.operations.clear();
        self.cursors.clear();
        self.prune_timer.cancel();
        self.events.room.emit(&RoomEvent::Left { room_id: room.id });
    }

    pub fn current_room(&self) -> Option<&RoomInfo> {
        self.rooms.current()
    }

    // ─── Operations ──────────────────────────────────────────────

    /// Send an edit to the current room. Returns the generated id, which
    /// stays pending until the server echoes it back.
    pub fn send_operation(&mut self, draft: OperationDraft) -> Option<String> {
        let Some(room_id) = self.rooms.current_id().map(str::to_owned) else {
            self.emit_error(CollabError::application(SEND_NO_ROOM));
            return None;
        };
        let Some(user_id) = self.authenticated_user() else {
            self.emit_error(CollabError::application(SEND_UNAUTHENTICATED));
            return None;
        };

        let operation = self.operations.prepare(draft, &user_id);
        let id = operation.id.clone();
        let message = ClientMessage::CollaborationOperation { room_id, operation };
        if self.transmit(&message) {
            Some(id)
        } else {
            self.operations.withdraw(&id);
            None
        }
    }

    pub fn is_pending(&self, operation_id: &str) -> bool {
        self.operations.is_pending(operation_id)
    }

    pub fn pending_count(&self) -> usize {
        self.operations.pending_count()
    }

    pub fn pending_operations(&self) -> impl Iterator<Item = &str> {
        self.operations.pending_ids()
    }

    /// Updates received within the retention window, oldest first.
    pub fn recent_operations(&self) -> impl Iterator<Item = &CollaborationUpdate> {
        self.operations.recent()
    }

    fn on_collaboration_update(&mut self, update: CollaborationUpdate, now: Instant) {
        if self.operations.receive(update.clone(), now) {
            log::debug!("Operation {} acknowledged", update.operation_id);
        }
        if !self.prune_timer.is_scheduled() {
            self.prune_timer.schedule(now, self.config.prune_interval());
        }
        self.events.operation.emit(&update);
    }

    // ─── Cursors ─────────────────────────────────────────────────

    /// Broadcast the local caret. Sent as-is on every call.
    pub fn send_cursor_update(&mut self, position: TextPosition) {
        let Some(room_id) = self.rooms.current_id().map(str::to_owned) else {
            self.emit_error(CollabError::application(CURSOR_NO_ROOM));
            return;
        };
        if self.authenticated_user().is_none() {
            self.emit_error(CollabError::application(CURSOR_UNAUTHENTICATED));
            return;
        }
        self.transmit(&ClientMessage::CursorUpdate { room_id, position });
    }

    /// Identity to act as, while the handshake holds.
    fn authenticated_user(&self) -> Option<String> {
        if self.status.authenticated {
            self.auth.user_id().map(str::to_owned)
        } else {
            None
        }
    }

    pub fn cursor(&self, user_id: &str) -> Option<&CursorPosition> {
        self.cursors.get(user_id)
    }

    pub fn cursors(&self) -> impl Iterator<Item = &CursorPosition> {
        self.cursors.iter()
    }

    // ─── Inbound frames ──────────────────────────────────────────

    fn on_frame(&mut self, text: &str, now: Instant) {
        let message = match ServerMessage::decode(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping malformed frame: {e}");
                return;
            }
        };
        log::debug!("Received {}", message.event_name());

        match message {
            ServerMessage::Authenticated { user_id } => self.handle_authenticated(user_id, now),
            ServerMessage::AuthError { message } => self.on_auth_error(message),
            ServerMessage::RoomJoined {
                room_id,
                participant_count,
                participants,
            } => self.on_room_joined(&room_id, participant_count, participants),
            ServerMessage::UserJoined { room_id, user } => {
                if self.rooms.add_participant(&room_id, user.clone()) {
                    self.events.room.emit(&RoomEvent::ParticipantJoined {
                        room_id,
                        participant: user,
                    });
                } else {
                    log::warn!("Dropping user_joined for {room_id}: not the current room");
                }
            }
            ServerMessage::UserLeft { room_id, user_id } => {
                if self.rooms.remove_participant(&room_id, &user_id) {
                    self.cursors.remove(&user_id);
                    self.events
                        .room
                        .emit(&RoomEvent::ParticipantLeft { room_id, user_id });
                } else {
                    log::warn!("Dropping user_left for {room_id}: not the current room");
                }
            }
            ServerMessage::CollaborationUpdate(update) => self.on_collaboration_update(update, now),
            ServerMessage::CursorMoved { user_id, position } => {
                if self.rooms.current().is_none() {
                    log::warn!("Dropping cursor_moved for {user_id}: no current room");
                    return;
                }
                let cursor = self.cursors.apply(user_id, position);
                self.events.cursor.emit(&cursor);
            }
            ServerMessage::Pong { timestamp } => self.on_pong(timestamp, now),
            ServerMessage::Error { message } => {
                log::warn!("Server error: {message}");
                self.emit_error(CollabError::Server(message));
            }
        }
    }

    fn on_room_joined(
        &mut self,
        room_id: &str,
        participant_count: usize,
        participants: Vec<Participant>,
    ) {
        match self.rooms.apply_joined(room_id, participants) {
            Some(room) => {
                let room = room.clone();
                log::info!("Joined room {} ({participant_count} participants)", room.id);
                self.events.room.emit(&RoomEvent::Joined(room));
            }
            None => log::warn!("Dropping room_joined for {room_id}: not the current room"),
        }
    }

    // ─── Plumbing ────────────────────────────────────────────────

    fn transmit(&mut self, message: &ClientMessage) -> bool {
        let frame = match message.encode() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("Failed to encode {}: {e}", message.event_name());
                return false;
            }
        };
        match self.transport.send(frame) {
            Ok(()) => true,
            Err(e) => {
                log::warn!("Failed to send {}: {e}", message.event_name());
                self.emit_error(CollabError::Transport(e.to_string()));
                false
            }
        }
    }

    fn emit_error(&self, err: CollabError) {
        self.events.error.emit(&err);
    }

    fn publish_status(&mut self) {
        debug_assert!(self.status.connected || !self.status.authenticated);
        if self.status != self.published {
            self.published = self.status.clone();
            self.events.connection.emit(&self.status);
        }
    }

    // ─── Accessors & subscriptions ───────────────────────────────

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Identity confirmed by the last handshake.
    pub fn user_id(&self) -> Option<&str> {
        self.auth.user_id()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn on_connection<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&ConnectionStatus) + Send + Sync + 'static,
    {
        self.events.on_connection(handler)
    }

    pub fn on_authenticated<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&AuthenticatedUser) + Send + Sync + 'static,
    {
        self.events.on_authenticated(handler)
    }

    pub fn on_error<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollabError) + Send + Sync + 'static,
    {
        self.events.on_error(handler)
    }

    pub fn on_room<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&RoomEvent) + Send + Sync + 'static,
    {
        self.events.on_room(handler)
    }

    pub fn on_operation<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CollaborationUpdate) + Send + Sync + 'static,
    {
        self.events.on_operation(handler)
    }

    pub fn on_cursor<F>(&self, handler: F) -> Subscription
    where
        F: Fn(&CursorPosition) + Send + Sync + 'static,
    {
        self.events.on_cursor(handler)
    }
}
