//! Session scenarios driven without a network.
//!
//! A recording transport captures every outbound frame; inbound frames and
//! socket signals are injected directly, and timers are advanced by handing
//! `poll_timers` the next deadline.

use chordchart_collab::protocol::{ClientMessage, OperationDraft, OperationKind, TextPosition};
use chordchart_collab::timer::backoff_delay;
use chordchart_collab::{
    ClientConfig, CollabError, ConnectionManager, ConnectionState, ConnectionStatus, ErrorKind,
    RoomEvent, Transport, TransportError, TransportEvent,
};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Frames the session handed to the socket, shared with the test body.
#[derive(Clone, Default)]
struct RecordingTransport {
    frames: Arc<Mutex<Vec<ClientMessage>>>,
    opens: Arc<AtomicUsize>,
    open: bool,
}

impl RecordingTransport {
    fn sent(&self) -> Vec<ClientMessage> {
        self.frames.lock().clone()
    }

    fn last(&self) -> Option<ClientMessage> {
        self.frames.lock().last().cloned()
    }
}

impl Transport for RecordingTransport {
    fn open(&mut self, _url: &str) {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open = true;
    }

    fn send(&mut self, frame: String) -> Result<(), TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        self.frames.lock().push(ClientMessage::decode(&frame).unwrap());
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }
}

type Session = ConnectionManager<RecordingTransport>;

fn session() -> (Session, RecordingTransport) {
    let transport = RecordingTransport::default();
    (ConnectionManager::new(ClientConfig::default(), transport.clone()), transport)
}

fn deliver(client: &mut Session, frame: serde_json::Value) {
    client.handle_transport_event(TransportEvent::Message(frame.to_string()));
}

fn collect_errors(client: &Session) -> Arc<Mutex<Vec<CollabError>>> {
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    let _ = client.on_error(move |err| sink.lock().push(err.clone()));
    errors
}

fn collect_rooms(client: &Session) -> Arc<Mutex<Vec<RoomEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let _ = client.on_room(move |event| sink.lock().push(event.clone()));
    events
}

fn connected(client: &mut Session) {
    client.connect(None);
    client.handle_transport_event(TransportEvent::Connected);
}

fn authenticated(client: &mut Session) {
    connected(client);
    client.authenticate("tok");
    deliver(client, json!({"event": "authenticated", "data": {"user_id": "u1"}}));
}

fn in_room(client: &mut Session, room_id: &str) {
    authenticated(client);
    client.join_room(room_id);
    deliver(
        client,
        json!({"event": "room_joined", "data": {
            "room_id": room_id,
            "participant_count": 2,
            "participants": [{"user_id": "u1"}, {"user_id": "u2", "username": "Bea"}]
        }}),
    );
}

// ─── Connection ──────────────────────────────────────────────────

#[test]
fn test_connect_reports_connected() {
    let (mut client, _) = session();
    let statuses = Arc::new(Mutex::new(Vec::<ConnectionStatus>::new()));
    let sink = statuses.clone();
    let _sub = client.on_connection(move |s| sink.lock().push(s.clone()));

    connected(&mut client);

    assert!(client.status().connected);
    assert_eq!(client.state(), ConnectionState::Connected);
    let statuses = statuses.lock();
    assert_eq!(statuses.len(), 1);
    assert!(statuses[0].connected && !statuses[0].authenticated);
}

#[test]
fn test_authenticate_then_authenticated() {
    let (mut client, transport) = session();
    let user = Arc::new(Mutex::new(None));
    let sink = user.clone();
    let _sub = client.on_authenticated(move |u| *sink.lock() = Some(u.user_id.clone()));

    connected(&mut client);
    client.authenticate("tok");
    assert_eq!(client.state(), ConnectionState::Authenticating);
    assert_eq!(transport.last(), Some(ClientMessage::authenticate("tok")));

    deliver(&mut client, json!({"event": "authenticated", "data": {"user_id": "u1"}}));
    assert!(client.status().authenticated);
    assert_eq!(client.state(), ConnectionState::Ready);
    assert_eq!(user.lock().as_deref(), Some("u1"));
}

#[test]
fn test_authenticate_while_disconnected_is_refused() {
    let (mut client, transport) = session();
    let errors = collect_errors(&client);

    client.authenticate("tok");
    assert!(transport.sent().is_empty());
    assert_eq!(errors.lock()[0].kind(), ErrorKind::Application);
}

#[test]
fn test_auth_error_leaves_session_connected() {
    let (mut client, _) = session();
    let errors = collect_errors(&client);
    connected(&mut client);
    client.authenticate("expired");

    deliver(&mut client, json!({"event": "auth_error", "data": {"message": "Token expired"}}));

    let status = client.status();
    assert!(status.connected);
    assert!(!status.authenticated);
    assert_eq!(status.last_error.as_deref(), Some("Token expired"));
    assert_eq!(client.state(), ConnectionState::Connected);
    assert_eq!(errors.lock().as_slice(), &[CollabError::Auth("Token expired".into())]);
}

#[test]
fn test_drop_while_ready_schedules_retry() {
    let (mut client, _) = session();
    authenticated(&mut client);

    client.handle_transport_event(TransportEvent::Disconnected("transport close".into()));

    let status = client.status();
    assert!(status.reconnecting);
    assert_eq!(status.retry_count, 1);
    assert!(!status.connected && !status.authenticated);
    assert_eq!(status.last_error.as_deref(), Some("transport close"));
    assert_eq!(client.state(), ConnectionState::Reconnecting);
}

#[test]
fn test_three_connect_errors() {
    let (mut client, _) = session();
    let errors = collect_errors(&client);
    client.connect(None);
    for _ in 0..3 {
        client.handle_transport_event(TransportEvent::ConnectError("ECONNREFUSED".into()));
    }

    assert_eq!(client.status().retry_count, 3);
    assert!(client.status().reconnecting);
    assert_eq!(errors.lock().len(), 3);
    assert!(errors.lock().iter().all(|e| e.kind() == ErrorKind::Transport));
}

#[test]
fn test_retry_delays_double_until_capped() {
    let (mut client, transport) = session();
    client.connect(None);

    let mut delays = Vec::new();
    for _ in 0..8 {
        client.handle_transport_event(TransportEvent::ConnectError("refused".into()));
        let scheduled_from = std::time::Instant::now();
        let deadline = client.next_deadline().unwrap();
        delays.push(deadline.saturating_duration_since(scheduled_from));
        client.poll_timers(deadline);
        assert_eq!(client.state(), ConnectionState::Connecting);
    }

    assert_eq!(transport.opens.load(Ordering::SeqCst), 9);
    let expected: Vec<u64> = vec![1_000, 2_000, 4_000, 8_000, 16_000, 30_000, 30_000, 30_000];
    for (delay, expected_ms) in delays.iter().zip(expected) {
        let ms = delay.as_millis() as u64;
        // Deadline was taken just before `now`, so allow for a little slack
        assert!(ms <= expected_ms && ms + 50 >= expected_ms, "{ms} vs {expected_ms}");
    }
}

#[test]
fn test_successful_connect_resets_backoff() {
    let (mut client, _) = session();
    client.connect(None);
    client.handle_transport_event(TransportEvent::ConnectError("refused".into()));
    client.handle_transport_event(TransportEvent::ConnectError("refused".into()));
    let deadline = client.next_deadline().unwrap();
    client.poll_timers(deadline);

    client.handle_transport_event(TransportEvent::Connected);
    let status = client.status();
    assert_eq!(status.retry_count, 0);
    assert!(!status.reconnecting);
    assert!(status.last_error.is_none());
}

#[test]
fn test_connect_during_backoff_retries_immediately() {
    let (mut client, transport) = session();
    client.connect(None);
    client.handle_transport_event(TransportEvent::ConnectError("refused".into()));
    assert_eq!(client.state(), ConnectionState::Reconnecting);

    client.connect(None);
    assert_eq!(client.state(), ConnectionState::Connecting);
    assert_eq!(transport.opens.load(Ordering::SeqCst), 2);
    assert!(client.next_deadline().is_none());
}

#[test]
fn test_retry_ceiling_gives_up() {
    let transport = RecordingTransport::default();
    let mut config = ClientConfig::default();
    config.max_reconnect_attempts = Some(2);
    let mut client = ConnectionManager::new(config, transport);
    let errors = collect_errors(&client);

    client.connect(None);
    for _ in 0..3 {
        client.handle_transport_event(TransportEvent::ConnectError("refused".into()));
    }

    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.status().reconnecting);
    assert!(client.next_deadline().is_none());
    assert_eq!(
        errors.lock().last(),
        Some(&CollabError::ReconnectExhausted { attempts: 2 })
    );
}

#[test]
fn test_connect_after_giving_up_starts_fresh() {
    let transport = RecordingTransport::default();
    let mut config = ClientConfig::default();
    config.max_reconnect_attempts = Some(2);
    let mut client = ConnectionManager::new(config, transport);
    let errors = collect_errors(&client);

    client.connect(None);
    for _ in 0..3 {
        client.handle_transport_event(TransportEvent::ConnectError("refused".into()));
    }
    assert_eq!(client.state(), ConnectionState::Disconnected);

    client.connect(None);
    assert_eq!(client.status().retry_count, 0);
    client.handle_transport_event(TransportEvent::ConnectError("refused".into()));

    assert_eq!(client.state(), ConnectionState::Reconnecting);
    assert_eq!(client.status().retry_count, 1);
    let exhausted = errors
        .lock()
        .iter()
        .filter(|e| matches!(e, CollabError::ReconnectExhausted { .. }))
        .count();
    assert_eq!(exhausted, 1);

    // First retry of the fresh run waits the base delay, not the cap
    let wait = client
        .next_deadline()
        .unwrap()
        .saturating_duration_since(std::time::Instant::now());
    assert!(wait <= Duration::from_millis(1_000));
}

#[test]
fn test_pong_timeout_forces_reconnect() {
    let transport = RecordingTransport::default();
    let mut config = ClientConfig::default();
    config.pong_timeout_ms = Some(5_000);
    let mut client = ConnectionManager::new(config, transport);
    authenticated(&mut client);

    let heartbeat = client.next_deadline().unwrap();
    client.poll_timers(heartbeat);
    assert_eq!(client.state(), ConnectionState::Ready);

    let watchdog = client.next_deadline().unwrap();
    assert_eq!(watchdog, heartbeat + Duration::from_secs(5));
    client.poll_timers(watchdog);

    assert_eq!(client.state(), ConnectionState::Reconnecting);
    assert_eq!(client.status().last_error.as_deref(), Some("heartbeat timeout"));
}

#[test]
fn test_pong_records_latency() {
    let (mut client, transport) = session();
    authenticated(&mut client);

    let heartbeat = client.next_deadline().unwrap();
    client.poll_timers(heartbeat);
    assert_eq!(transport.last(), Some(ClientMessage::ping()));

    deliver(&mut client, json!({"event": "pong", "data": {"timestamp": 1_700_000_000_123i64}}));
    assert!(client.status().latency.is_some());
    assert_eq!(client.status().server_time, Some(1_700_000_000_123));
}

#[test]
fn test_stale_disconnect_after_disconnect_is_ignored() {
    let (mut client, _) = session();
    authenticated(&mut client);
    client.disconnect();

    client.handle_transport_event(TransportEvent::Disconnected("io client disconnect".into()));
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert_eq!(client.status(), &ConnectionStatus::default());
    assert!(client.next_deadline().is_none());
}

#[test]
fn test_connected_tracks_latest_signal() {
    let (mut client, _) = session();
    client.connect(None);
    let signals = [true, false, true, false, false, true];

    for up in signals {
        if up {
            // A drop leaves the session in backoff; skip the wait
            if client.state() == ConnectionState::Reconnecting {
                let deadline = client.next_deadline().unwrap();
                client.poll_timers(deadline);
            }
            client.handle_transport_event(TransportEvent::Connected);
        } else {
            client.handle_transport_event(TransportEvent::Disconnected("transport close".into()));
        }
        assert_eq!(client.status().connected, up);
    }
}

// ─── Rooms ───────────────────────────────────────────────────────

#[test]
fn test_join_before_authentication_is_refused() {
    let (mut client, transport) = session();
    let errors = collect_errors(&client);
    connected(&mut client);

    client.join_room("song123");

    assert!(client.current_room().is_none());
    assert!(transport.sent().is_empty());
    assert_eq!(
        errors.lock().as_slice(),
        &[CollabError::Application(
            "Cannot join room: not connected or authenticated".into()
        )]
    );
}

#[test]
fn test_room_joined_replaces_roster() {
    let (mut client, _) = session();
    let rooms = collect_rooms(&client);
    in_room(&mut client, "song123");

    let room = client.current_room().unwrap();
    assert_eq!(room.id, "song123");
    assert_eq!(room.participants.len(), 2);
    assert_eq!(room.participant("u2").unwrap().username.as_deref(), Some("Bea"));
    assert!(matches!(rooms.lock().as_slice(), [RoomEvent::Joined(r)] if r.id == "song123"));
}

#[test]
fn test_join_same_room_is_noop() {
    let (mut client, transport) = session();
    in_room(&mut client, "song123");
    let before = transport.sent().len();

    client.join_room("song123");
    assert_eq!(transport.sent().len(), before);
}

#[test]
fn test_switching_rooms_leaves_first() {
    let (mut client, transport) = session();
    let rooms = collect_rooms(&client);
    in_room(&mut client, "song123");

    client.join_room("song456");

    let sent = transport.sent();
    assert_eq!(
        &sent[sent.len() - 2..],
        &[ClientMessage::leave_room("song123"), ClientMessage::join_room("song456")]
    );
    assert_eq!(client.current_room().unwrap().id, "song456");
    assert!(rooms
        .lock()
        .contains(&RoomEvent::Left { room_id: "song123".into() }));
}

#[test]
fn test_participant_updates_patch_roster() {
    let (mut client, _) = session();
    let rooms = collect_rooms(&client);
    in_room(&mut client, "song123");
    deliver(&mut client, json!({"event": "cursor_moved", "data": {"user_id": "u2", "position": {"line": 1, "column": 1}}}));

    deliver(&mut client, json!({"event": "user_joined", "data": {"room_id": "song123", "user": {"user_id": "u3"}}}));
    assert!(client.current_room().unwrap().participant("u3").is_some());

    deliver(&mut client, json!({"event": "user_left", "data": {"room_id": "song123", "user_id": "u2"}}));
    assert!(client.current_room().unwrap().participant("u2").is_none());
    assert!(client.cursor("u2").is_none());

    let events = rooms.lock();
    assert!(events.contains(&RoomEvent::ParticipantLeft {
        room_id: "song123".into(),
        user_id: "u2".into()
    }));
}

#[test]
fn test_room_joined_for_unknown_room_is_dropped() {
    let (mut client, _) = session();
    let rooms = collect_rooms(&client);
    authenticated(&mut client);
    client.join_room("song123");

    deliver(&mut client, json!({"event": "room_joined", "data": {"room_id": "other", "participants": []}}));
    assert!(rooms.lock().is_empty());
    assert_eq!(client.current_room().unwrap().id, "song123");
}

#[test]
fn test_rejected_reauth_leaves_room() {
    let (mut client, transport) = session();
    let errors = collect_errors(&client);
    let rooms = collect_rooms(&client);
    in_room(&mut client, "song123");

    client.authenticate("tok2");
    deliver(&mut client, json!({"event": "auth_error", "data": {"message": "Token revoked"}}));

    assert!(!client.status().authenticated);
    assert!(client.current_room().is_none());
    assert_eq!(transport.last(), Some(ClientMessage::leave_room("song123")));
    assert_eq!(
        rooms.lock().last(),
        Some(&RoomEvent::Left { room_id: "song123".into() })
    );

    let before = transport.sent().len();
    client.send_cursor_update(TextPosition::new(1, 1));
    assert!(client.send_operation(OperationDraft::insert(0, "x")).is_none());
    assert_eq!(transport.sent().len(), before);

    let errors = errors.lock();
    assert_eq!(errors[0], CollabError::Auth("Token revoked".into()));
    assert!(errors[1..].iter().all(|e| e.kind() == ErrorKind::Application));
    assert_eq!(errors.len(), 3);
}

#[test]
fn test_send_while_reauthenticating_is_refused() {
    let (mut client, transport) = session();
    let errors = collect_errors(&client);
    in_room(&mut client, "song123");
    client.authenticate("tok2");
    let before = transport.sent().len();

    assert!(client.send_operation(OperationDraft::insert(0, "x")).is_none());
    client.send_cursor_update(TextPosition::new(2, 2));

    assert_eq!(transport.sent().len(), before);
    assert_eq!(
        errors.lock().as_slice(),
        &[
            CollabError::Application("Cannot send operation: not authenticated".into()),
            CollabError::Application("Cannot send cursor update: not authenticated".into()),
        ]
    );
}

#[test]
fn test_leave_room_is_idempotent() {
    let (mut client, transport) = session();
    in_room(&mut client, "song123");

    client.leave_room();
    client.leave_room();

    let leaves = transport
        .sent()
        .into_iter()
        .filter(|m| matches!(m, ClientMessage::LeaveRoom { .. }))
        .count();
    assert_eq!(leaves, 1);
    assert!(client.current_room().is_none());
}

// ─── Operations ──────────────────────────────────────────────────

#[test]
fn test_send_operation_tracks_pending_until_echo() {
    let (mut client, transport) = session();
    in_room(&mut client, "song123");

    let id = client.send_operation(OperationDraft::insert(10, "hello")).unwrap();
    assert!(client.is_pending(&id));

    match transport.last() {
        Some(ClientMessage::CollaborationOperation { room_id, operation }) => {
            assert_eq!(room_id, "song123");
            assert_eq!(operation.id, id);
            assert_eq!(operation.kind, OperationKind::Insert);
            assert_eq!(operation.position, 10);
            assert_eq!(operation.content.as_deref(), Some("hello"));
            assert_eq!(operation.user_id, "u1");
        }
        other => panic!("expected collaboration_operation, got {other:?}"),
    }

    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    let _sub = client.on_operation(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    deliver(
        &mut client,
        json!({"event": "collaboration_update", "data": {
            "operation_id": id, "user_id": "u1", "timestamp": 1,
            "operation": {"id": id, "type": "insert", "position": 10, "content": "hello", "user_id": "u1", "timestamp": 1}
        }}),
    );
    assert!(!client.is_pending(&id));
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    assert_eq!(client.recent_operations().count(), 1);
}

#[test]
fn test_operation_ids_are_unique() {
    let (mut client, _) = session();
    in_room(&mut client, "song123");

    let mut ids = std::collections::HashSet::new();
    for i in 0..100 {
        let id = client.send_operation(OperationDraft::delete(i, 1)).unwrap();
        assert!(ids.insert(id));
    }
    assert_eq!(client.pending_count(), 100);
}

#[test]
fn test_send_operation_without_room() {
    let (mut client, transport) = session();
    let errors = collect_errors(&client);
    authenticated(&mut client);
    let before = transport.sent().len();

    assert!(client.send_operation(OperationDraft::insert(0, "x")).is_none());
    assert_eq!(transport.sent().len(), before);
    assert_eq!(errors.lock()[0].kind(), ErrorKind::Application);
}

#[test]
fn test_remote_operation_is_forwarded() {
    let (mut client, _) = session();
    in_room(&mut client, "song123");
    let mine = client.send_operation(OperationDraft::replace(0, 2, "G")).unwrap();
    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    let _sub = client.on_operation(move |u| sink.lock().push(u.operation_id.clone()));

    deliver(
        &mut client,
        json!({"event": "collaboration_update", "data": {
            "operation_id": "remote-1", "user_id": "u2", "timestamp": 5,
            "operation": {"id": "remote-1", "type": "delete", "position": 3, "length": 1, "user_id": "u2", "timestamp": 5}
        }}),
    );

    assert_eq!(received.lock().as_slice(), &["remote-1".to_string()]);
    assert!(client.is_pending(&mine));
}

#[test]
fn test_disconnect_clears_pending() {
    let (mut client, _) = session();
    let rooms = collect_rooms(&client);
    in_room(&mut client, "song123");
    client.send_operation(OperationDraft::insert(0, "x")).unwrap();

    client.handle_transport_event(TransportEvent::Disconnected("ping timeout".into()));

    assert_eq!(client.pending_count(), 0);
    assert!(client.current_room().is_none());
    assert_eq!(
        rooms.lock().last(),
        Some(&RoomEvent::Left { room_id: "song123".into() })
    );
}

// ─── Cursors ─────────────────────────────────────────────────────

#[test]
fn test_cursor_update_sent_to_room() {
    let (mut client, transport) = session();
    in_room(&mut client, "song123");

    client.send_cursor_update(TextPosition::new(3, 7));
    assert_eq!(
        transport.last(),
        Some(ClientMessage::CursorUpdate {
            room_id: "song123".into(),
            position: TextPosition::new(3, 7)
        })
    );
}

#[test]
fn test_cursor_update_without_room() {
    let (mut client, transport) = session();
    let errors = collect_errors(&client);
    authenticated(&mut client);
    let before = transport.sent().len();

    client.send_cursor_update(TextPosition::new(0, 0));
    assert_eq!(transport.sent().len(), before);
    assert_eq!(errors.lock().len(), 1);
}

#[test]
fn test_remote_cursor_last_write_wins() {
    let (mut client, _) = session();
    in_room(&mut client, "song123");
    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    let _sub = client.on_cursor(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    deliver(&mut client, json!({"event": "cursor_moved", "data": {"user_id": "u2", "position": {"line": 1, "column": 2}}}));
    deliver(&mut client, json!({"event": "cursor_moved", "data": {"user_id": "u2", "position": {"line": 8, "column": 0}}}));

    assert_eq!(seen.load(Ordering::SeqCst), 2);
    assert_eq!(client.cursor("u2").unwrap().position(), TextPosition::new(8, 0));
    assert_eq!(client.cursors().count(), 1);
}

#[test]
fn test_late_cursor_after_leave_is_dropped() {
    let (mut client, _) = session();
    in_room(&mut client, "songA");
    let seen = Arc::new(AtomicUsize::new(0));
    let s = seen.clone();
    let _sub = client.on_cursor(move |_| {
        s.fetch_add(1, Ordering::SeqCst);
    });

    client.leave_room();
    deliver(&mut client, json!({"event": "cursor_moved", "data": {"user_id": "u2", "position": {"line": 3, "column": 4}}}));
    assert_eq!(client.cursors().count(), 0);
    assert_eq!(seen.load(Ordering::SeqCst), 0);

    client.join_room("songB");
    assert_eq!(client.cursors().count(), 0);
}

#[test]
fn test_join_starts_with_empty_cursor_map() {
    let (mut client, _) = session();
    in_room(&mut client, "songA");
    deliver(&mut client, json!({"event": "cursor_moved", "data": {"user_id": "u2", "position": {"line": 1, "column": 0}}}));
    assert_eq!(client.cursors().count(), 1);

    client.join_room("songB");
    assert!(client.cursor("u2").is_none());
}

// ─── Subscriptions ───────────────────────────────────────────────

#[test]
fn test_unsubscribed_handler_stays_silent() {
    let (mut client, _) = session();
    let calls = Arc::new(AtomicUsize::new(0));
    let c = calls.clone();
    let sub = client.on_connection(move |_| {
        c.fetch_add(1, Ordering::SeqCst);
    });

    connected(&mut client);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    sub.unsubscribe();
    client.handle_transport_event(TransportEvent::Disconnected("transport close".into()));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_destroy_drops_every_handler() {
    let (mut client, _) = session();
    let _a = client.on_connection(|_| {});
    let _b = client.on_error(|_| {});
    let _c = client.on_room(|_| {});
    let _d = client.on_operation(|_| {});
    let _e = client.on_cursor(|_| {});
    let _f = client.on_authenticated(|_| {});
    assert_eq!(client.events().handler_count(), 6);

    authenticated(&mut client);
    client.destroy();

    assert_eq!(client.events().handler_count(), 0);
    assert_eq!(client.state(), ConnectionState::Disconnected);
}

#[test]
fn test_backoff_formula() {
    let base = Duration::from_millis(1_000);
    let max = Duration::from_millis(30_000);
    let delays: Vec<Duration> = (0..40).map(|n| backoff_delay(base, max, n)).collect();
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(delays[0], base);
    assert_eq!(*delays.last().unwrap(), max);
}
