//! Tokio driver for a [`ConnectionManager`] over a WebSocket.
//!
//! ```text
//!  SessionHandle ──► Command (mpsc) ──┐
//!                                     ▼
//!  WebSocketTransport ──► (gen, event) ──► SessionRunner ──► ConnectionManager
//!                                     ▲         │
//!  sleep_until(next_deadline) ────────┘         └──► watch<ConnectionStatus>
//! ```
//!
//! One task owns the manager, so every mutation is serialized. Handles talk to
//! it through commands; subscribers share its [`EventHub`]. The session ends
//! when [`SessionHandle::shutdown`] is called or the last handle is dropped.

use std::time::Instant;

use tokio::sync::{mpsc, oneshot, watch};

use crate::client::{ConnectionManager, ConnectionStatus};
use crate::config::ClientConfig;
use crate::error::CollabError;
use crate::events::EventHub;
use crate::protocol::{OperationDraft, TextPosition};
use crate::room::RoomInfo;
use crate::transport::{TransportEvents, WebSocketTransport};

enum Command {
    Connect { token: Option<String> },
    Disconnect,
    Authenticate { token: String },
    JoinRoom { room_id: String },
    LeaveRoom,
    SendOperation {
        draft: OperationDraft,
        reply: oneshot::Sender<Option<String>>,
    },
    SendCursor { position: TextPosition },
    CurrentRoom { reply: oneshot::Sender<Option<RoomInfo>> },
    Shutdown,
}

/// Start a session task on the current tokio runtime.
pub fn spawn_session(config: ClientConfig) -> SessionHandle {
    let events = EventHub::new();
    let (transport, transport_events) = WebSocketTransport::new();
    let client = ConnectionManager::with_events(config, transport, events.clone());
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let (status_tx, status_rx) = watch::channel(client.status().clone());

    let runner = SessionRunner {
        client,
        commands: commands_rx,
        transport_events,
        status_tx,
    };
    tokio::spawn(runner.run());

    SessionHandle {
        commands: commands_tx,
        status: status_rx,
        events,
    }
}

struct SessionRunner {
    client: ConnectionManager<WebSocketTransport>,
    commands: mpsc::UnboundedReceiver<Command>,
    transport_events: TransportEvents,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl SessionRunner {
    async fn run(mut self) {
        loop {
            let deadline = self.client.next_deadline();
            let timer = async move {
                match deadline {
                    Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                Some((generation, event)) = self.transport_events.recv() => {
                    if generation == self.client.transport().generation() {
                        self.client.handle_transport_event(event);
                    } else {
                        log::debug!(
                            "Discarding {event:?} from stale connection attempt {generation}"
                        );
                    }
                }
                _ = timer => self.client.poll_timers(Instant::now()),
            }

            self.publish();
        }

        self.client.destroy();
        self.publish();
        log::info!("Session stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Connect { token } => self.client.connect(token),
            Command::Disconnect => self.client.disconnect(),
            Command::Authenticate { token } => self.client.authenticate(token),
            Command::JoinRoom { room_id } => self.client.join_room(&room_id),
            Command::LeaveRoom => self.client.leave_room(),
            Command::SendOperation { draft, reply } => {
                let _ = reply.send(self.client.send_operation(draft));
            }
            Command::SendCursor { position } => self.client.send_cursor_update(position),
            Command::CurrentRoom { reply } => {
                let _ = reply.send(self.client.current_room().cloned());
            }
            Command::Shutdown => {}
        }
    }

    fn publish(&self) {
        let status = self.client.status();
        self.status_tx.send_if_modified(|current| {
            if current != status {
                *current = status.clone();
                true
            } else {
                false
            }
        });
    }
}

/// Cloneable front end of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<ConnectionStatus>,
    events: EventHub,
}

impl SessionHandle {
    fn send(&self, command: Command) -> Result<(), CollabError> {
        self.commands
            .send(command)
            .map_err(|_| CollabError::SessionClosed)
    }

    pub fn connect(&self, token: Option<String>) -> Result<(), CollabError> {
        self.send(Command::Connect { token })
    }

    pub fn disconnect(&self) -> Result<(), CollabError> {
        self.send(Command::Disconnect)
    }

    pub fn authenticate(&self, token: impl Into<String>) -> Result<(), CollabError> {
        self.send(Command::Authenticate {
            token: token.into(),
        })
    }

    pub fn join_room(&self, room_id: impl Into<String>) -> Result<(), CollabError> {
        self.send(Command::JoinRoom {
            room_id: room_id.into(),
        })
    }

    pub fn leave_room(&self) -> Result<(), CollabError> {
        self.send(Command::LeaveRoom)
    }

    /// Send an edit; resolves to the operation id, or `None` if it was
    /// refused (the reason goes to `on_error`).
    pub async fn send_operation(
        &self,
        draft: OperationDraft,
    ) -> Result<Option<String>, CollabError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::SendOperation { draft, reply })?;
        rx.await.map_err(|_| CollabError::SessionClosed)
    }

    pub fn send_cursor_update(&self, position: TextPosition) -> Result<(), CollabError> {
        self.send(Command::SendCursor { position })
    }

    pub async fn current_room(&self) -> Result<Option<RoomInfo>, CollabError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::CurrentRoom { reply })?;
        rx.await.map_err(|_| CollabError::SessionClosed)
    }

    /// Latest published status.
    pub fn status(&self) -> ConnectionStatus {
        self.status.borrow().clone()
    }

    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Wait until the status satisfies `predicate`.
    pub async fn wait_for<F>(&self, mut predicate: F) -> Result<ConnectionStatus, CollabError>
    where
        F: FnMut(&ConnectionStatus) -> bool,
    {
        let mut rx = self.status.clone();
        let status = rx
            .wait_for(|status| predicate(status))
            .await
            .map_err(|_| CollabError::SessionClosed)?;
        Ok(status.clone())
    }

    pub fn events(&self) -> &EventHub {
        &self.events
    }

    /// Disconnect, drop every subscriber and stop the task.
    pub fn shutdown(&self) -> Result<(), CollabError> {
        self.send(Command::Shutdown)
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::time::{timeout, Duration};

    fn unreachable_config() -> ClientConfig {
        // Nothing listens on port 9; connects fail fast.
        let mut config = ClientConfig::new("ws://127.0.0.1:9");
        config.reconnect_base_delay_ms = 10;
        config.reconnect_max_delay_ms = 20;
        config.max_reconnect_attempts = Some(2);
        config
    }

    #[tokio::test]
    async fn test_join_before_connect_reports_error() {
        let session = spawn_session(ClientConfig::default());
        let errors = Arc::new(AtomicUsize::new(0));
        let e = errors.clone();
        let _sub = session.events().on_error(move |_| {
            e.fetch_add(1, Ordering::SeqCst);
        });

        session.join_room("song123").unwrap();
        assert_eq!(session.current_room().await.unwrap(), None);
        assert_eq!(errors.load(Ordering::SeqCst), 1);
        assert_eq!(session.send_operation(OperationDraft::insert(0, "x")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_retries_until_exhausted() {
        let session = spawn_session(unreachable_config());
        session.connect(None).unwrap();

        let status = timeout(
            Duration::from_secs(5),
            session.wait_for(|s| s.retry_count == 2 && !s.reconnecting),
        )
        .await
        .unwrap()
        .unwrap();
        assert!(!status.connected);
        assert!(status.last_error.is_some());
    }

    #[tokio::test]
    async fn test_shutdown_closes_session() {
        let session = spawn_session(ClientConfig::default());
        let _sub = session.events().on_room(|_| {});
        assert_eq!(session.events().handler_count(), 1);

        session.shutdown().unwrap();
        timeout(Duration::from_secs(1), async {
            while !session.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();

        assert_eq!(session.events().handler_count(), 0);
        assert_eq!(session.connect(None), Err(CollabError::SessionClosed));
        assert_eq!(session.current_room().await, Err(CollabError::SessionClosed));
    }
}
