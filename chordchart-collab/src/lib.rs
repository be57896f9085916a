//! # chordchart-collab: Real-time collaboration client for chord charts
//!
//! Connects an editor session to the collaboration server over WebSocket,
//! authenticates it, keeps it in one shared song room, and exchanges edit
//! operations and cursor positions with the other participants.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  commands   ┌───────────────┐   JSON frames   ┌────────────┐
//! │SessionHandle │ ──────────► │ SessionRunner │ ◄─────────────► │   Server   │
//! │ (cloneable)  │ ◄── watch ─ │ (tokio task)  │   WebSocket     │            │
//! └──────┬───────┘             └───────┬───────┘                 └────────────┘
//!        │ subscribe                   │ owns
//!        ▼                             ▼
//! ┌──────────────┐   emit      ┌───────────────────┐
//! │   EventHub   │ ◄────────── │ ConnectionManager │ auth · room · ops · cursors
//! └──────────────┘             └───────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`client`]: Connection state machine, reconnect backoff, heartbeat
//! - [`auth`]: Authentication handshake
//! - [`room`]: Current room and roster
//! - [`operations`]: Operation ids, acknowledgements, retained log
//! - [`cursor`]: Remote cursor map
//! - [`events`]: Multi-subscriber handler registries
//! - [`protocol`]: JSON wire envelope (`{"event", "data"}`)
//! - [`transport`]: Transport seam and the tokio-tungstenite implementation
//! - [`runtime`]: Tokio task driving a session
//! - [`config`]: Client configuration
//! - [`timer`]: Deadline bookkeeping and backoff

pub mod auth;
pub mod client;
pub mod config;
pub mod cursor;
pub mod error;
pub mod events;
pub mod operations;
pub mod protocol;
pub mod room;
pub mod runtime;
pub mod timer;
pub mod transport;

// Re-exports for convenience
pub use client::{ConnectionManager, ConnectionState, ConnectionStatus};
pub use config::ClientConfig;
pub use cursor::CursorPosition;
pub use error::{CollabError, ErrorKind};
pub use events::{AuthenticatedUser, EventHub, HandlerRegistry, Subscription};
pub use protocol::{
    ClientMessage, CollaborationOperation, CollaborationUpdate, OperationDraft, OperationKind,
    Participant, ProtocolError, ServerMessage, TextPosition,
};
pub use room::{RoomEvent, RoomInfo};
pub use runtime::{spawn_session, SessionHandle};
pub use transport::{Transport, TransportError, TransportEvent, WebSocketTransport};
