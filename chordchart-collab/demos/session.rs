//! Join a song room and print what happens in it.
//!
//! ```text
//! COLLAB_URL=ws://127.0.0.1:9090 COLLAB_TOKEN=... COLLAB_ROOM=song123 \
//!     RUST_LOG=info cargo run --example session
//! ```

use chordchart_collab::protocol::{OperationDraft, TextPosition};
use chordchart_collab::{spawn_session, ClientConfig, RoomEvent};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let url = std::env::var("COLLAB_URL").unwrap_or_else(|_| ClientConfig::default().server_url);
    let token = std::env::var("COLLAB_TOKEN").ok();
    let room = std::env::var("COLLAB_ROOM").unwrap_or_else(|_| "song123".to_string());

    let session = spawn_session(ClientConfig::new(url));
    let events = session.events();
    let _status = events.on_connection(|s| {
        println!(
            "status: connected={} authenticated={} reconnecting={} retries={}",
            s.connected, s.authenticated, s.reconnecting, s.retry_count
        );
    });
    let _errors = events.on_error(|e| eprintln!("error ({:?}): {e}", e.kind()));
    let _rooms = events.on_room(|event| match event {
        RoomEvent::Joined(room) => println!("joined {} with {} participants", room.id, room.participants.len()),
        RoomEvent::Left { room_id } => println!("left {room_id}"),
        RoomEvent::ParticipantJoined { participant, .. } => println!("+ {}", participant.user_id),
        RoomEvent::ParticipantLeft { user_id, .. } => println!("- {user_id}"),
    });
    let _ops = events.on_operation(|u| println!("op {} from {}: {:?}", u.operation_id, u.user_id, u.operation.kind));
    let _cursors = events.on_cursor(|c| println!("cursor {} at {}:{}", c.user_id, c.line, c.column));

    session.connect(token)?;
    session.wait_for(|s| s.authenticated).await?;
    session.join_room(room.as_str())?;

    if let Some(id) = session.send_operation(OperationDraft::insert(0, "[C] ")).await? {
        println!("sent operation {id}");
    }
    session.send_cursor_update(TextPosition::new(0, 4))?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = tokio::time::sleep(Duration::from_secs(60)) => {}
    }

    session.shutdown()?;
    Ok(())
}
