//! WebSocket handler: bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Frames from room peers → forward to client
//!
//! Handler functions validate, update room state through the services and
//! return `Outcome`s. The dispatch layer owns all outbound concerns: reply to
//! sender, broadcast to the room, or direct delivery to one participant.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. `signal:join-room` makes the socket a participant and replays the
//!    room's latest whiteboard and chat; any whiteboard event subscribes it to
//!    that session's whiteboard traffic
//! 3. Close or `signal:leave-room` → `signal:user-left` and a participants
//!    update to the rest of the room → cleanup

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use classroom::RoomEvent;
use frames::syscall;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use whiteboard::WhiteboardEvent;

use crate::frame::{self, Frame, Reply};
use crate::services;
use crate::services::room::RoomError;
use crate::services::whiteboard::WhiteboardError;
use crate::state::AppState;

/// Author stamped on snapshots the relay replays to joiners.
pub const RELAY_AUTHOR: &str = "relay";

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. The dispatch layer uses this to
/// decide who receives what; handlers never send frames directly.
#[derive(Debug)]
enum Outcome {
    /// Send a frame to the sender only.
    Reply(Frame),
    /// Send an empty done to the sender only.
    Done,
    /// Send to every socket in the room, sender included.
    Broadcast { session_id: String, frame: Frame },
    /// Send to every socket in the room except the sender.
    Others { session_id: String, frame: Frame },
    /// Send to one participant, addressed by user id.
    Direct { session_id: String, user_id: String, frame: Frame },
}

// =============================================================================
// CONNECTION
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Wire {
    Binary,
    Text,
}

/// What the relay knows about one socket.
#[derive(Debug)]
pub struct Connection {
    pub client_id: Uuid,
    /// Room the socket is subscribed to.
    pub session_id: Option<String>,
    /// Set once the socket joined the room as a participant.
    pub user_id: Option<String>,
    wire: Wire,
}

impl Connection {
    #[must_use]
    pub fn new(client_id: Uuid) -> Self {
        Self { client_id, session_id: None, user_id: None, wire: Wire::Binary }
    }

    /// Value stamped as `from` on frames this socket originates.
    fn sender(&self) -> String {
        self.user_id.clone().unwrap_or_else(|| self.client_id.to_string())
    }

    fn joined(&self) -> Result<(String, String), RoomError> {
        match (&self.session_id, &self.user_id) {
            (Some(session_id), Some(user_id)) => Ok((session_id.clone(), user_id.clone())),
            _ => Err(RoomError::NotJoined),
        }
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| run_ws(socket, state))
}

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let mut conn = Connection::new(Uuid::new_v4());
    let client_id = conn.client_id;

    // Per-connection channel for frames from room peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_channel_capacity);

    let welcome = Frame::request(syscall::SESSION_CONNECTED, json!({ "client_id": client_id.to_string() }));
    if send_frame(&mut socket, conn.wire, &welcome).await.is_err() {
        return;
    }
    info!(%client_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let parsed = match msg {
                    Message::Binary(bytes) => {
                        conn.wire = Wire::Binary;
                        frame::parse_binary(&bytes)
                    }
                    Message::Text(text) => {
                        conn.wire = Wire::Text;
                        frame::parse_text(text.as_str())
                    }
                    Message::Close(_) => break,
                    _ => continue,
                };
                let replies = match parsed {
                    Ok(req) => process_inbound_frame(&state, &mut conn, &client_tx, req).await,
                    Err(e) => {
                        warn!(%client_id, error = %e, "ws: invalid inbound frame");
                        vec![frame::gateway_error(&e)]
                    }
                };
                for reply in &replies {
                    if let Err(e) = send_frame(&mut socket, conn.wire, reply).await {
                        debug!(%client_id, error = %e, "ws: reply not delivered");
                    }
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, conn.wire, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    depart(&state, &mut conn).await;
    info!(%client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Process one inbound frame and return frames for the sender.
///
/// Transport concerns stay in `run_ws`, so tests exercise dispatch end to
/// end with plain channels.
async fn process_inbound_frame(
    state: &AppState,
    conn: &mut Connection,
    client_tx: &mpsc::Sender<Frame>,
    req: Frame,
) -> Vec<Frame> {
    info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match req.prefix() {
        "signal" | "room" => handle_room_event(state, conn, client_tx, &req).await,
        "whiteboard" => handle_whiteboard(state, conn, client_tx, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    let outcomes = match result {
        Ok(outcomes) => outcomes,
        Err(err_frame) => {
            warn!(
                client_id = %conn.client_id,
                syscall = %req.syscall,
                code = err_frame.str_field(frame::FRAME_CODE).unwrap_or("-"),
                message = err_frame.str_field(frame::FRAME_MESSAGE).unwrap_or("-"),
                "ws: request rejected"
            );
            return vec![err_frame];
        }
    };

    let mut replies = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Reply(frame) => replies.push(frame),
            Outcome::Done => replies.push(req.done()),
            Outcome::Broadcast { session_id, frame } => {
                services::room::broadcast(state, &session_id, &frame, None).await;
            }
            Outcome::Others { session_id, frame } => {
                services::room::broadcast(state, &session_id, &frame, Some(conn.client_id)).await;
            }
            Outcome::Direct { session_id, user_id, frame } => {
                if let Err(e) = services::room::send_to_user(state, &session_id, &user_id, frame).await {
                    replies.push(req.error_from(&e));
                }
            }
        }
    }
    replies
}

// =============================================================================
// ROOM / SIGNAL HANDLERS
// =============================================================================

async fn handle_room_event(
    state: &AppState,
    conn: &mut Connection,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Vec<Outcome>, Frame> {
    let event = RoomEvent::from_frame(req).map_err(|e| req.error_from(&RoomError::from(e)))?;

    match event {
        RoomEvent::JoinRoom { session_id, user } => {
            if conn.session_id.as_ref().is_some_and(|current| *current != session_id) {
                depart(state, conn).await;
            }
            let joined = services::room::join_room(state, &session_id, conn.client_id, client_tx.clone(), &user).await;
            conn.session_id = Some(session_id.clone());
            conn.user_id = Some(user.id.clone());

            let mut outcomes = Vec::new();
            // Peers still hold a link to the replaced socket; it must close before the new offer arrives.
            if let Some(stale) = joined.replaced {
                outcomes.push(Outcome::Others {
                    frame: RoomEvent::UserLeft(stale.user_id.clone()).to_frame(&session_id).with_from(stale.user_id),
                    session_id: session_id.clone(),
                });
            }
            outcomes.push(Outcome::Reply(RoomEvent::AllUsers(joined.others).to_frame(&session_id)));
            if let Some(snapshot) = joined.latest_snapshot {
                let replay = WhiteboardEvent::Update {
                    session_id: session_id.clone(),
                    data: snapshot,
                    user_id: RELAY_AUTHOR.to_owned(),
                };
                outcomes.push(Outcome::Reply(replay.to_frame()));
            }
            outcomes.extend(
                joined
                    .chat
                    .into_iter()
                    .map(|msg| Outcome::Reply(RoomEvent::ChatMessage(msg).to_frame(&session_id))),
            );
            outcomes.push(Outcome::Broadcast {
                frame: RoomEvent::ParticipantsUpdate(joined.roster).to_frame(&session_id),
                session_id,
            });
            Ok(outcomes)
        }
        RoomEvent::SendingSignal { user_to_signal, caller_id, signal } => {
            let (session_id, me) = conn.joined().map_err(|e| req.error_from(&e))?;
            if caller_id != me {
                debug!(claimed = %caller_id, %me, "ws: callerID replaced with sender");
            }
            let frame = RoomEvent::UserJoined { signal, caller_id: me.clone() }
                .to_frame(&session_id)
                .with_from(me);
            Ok(vec![Outcome::Direct { session_id, user_id: user_to_signal, frame }])
        }
        RoomEvent::ReturningSignal { signal, caller_id } => {
            let (session_id, me) = conn.joined().map_err(|e| req.error_from(&e))?;
            let frame = RoomEvent::ReceivingReturnedSignal { id: me.clone(), signal }
                .to_frame(&session_id)
                .with_from(me);
            Ok(vec![Outcome::Direct { session_id, user_id: caller_id, frame }])
        }
        RoomEvent::LeaveRoom { .. } => {
            depart(state, conn).await;
            Ok(Vec::new())
        }
        RoomEvent::ChatMessage(msg) => {
            let (session_id, me) = conn.joined().map_err(|e| req.error_from(&e))?;
            let stamped = services::room::post_chat(state, &session_id, conn.client_id, &msg.text)
                .await
                .map_err(|e| req.error_from(&e))?;
            let frame = RoomEvent::ChatMessage(stamped).to_frame(&session_id).with_from(me);
            Ok(vec![Outcome::Broadcast { session_id, frame }])
        }
        RoomEvent::RaiseHand(_) | RoomEvent::LowerHand(_) => {
            let raised = matches!(event, RoomEvent::RaiseHand(_));
            let (session_id, me) = conn.joined().map_err(|e| req.error_from(&e))?;
            let hand = services::room::set_hand(state, &session_id, conn.client_id, raised)
                .await
                .map_err(|e| req.error_from(&e))?;
            let event = if raised { RoomEvent::RaiseHand(hand) } else { RoomEvent::LowerHand(hand) };
            let frame = event.to_frame(&session_id).with_from(me);
            Ok(vec![Outcome::Broadcast { session_id, frame }])
        }
        RoomEvent::AllUsers(_)
        | RoomEvent::UserJoined { .. }
        | RoomEvent::ReceivingReturnedSignal { .. }
        | RoomEvent::UserLeft(_)
        | RoomEvent::ParticipantsUpdate(_) => Err(req.error(format!("{} is sent by the relay only", req.syscall))),
    }
}

// =============================================================================
// WHITEBOARD HANDLER
// =============================================================================

async fn handle_whiteboard(
    state: &AppState,
    conn: &mut Connection,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Vec<Outcome>, Frame> {
    let event = WhiteboardEvent::from_frame(req).map_err(|e| req.error_from(&WhiteboardError::from(e)))?;
    let session_id = event.session_id().to_owned();

    if conn.session_id.as_deref() != Some(session_id.as_str()) {
        if conn.session_id.is_some() {
            depart(state, conn).await;
        }
        services::room::subscribe(state, &session_id, conn.client_id, client_tx.clone()).await;
        conn.session_id = Some(session_id.clone());
    }

    services::whiteboard::record(state, &event)
        .await
        .map_err(|e| req.error_from(&e))?;

    if matches!(event, WhiteboardEvent::Save { .. }) {
        return Ok(vec![Outcome::Done]);
    }
    let frame = event.to_frame().with_from(conn.sender());
    Ok(vec![Outcome::Broadcast { session_id, frame }])
}

// =============================================================================
// DEPARTURE
// =============================================================================

/// Leave the current room, telling the remaining participants.
async fn depart(state: &AppState, conn: &mut Connection) {
    conn.user_id = None;
    let Some(session_id) = conn.session_id.take() else {
        return;
    };
    let parted = services::room::part_room(state, &session_id, conn.client_id).await;
    let Some(member) = parted.member else {
        return;
    };
    if parted.evicted {
        return;
    }
    let left = RoomEvent::UserLeft(member.user_id.clone())
        .to_frame(&session_id)
        .with_from(member.user_id);
    services::room::broadcast(state, &session_id, &left, None).await;
    let update = RoomEvent::ParticipantsUpdate(parted.roster).to_frame(&session_id);
    services::room::broadcast(state, &session_id, &update, None).await;
}

// =============================================================================
// HELPERS
// =============================================================================

async fn send_frame(socket: &mut WebSocket, wire: Wire, out: &Frame) -> Result<(), axum::Error> {
    let msg = match wire {
        Wire::Binary => Message::Binary(frames::encode_frame(out).into()),
        Wire::Text => match serde_json::to_string(out) {
            Ok(json) => Message::Text(json.into()),
            Err(e) => {
                warn!(error = %e, "ws: failed to serialize frame");
                return Ok(());
            }
        },
    };
    if out.status == frames::Status::Error {
        warn!(
            id = %out.id,
            syscall = %out.syscall,
            code = out.str_field(frame::FRAME_CODE).unwrap_or("-"),
            "ws: send frame status=Error"
        );
    } else {
        debug!(id = %out.id, syscall = %out.syscall, status = ?out.status, "ws: send frame");
    }
    socket.send(msg).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
