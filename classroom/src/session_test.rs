use frames::{decode_frame, encode_frame, syscall};
use serde_json::json;

use super::*;
use crate::fakes::{EventLog, FakeDevices, FakeFactory, RecordingLink};

const SESSION: &str = "session-1";

fn user(id: &str) -> LocalUser {
    LocalUser { id: id.into(), name: format!("user {id}"), is_host: false }
}

struct Harness {
    room: Classroom,
    link: RecordingLink,
    log: EventLog,
    devices: FakeDevices,
}

fn harness_with(id: &str, factory: FakeFactory) -> Harness {
    let log = factory.log.clone();
    let link = RecordingLink { log: log.clone(), ..RecordingLink::default() };
    let room = Classroom::new(SESSION, user(id), Box::new(link.clone()), Box::new(factory));
    Harness { room, link, devices: FakeDevices { log: log.clone(), ..FakeDevices::default() }, log }
}

fn harness(id: &str) -> Harness {
    harness_with(id, FakeFactory::default())
}

async fn joined(id: &str, factory: FakeFactory) -> Harness {
    let mut h = harness_with(id, factory);
    h.room.join(&h.devices).await.unwrap();
    h
}

fn wire(event: &RoomEvent) -> Frame {
    decode_frame(&encode_frame(&event.to_frame(SESSION))).unwrap()
}

fn offer_from(caller: &str) -> Frame {
    wire(&RoomEvent::UserJoined { signal: json!({ "type": "offer", "from": caller }), caller_id: caller.into() })
}

fn answer_from(id: &str) -> Frame {
    wire(&RoomEvent::ReceivingReturnedSignal { id: id.into(), signal: json!({ "type": "answer" }) })
}

fn all_users(ids: &[&str]) -> Frame {
    wire(&RoomEvent::AllUsers(ids.iter().map(|s| (*s).to_owned()).collect()))
}

// =============================================================================
// JOIN
// =============================================================================

#[tokio::test]
async fn join_announces_user() {
    let h = joined("me", FakeFactory::default()).await;
    assert!(h.room.is_joined());
    let frames = h.link.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].syscall, syscall::JOIN_ROOM);
    assert_eq!(frames[0].str_field("userId"), Some("me"));
    assert_eq!(frames[0].str_field("sessionId"), Some(SESSION));
}

#[tokio::test]
async fn denied_capture_sends_nothing() {
    let mut h = harness("me");
    h.devices.deny_camera = true;
    let err = h.room.join(&h.devices).await.unwrap_err();
    assert!(matches!(err, ClassroomError::MediaPermissionDenied));
    assert!(h.link.frames().is_empty());
    assert!(!h.room.is_joined());
}

#[tokio::test]
async fn second_join_is_rejected() {
    let mut h = joined("me", FakeFactory::default()).await;
    assert!(matches!(h.room.join(&h.devices).await, Err(ClassroomError::AlreadyJoined)));
    h.room.leave();
    assert!(matches!(h.room.join(&h.devices).await, Err(ClassroomError::SessionClosed)));
}

#[test]
fn frames_before_join_are_ignored() {
    let mut h = harness("me");
    h.room.handle_event(&all_users(&["a"])).unwrap();
    assert_eq!(h.room.open_links(), 0);
    assert!(matches!(h.room.send_chat("hi"), Err(ClassroomError::NotJoined)));
}

// =============================================================================
// MESH
// =============================================================================

/// Routes frames between classrooms the way the relay does.
struct Mesh {
    clients: Vec<(Harness, usize)>,
}

impl Mesh {
    async fn join(&mut self, id: &str) {
        self.clients.push((joined(id, FakeFactory::default()).await, 0));
        self.pump();
    }

    fn get(&self, id: &str) -> &Harness {
        &self.clients.iter().find(|(h, _)| h.room.user().id == id).unwrap().0
    }

    fn pump(&mut self) {
        loop {
            let ids: Vec<String> = self.clients.iter().map(|(h, _)| h.room.user().id.clone()).collect();
            let mut deliveries = Vec::new();
            for (h, seen) in &mut self.clients {
                let sender = h.room.user().id.clone();
                let frames = h.link.frames();
                for frame in &frames[*seen..] {
                    deliveries.extend(route(&sender, &ids, frame));
                }
                *seen = frames.len();
            }
            if deliveries.is_empty() {
                return;
            }
            for (to, frame) in deliveries {
                if let Some((h, _)) = self.clients.iter_mut().find(|(h, _)| h.room.user().id == to) {
                    h.room.handle_event(&frame).unwrap();
                }
            }
        }
    }
}

fn route(sender: &str, ids: &[String], frame: &Frame) -> Vec<(String, Frame)> {
    let others = || ids.iter().filter(|id| *id != sender).cloned();
    match RoomEvent::from_frame(frame).unwrap() {
        RoomEvent::JoinRoom { .. } => vec![(sender.to_owned(), wire(&RoomEvent::AllUsers(others().collect())))],
        RoomEvent::SendingSignal { user_to_signal, caller_id, signal } => {
            vec![(user_to_signal, wire(&RoomEvent::UserJoined { signal, caller_id }))]
        }
        RoomEvent::ReturningSignal { signal, caller_id } => {
            vec![(caller_id, wire(&RoomEvent::ReceivingReturnedSignal { id: sender.to_owned(), signal }))]
        }
        RoomEvent::LeaveRoom { .. } => others().map(|id| (id, wire(&RoomEvent::UserLeft(sender.to_owned())))).collect(),
        _ => Vec::new(),
    }
}

#[tokio::test]
async fn third_participant_links_to_both_without_duplicates() {
    let mut mesh = Mesh { clients: Vec::new() };
    mesh.join("a").await;
    mesh.join("b").await;
    mesh.join("c").await;

    let (a, b, c) = (mesh.get("a"), mesh.get("b"), mesh.get("c"));
    assert_eq!(a.room.open_links(), 2);
    assert_eq!(b.room.open_links(), 2);
    assert_eq!(c.room.open_links(), 2);

    assert_eq!(a.log.count("initiate:"), 0);
    assert_eq!(a.log.count("respond:"), 2);
    assert_eq!(b.log.count("initiate:a"), 1);
    assert_eq!(b.log.count("respond:c"), 1);
    assert_eq!(c.log.count("initiate:"), 2);
    assert_eq!(c.log.count("respond:"), 0);

    assert_eq!(c.room.peer_state("a"), Some(PeerState::Connected));
    assert_eq!(c.room.peer_state("b"), Some(PeerState::Connected));
    assert_eq!(a.room.peer_state("c"), Some(PeerState::Answering));
    assert_eq!(c.room.roster().get("a").unwrap().stream, StreamRef::Remote("stream-a".into()));
    assert_eq!(c.room.roster().len(), 3);
}

#[tokio::test]
async fn departure_closes_links_on_the_others() {
    let mut mesh = Mesh { clients: Vec::new() };
    mesh.join("a").await;
    mesh.join("b").await;
    mesh.join("c").await;

    mesh.clients[2].0.room.leave();
    mesh.pump();

    let a = mesh.get("a");
    assert_eq!(a.room.open_links(), 1);
    assert_eq!(a.room.peer_state("c"), None);
    assert!(a.room.roster().get("c").is_none());
    assert_eq!(a.log.count("destroy:c"), 1);
    assert_eq!(mesh.get("b").room.open_links(), 1);
}

// =============================================================================
// NEGOTIATION
// =============================================================================

#[tokio::test]
async fn repeated_offer_goes_to_existing_link() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&offer_from("a")).unwrap();
    h.room.handle_event(&offer_from("a")).unwrap();

    assert_eq!(h.log.count("respond:a"), 1);
    assert_eq!(h.log.count("signal:a"), 1);
    assert_eq!(h.room.open_links(), 1);
    let returned = h.link.frames().into_iter().filter(|f| f.syscall == syscall::RETURNING_SIGNAL).count();
    assert_eq!(returned, 1);
}

#[tokio::test]
async fn own_id_in_all_users_is_skipped() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&all_users(&["me", "a"])).unwrap();
    assert_eq!(h.room.open_links(), 1);
    assert_eq!(h.room.peer_state("me"), None);
}

#[tokio::test]
async fn stale_answers_are_dropped() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&answer_from("ghost")).unwrap();
    assert_eq!(h.log.count("signal:"), 0);

    h.room.handle_event(&all_users(&["a"])).unwrap();
    h.room.peer_failed("a", &PeerError::Backend("ice failed".into()));
    h.room.handle_event(&answer_from("a")).unwrap();
    assert_eq!(h.log.count("signal:a"), 0);
    assert_eq!(h.room.peer_state("a"), Some(PeerState::Closed));
}

#[tokio::test]
async fn responder_connects_when_media_flows() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&offer_from("a")).unwrap();
    assert_eq!(h.room.roster().get("a").unwrap().stream, StreamRef::Pending);

    assert!(h.room.peer_connected("a"));
    assert!(h.room.peer_connected("a"));
    assert_eq!(h.room.peer_state("a"), Some(PeerState::Connected));
    assert_eq!(h.room.roster().get("a").unwrap().stream, StreamRef::Remote("stream-a".into()));
    assert!(!h.room.peer_connected("nobody"));
}

#[tokio::test]
async fn failed_creation_closes_only_that_link() {
    let factory = FakeFactory { fail_create: vec!["b".into()], ..FakeFactory::default() };
    let mut h = joined("me", factory).await;
    h.room.handle_event(&all_users(&["a", "b", "c"])).unwrap();

    assert_eq!(h.room.open_links(), 2);
    assert_eq!(h.room.peer_state("b"), Some(PeerState::Closed));
    let offers: Vec<Frame> = h.link.frames().into_iter().filter(|f| f.syscall == syscall::SENDING_SIGNAL).collect();
    assert_eq!(offers.len(), 2);
    assert!(offers.iter().all(|f| f.str_field("userToSignal") != Some("b")));
}

#[tokio::test]
async fn backend_failure_closes_only_that_link() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&all_users(&["a", "b"])).unwrap();
    h.room.handle_event(&answer_from("b")).unwrap();

    h.room.peer_failed("b", &PeerError::Backend("ice failed".into()));
    assert_eq!(h.room.peer_state("a"), Some(PeerState::Offering));
    assert_eq!(h.room.peer_state("b"), Some(PeerState::Closed));
    assert_eq!(h.room.roster().get("b").unwrap().stream, StreamRef::Pending);
    assert_eq!(h.log.count("destroy:"), 1);
}

#[tokio::test]
async fn malformed_frame_is_an_error() {
    let mut h = joined("me", FakeFactory::default()).await;
    let frame = Frame::request(syscall::USER_JOINED, json!({ "callerID": "a" }));
    assert!(matches!(h.room.handle_event(&frame), Err(ClassroomError::Malformed { .. })));
    assert_eq!(h.room.open_links(), 0);
}

// =============================================================================
// LOCAL CONTROLS
// =============================================================================

#[tokio::test]
async fn mute_and_camera_toggle() {
    let mut h = joined("me", FakeFactory::default()).await;
    assert!(h.room.toggle_mute().unwrap());
    assert!(h.room.is_muted());
    assert!(h.room.toggle_camera().unwrap());
    assert!(h.room.is_camera_off());
    assert!(!h.room.toggle_mute().unwrap());
}

#[tokio::test]
async fn controls_require_a_session() {
    let mut h = harness("me");
    assert!(matches!(h.room.toggle_mute(), Err(ClassroomError::NotJoined)));
    assert!(matches!(h.room.toggle_screen_share(&h.devices).await, Err(ClassroomError::NotJoined)));
}

#[tokio::test]
async fn failed_screen_capture_keeps_camera() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&all_users(&["a"])).unwrap();
    h.devices.deny_screen = true;

    assert!(!h.room.toggle_screen_share(&h.devices).await.unwrap());
    assert!(!h.room.is_screen_sharing());
    assert_eq!(h.room.media().unwrap().outgoing_video().unwrap().id(), "cam");
    assert_eq!(h.log.count("replace:"), 0);
    assert_eq!(h.room.open_links(), 1);
}

#[tokio::test]
async fn screen_share_swaps_tracks_and_reverts() {
    let factory = FakeFactory { fail_replace: vec!["b".into()], ..FakeFactory::default() };
    let mut h = joined("me", factory).await;
    h.room.handle_event(&all_users(&["a", "b"])).unwrap();

    assert!(h.room.toggle_screen_share(&h.devices).await.unwrap());
    assert!(h.room.is_screen_sharing());
    assert_eq!(h.log.count("replace:a:cam->screen"), 1);
    assert_eq!(h.room.peer_state("b"), Some(PeerState::Closed));
    assert_eq!(h.room.peer_state("a"), Some(PeerState::Offering));

    assert!(!h.room.toggle_screen_share(&h.devices).await.unwrap());
    assert!(!h.room.is_screen_sharing());
    assert_eq!(h.log.count("replace:a:screen->cam"), 1);
    assert_eq!(h.log.count("stop:screen"), 1);
    assert_eq!(h.room.media().unwrap().outgoing_video().unwrap().id(), "cam");
}

#[tokio::test]
async fn link_created_while_sharing_sends_screen() {
    let mut h = joined("me", FakeFactory::default()).await;
    assert!(h.room.toggle_screen_share(&h.devices).await.unwrap());
    h.room.handle_event(&offer_from("late")).unwrap();
    assert_eq!(h.log.count("replace:late:cam->screen"), 1);
}

#[tokio::test]
async fn stop_screen_share_without_sharing_is_noop() {
    let mut h = joined("me", FakeFactory::default()).await;
    assert!(!h.room.stop_screen_share().unwrap());
}

#[tokio::test]
async fn chat_waits_for_relay_echo() {
    let mut h = joined("me", FakeFactory::default()).await;
    assert!(matches!(h.room.send_chat("   "), Err(ClassroomError::EmptyMessage)));

    h.room.send_chat("  hello  ").unwrap();
    let sent = h.link.frames().pop().unwrap();
    assert_eq!(sent.syscall, syscall::CHAT_MESSAGE);
    assert_eq!(sent.str_field("text"), Some("hello"));
    assert!(h.room.chat().is_empty());

    let echo = ChatMessage { user_id: "me".into(), user_name: "user me".into(), text: "hello".into(), ts: 1_700_000_000_000 };
    h.room.handle_event(&wire(&RoomEvent::ChatMessage(echo.clone()))).unwrap();
    assert_eq!(h.room.chat(), &[echo]);
}

#[tokio::test]
async fn hands_go_up_and_down() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.raise_hand().unwrap();
    assert!(h.room.roster().local().unwrap().hand_raised);
    assert_eq!(h.link.syscalls().last().map(String::as_str), Some(syscall::RAISE_HAND));

    h.room.handle_event(&offer_from("a")).unwrap();
    let hand = HandSignal { user_id: "a".into(), user_name: "Ana".into() };
    h.room.handle_event(&wire(&RoomEvent::RaiseHand(hand.clone()))).unwrap();
    assert_eq!(h.room.roster().raised_hands().count(), 2);

    h.room.handle_event(&wire(&RoomEvent::LowerHand(hand))).unwrap();
    h.room.lower_hand().unwrap();
    assert_eq!(h.room.roster().raised_hands().count(), 0);
}

#[tokio::test]
async fn participants_update_replaces_roster() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&offer_from("a")).unwrap();
    let list = vec![
        ParticipantInfo { id: "me".into(), name: "user me".into(), is_host: false, hand_raised: false },
        ParticipantInfo { id: "b".into(), name: "Bo".into(), is_host: true, hand_raised: false },
    ];
    h.room.handle_event(&wire(&RoomEvent::ParticipantsUpdate(list))).unwrap();

    assert!(h.room.roster().get("a").is_none());
    assert!(h.room.roster().get("b").unwrap().is_host);
}

// =============================================================================
// TEARDOWN
// =============================================================================

#[tokio::test]
async fn leave_stops_media_then_peers_then_signaling() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.handle_event(&all_users(&["a", "b"])).unwrap();
    h.room.leave();

    let entries = h.log.entries();
    let last_stop = entries.iter().rposition(|e| e.starts_with("stop:")).unwrap();
    let first_destroy = entries.iter().position(|e| e.starts_with("destroy:")).unwrap();
    let last_destroy = entries.iter().rposition(|e| e.starts_with("destroy:")).unwrap();
    let disconnect = entries.iter().position(|e| e == "disconnect").unwrap();
    assert!(last_stop < first_destroy);
    assert!(last_destroy < disconnect);
    assert_eq!(h.log.count("destroy:"), 2);

    assert_eq!(h.link.syscalls().last().map(String::as_str), Some(syscall::LEAVE_ROOM));
    assert!(!h.room.is_joined());
    assert_eq!(h.room.open_links(), 0);
}

#[tokio::test]
async fn leave_is_idempotent_and_final() {
    let mut h = joined("me", FakeFactory::default()).await;
    h.room.leave();
    h.room.leave();
    assert_eq!(h.log.count("disconnect"), 1);

    h.room.handle_event(&offer_from("a")).unwrap();
    assert_eq!(h.room.open_links(), 0);
    assert!(matches!(h.room.send_chat("hi"), Err(ClassroomError::SessionClosed)));
}

#[tokio::test]
async fn drop_tears_down() {
    let h = joined("me", FakeFactory::default()).await;
    let Harness { mut room, log, .. } = h;
    room.handle_event(&all_users(&["a"])).unwrap();
    drop(room);
    assert_eq!(log.count("stop:"), 2);
    assert_eq!(log.count("destroy:a"), 1);
    assert_eq!(log.count("disconnect"), 1);
}

#[test]
fn leave_before_join_only_disconnects() {
    let mut h = harness("me");
    h.room.leave();
    assert!(h.link.frames().is_empty());
    assert_eq!(h.log.entries(), vec!["disconnect"]);
}

#[tokio::test]
async fn channel_link_forwards_until_disconnected() {
    let (tx, mut rx) = mpsc::channel(4);
    let mut link = ChannelLink::new(tx);
    link.send(RoomEvent::LeaveRoom { session_id: SESSION.into() }.to_frame(SESSION)).unwrap();
    assert_eq!(rx.recv().await.unwrap().syscall, syscall::LEAVE_ROOM);

    link.disconnect();
    assert!(matches!(link.send(Frame::request(syscall::LEAVE_ROOM, json!({}))), Err(ClassroomError::Signaling(_))));
    assert!(rx.recv().await.is_none());
}
