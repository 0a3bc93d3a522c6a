use frames::{decode_frame, encode_frame};

use super::*;
use crate::input::ShapeKind;

const SESSION: &str = "session-1";

/// Deliver a frame the way the relay does: through the wire codec, stamped
/// with the sender.
fn relay(frame: &Frame, from: &str) -> Frame {
    let stamped = frame.clone().with_from(from);
    decode_frame(&encode_frame(&stamped)).unwrap()
}

fn pair() -> ((WhiteboardSync, EngineCore), (WhiteboardSync, EngineCore)) {
    (
        (WhiteboardSync::new(SESSION, "alice"), EngineCore::default()),
        (WhiteboardSync::new(SESSION, "bob"), EngineCore::default()),
    )
}

#[test]
fn update_frame_carries_snapshot_text() {
    let sync = WhiteboardSync::new(SESSION, "alice");
    let mut core = EngineCore::default();
    let change = core.add_shape(ShapeKind::Rect, 0.0, 0.0).unwrap();

    let frames = sync.outbound_frames(&change);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].syscall, "whiteboard:update");
    assert_eq!(frames[0].session_id.as_deref(), Some(SESSION));
    assert_eq!(frames[0].str_field("userId"), Some("alice"));
    assert_eq!(frames[0].str_field("data"), Some(core.snapshot().unwrap().as_str()));
}

#[test]
fn undo_sends_update_then_notice() {
    let sync = WhiteboardSync::new(SESSION, "alice");
    let mut core = EngineCore::default();
    core.add_shape(ShapeKind::Rect, 0.0, 0.0).unwrap();
    let change = core.undo().unwrap().unwrap();

    let events = sync.outbound(&change);
    assert!(matches!(&events[0], WhiteboardEvent::Update { data, .. } if data.is_blank()));
    assert_eq!(events[1], WhiteboardEvent::Undo { session_id: SESSION.into() });
}

#[test]
fn clear_sends_explicit_clear() {
    let sync = WhiteboardSync::new(SESSION, "alice");
    assert_eq!(sync.outbound(&Change::Cleared), vec![WhiteboardEvent::Clear { session_id: SESSION.into() }]);
}

#[test]
fn remote_update_replaces_surface_without_history() {
    let ((a_sync, mut a), (b_sync, mut b)) = pair();
    a.add_shape(ShapeKind::Rect, 0.0, 0.0).unwrap();
    b.add_shape(ShapeKind::Circle, 300.0, 300.0).unwrap();
    let change = a.add_shape(ShapeKind::Triangle, 200.0, 0.0).unwrap();

    for frame in a_sync.outbound_frames(&change) {
        assert_eq!(b_sync.apply_frame(&mut b, &relay(&frame, "alice")).unwrap(), RemoteOutcome::Applied);
    }
    assert_eq!(b.snapshot().unwrap(), a.snapshot().unwrap());
    assert_eq!(b.history().len(), 1);
}

#[test]
fn draw_on_a_appears_on_b_and_clear_propagates() {
    let ((a_sync, mut a), (b_sync, mut b)) = pair();

    a.set_tool(crate::input::Tool::Pen).unwrap();
    a.pointer_down(crate::doc::Point::new(0.0, 0.0), crate::input::Button::Primary).unwrap();
    a.pointer_move(crate::doc::Point::new(5.0, 5.0));
    for change in a.pointer_up(crate::doc::Point::new(10.0, 10.0)).unwrap() {
        for frame in a_sync.outbound_frames(&change) {
            b_sync.apply_frame(&mut b, &relay(&frame, "alice")).unwrap();
        }
    }
    assert_eq!(b.doc().len(), 1);
    assert_eq!(b.snapshot().unwrap(), a.snapshot().unwrap());

    b.add_shape(ShapeKind::Rect, 50.0, 50.0).unwrap();
    let cleared = a.clear();
    for frame in a_sync.outbound_frames(&cleared) {
        assert_eq!(b_sync.apply_frame(&mut b, &relay(&frame, "alice")).unwrap(), RemoteOutcome::Cleared);
    }
    assert!(b.doc().is_empty());
    assert_eq!(b.history().len(), 1);
    assert!(!b.can_redo());
}

#[test]
fn remote_undo_converges_via_update() {
    let ((a_sync, mut a), (b_sync, mut b)) = pair();
    let first = a.add_shape(ShapeKind::Rect, 0.0, 0.0).unwrap();
    let second = a.add_shape(ShapeKind::Rect, 200.0, 0.0).unwrap();
    for change in [first, second] {
        for frame in a_sync.outbound_frames(&change) {
            b_sync.apply_frame(&mut b, &relay(&frame, "alice")).unwrap();
        }
    }
    assert_eq!(b.doc().len(), 2);

    let undone = a.undo().unwrap().unwrap();
    let outcomes: Vec<RemoteOutcome> = a_sync
        .outbound_frames(&undone)
        .iter()
        .map(|frame| b_sync.apply_frame(&mut b, &relay(frame, "alice")).unwrap())
        .collect();
    assert_eq!(outcomes, vec![RemoteOutcome::Applied, RemoteOutcome::Ignored(IgnoreReason::Notice)]);
    assert_eq!(b.doc().len(), 1);
    assert!(b.history().is_empty());
}

#[test]
fn own_events_are_ignored() {
    let ((a_sync, mut a), _) = pair();
    let change = a.add_shape(ShapeKind::Rect, 0.0, 0.0).unwrap();
    let frame = relay(&a_sync.outbound_frames(&change)[0], "alice");

    a.add_shape(ShapeKind::Circle, 300.0, 0.0).unwrap();
    assert_eq!(a_sync.apply_frame(&mut a, &frame).unwrap(), RemoteOutcome::Ignored(IgnoreReason::Echo));
    assert_eq!(a.doc().len(), 2);

    let clear = relay(&a_sync.outbound_frames(&Change::Cleared)[0], "alice");
    assert_eq!(a_sync.apply_frame(&mut a, &clear).unwrap(), RemoteOutcome::Ignored(IgnoreReason::Echo));
    assert_eq!(a.doc().len(), 2);
}

#[test]
fn other_session_is_ignored() {
    let (_, (b_sync, mut b)) = pair();
    let foreign = WhiteboardEvent::Clear { session_id: "elsewhere".into() };
    b.add_shape(ShapeKind::Rect, 0.0, 0.0).unwrap();
    assert_eq!(
        b_sync.apply_remote(&mut b, &foreign, Some("carol")).unwrap(),
        RemoteOutcome::Ignored(IgnoreReason::OtherSession)
    );
    assert_eq!(b.doc().len(), 1);
}

#[test]
fn save_event_carries_current_snapshot() {
    let sync = WhiteboardSync::new(SESSION, "alice");
    let mut core = EngineCore::default();
    core.add_text("saved", 0.0, 0.0).unwrap();

    let frame = sync.save(&core).unwrap().to_frame();
    assert_eq!(frame.syscall, "whiteboard:save");
    assert_eq!(frame.str_field("canvasData"), Some(core.snapshot().unwrap().as_str()));

    let parsed = WhiteboardEvent::from_frame(&relay(&frame, "alice")).unwrap();
    assert!(matches!(parsed, WhiteboardEvent::Save { user_id, .. } if user_id == "alice"));
}

#[test]
fn update_with_bad_snapshot_is_rejected() {
    let frame = Frame::request(syscall::WHITEBOARD_UPDATE, json!({ "sessionId": SESSION, "data": "not json", "userId": "bob" }));
    assert!(matches!(WhiteboardEvent::from_frame(&frame), Err(SyncError::Surface(_))));
}

#[test]
fn update_without_user_is_rejected() {
    let frame = Frame::request(syscall::WHITEBOARD_UPDATE, json!({ "sessionId": SESSION, "data": "{\"objects\":[]}" }));
    assert!(matches!(
        WhiteboardEvent::from_frame(&frame),
        Err(SyncError::MissingField { field: "userId", .. })
    ));
}

#[test]
fn session_id_falls_back_to_frame_header() {
    let frame = Frame::request(syscall::WHITEBOARD_CLEAR, json!({})).with_session(SESSION);
    assert_eq!(WhiteboardEvent::from_frame(&frame).unwrap(), WhiteboardEvent::Clear { session_id: SESSION.into() });
}

#[test]
fn non_whiteboard_frame_is_rejected() {
    let frame = Frame::request(syscall::CHAT_MESSAGE, json!({}));
    assert!(matches!(WhiteboardEvent::from_frame(&frame), Err(SyncError::UnknownEvent(_))));
}
