mod common;

use std::time::Duration;

use uuid::Uuid;

use common::{TestClient, TestServer};
use thescene_server::websocket::{ClientEvent, PresenceStatus, ServerEvent};

const SILENCE_WINDOW: Duration = Duration::from_millis(500);

fn offline_for(user: Uuid) -> impl FnMut(&ServerEvent) -> bool {
    move |event| {
        matches!(
            event,
            ServerEvent::PresenceChanged { user_id, status: PresenceStatus::Offline }
                if *user_id == user
        )
    }
}

#[test_log::test(tokio::test)]
async fn rejects_invalid_token_before_registering() {
    let server = TestServer::spawn().await;

    let mut client = TestClient::connect(server.addr).await;
    match client.authenticate("not-a-real-token").await {
        Some(ServerEvent::AuthResult { success: false, error }) => {
            assert!(error.is_some());
        }
        other => panic!("expected failed auth result, got {:?}", other),
    }

    // The server hangs up on failed auth; nothing more arrives.
    assert!(client.wait_for(|_| true).await.is_none());
}

#[test_log::test(tokio::test)]
async fn announces_presence_to_connected_clients() {
    let server = TestServer::spawn().await;

    let observer_id = Uuid::new_v4();
    let mut observer = TestClient::connect_as(&server, observer_id, "observer").await;

    let newcomer_id = Uuid::new_v4();
    let _newcomer = TestClient::connect_as(&server, newcomer_id, "newcomer").await;

    let event = observer
        .wait_for(|event| {
            matches!(
                event,
                ServerEvent::PresenceChanged { user_id, status: PresenceStatus::Online }
                    if *user_id == newcomer_id
            )
        })
        .await;
    assert!(event.is_some(), "observer never saw the newcomer come online");
}

#[test_log::test(tokio::test)]
async fn direct_message_is_stored_then_delivered() {
    let server = TestServer::spawn().await;

    let alice_id = Uuid::new_v4();
    let bob_id = Uuid::new_v4();
    let mut alice = TestClient::connect_as(&server, alice_id, "alice").await;
    let mut bob = TestClient::connect_as(&server, bob_id, "bob").await;

    alice
        .send(&ClientEvent::DirectMessage {
            receiver_id: bob_id,
            content: "hey bob".to_string(),
            image: None,
            video: None,
        })
        .await;

    let event = bob
        .wait_for(|event| matches!(event, ServerEvent::DirectMessage(_)))
        .await;
    match event {
        Some(ServerEvent::DirectMessage(message)) => {
            assert_eq!(message.sender_id, alice_id);
            assert_eq!(message.receiver_id, bob_id);
            assert_eq!(message.sender_name, "alice");
            assert_eq!(message.content, "hey bob");
            // Delivered payload is the stored record.
            assert_eq!(server.store.direct.lock().await.len(), 1);
            assert_eq!(server.store.direct.lock().await[0].id, message.id);
        }
        other => panic!("expected direct message, got {:?}", other),
    }

    // Sending to the sender's own id is refused.
    alice
        .send(&ClientEvent::DirectMessage {
            receiver_id: alice_id,
            content: "talking to myself".to_string(),
            image: None,
            video: None,
        })
        .await;
    assert!(alice
        .wait_for(|event| matches!(event, ServerEvent::Error { .. }))
        .await
        .is_some());
    assert_eq!(server.store.direct.lock().await.len(), 1);
}

#[test_log::test(tokio::test)]
async fn message_to_offline_user_is_dropped_silently() {
    let server = TestServer::spawn().await;

    let alice_id = Uuid::new_v4();
    let mut alice = TestClient::connect_as(&server, alice_id, "alice").await;

    // Nobody is listening for this recipient; the message is stored,
    // the delivery silently counts zero, and the connection stays up.
    alice
        .send(&ClientEvent::DirectMessage {
            receiver_id: Uuid::new_v4(),
            content: "anyone home?".to_string(),
            image: None,
            video: None,
        })
        .await;
    assert!(
        alice
            .expect_silence(
                |event| matches!(event, ServerEvent::Error { .. }),
                SILENCE_WINDOW
            )
            .await
    );
    assert_eq!(server.store.direct.lock().await.len(), 1);

    // Still alive afterwards.
    alice.send(&ClientEvent::Ping).await;
    assert!(alice
        .wait_for(|event| matches!(event, ServerEvent::Pong))
        .await
        .is_some());
}

#[test_log::test(tokio::test)]
async fn second_connection_does_not_flicker_offline() {
    let server = TestServer::spawn().await;

    let mut observer = TestClient::connect_as(&server, Uuid::new_v4(), "observer").await;

    let user_id = Uuid::new_v4();
    let phone = TestClient::connect_as(&server, user_id, "ada").await;
    let laptop = TestClient::connect_as(&server, user_id, "ada").await;

    // Dropping one of two connections must not announce offline.
    phone.close().await;
    assert!(
        observer.expect_silence(offline_for(user_id), SILENCE_WINDOW).await,
        "user flickered offline while still connected"
    );

    // Dropping the last one announces offline exactly once.
    laptop.close().await;
    assert!(observer.wait_for(offline_for(user_id)).await.is_some());
    assert!(
        observer.expect_silence(offline_for(user_id), SILENCE_WINDOW).await,
        "offline announced more than once"
    );
}

#[test_log::test(tokio::test)]
async fn room_join_message_and_leave_flow() {
    let server = TestServer::spawn().await;

    let alice_id = Uuid::new_v4();
    let bob_id = Uuid::new_v4();
    let mut alice = TestClient::connect_as(&server, alice_id, "alice").await;
    let mut bob = TestClient::connect_as(&server, bob_id, "bob").await;

    alice
        .send(&ClientEvent::RoomJoin {
            room_id: "jazz".to_string(),
        })
        .await;
    assert!(alice
        .wait_for(|event| matches!(
            event,
            ServerEvent::MemberJoined { user_id, .. } if *user_id == alice_id
        ))
        .await
        .is_some());

    bob.send(&ClientEvent::RoomJoin {
        room_id: "jazz".to_string(),
    })
    .await;
    assert!(alice
        .wait_for(|event| matches!(
            event,
            ServerEvent::MemberJoined { user_id, username, .. }
                if *user_id == bob_id && username == "bob"
        ))
        .await
        .is_some());

    alice
        .send(&ClientEvent::RoomMessage {
            room_id: "jazz".to_string(),
            content: "take five".to_string(),
            image: None,
            video: None,
        })
        .await;
    match bob
        .wait_for(|event| matches!(event, ServerEvent::RoomMessage(_)))
        .await
    {
        Some(ServerEvent::RoomMessage(message)) => {
            assert_eq!(message.room_id, "jazz");
            assert_eq!(message.sender_id, alice_id);
            assert_eq!(message.content, "take five");
        }
        other => panic!("expected room message, got {:?}", other),
    }
    assert_eq!(server.store.room.lock().await.len(), 1);

    bob.send(&ClientEvent::RoomLeave {
        room_id: "jazz".to_string(),
    })
    .await;
    assert!(alice
        .wait_for(|event| matches!(
            event,
            ServerEvent::MemberLeft { user_id, .. } if *user_id == bob_id
        ))
        .await
        .is_some());
}

#[test_log::test(tokio::test)]
async fn disconnect_purges_every_room_membership() {
    let server = TestServer::spawn().await;

    let leaver_id = Uuid::new_v4();
    let mut leaver = TestClient::connect_as(&server, leaver_id, "ada").await;

    let mut r1_witness = TestClient::connect_as(&server, Uuid::new_v4(), "lin").await;
    let mut r2_witness = TestClient::connect_as(&server, Uuid::new_v4(), "sam").await;

    r1_witness
        .send(&ClientEvent::RoomJoin { room_id: "r1".to_string() })
        .await;
    r2_witness
        .send(&ClientEvent::RoomJoin { room_id: "r2".to_string() })
        .await;
    for room in ["r1", "r2"] {
        leaver
            .send(&ClientEvent::RoomJoin { room_id: room.to_string() })
            .await;
    }

    // Make sure both joins landed before dropping the connection.
    assert!(r1_witness
        .wait_for(|event| matches!(
            event,
            ServerEvent::MemberJoined { user_id, room_id, .. }
                if *user_id == leaver_id && room_id == "r1"
        ))
        .await
        .is_some());
    assert!(r2_witness
        .wait_for(|event| matches!(
            event,
            ServerEvent::MemberJoined { user_id, room_id, .. }
                if *user_id == leaver_id && room_id == "r2"
        ))
        .await
        .is_some());

    leaver.close().await;

    assert!(r1_witness
        .wait_for(|event| matches!(
            event,
            ServerEvent::MemberLeft { user_id, room_id, username }
                if *user_id == leaver_id && room_id == "r1" && username == "ada"
        ))
        .await
        .is_some());
    assert!(r2_witness
        .wait_for(|event| matches!(
            event,
            ServerEvent::MemberLeft { user_id, room_id, .. }
                if *user_id == leaver_id && room_id == "r2"
        ))
        .await
        .is_some());
}

#[test_log::test(tokio::test)]
async fn typing_indicators_reach_only_the_target() {
    let server = TestServer::spawn().await;

    let alice_id = Uuid::new_v4();
    let bob_id = Uuid::new_v4();
    let mut alice = TestClient::connect_as(&server, alice_id, "alice").await;
    let mut bob = TestClient::connect_as(&server, bob_id, "bob").await;
    let mut carol = TestClient::connect_as(&server, Uuid::new_v4(), "carol").await;

    alice
        .send(&ClientEvent::Typing { receiver_id: bob_id })
        .await;
    match bob
        .wait_for(|event| matches!(event, ServerEvent::Typing { .. }))
        .await
    {
        Some(ServerEvent::Typing { user_id, username }) => {
            assert_eq!(user_id, alice_id);
            assert_eq!(username, "alice");
        }
        other => panic!("expected typing event, got {:?}", other),
    }
    assert!(
        carol
            .expect_silence(
                |event| matches!(event, ServerEvent::Typing { .. }),
                SILENCE_WINDOW
            )
            .await
    );

    alice
        .send(&ClientEvent::StopTyping { receiver_id: bob_id })
        .await;
    assert!(bob
        .wait_for(|event| matches!(event, ServerEvent::StopTyping { .. }))
        .await
        .is_some());
}

#[test_log::test(tokio::test)]
async fn like_and_comment_notifications_broadcast() {
    let server = TestServer::spawn().await;

    let alice_id = Uuid::new_v4();
    let mut alice = TestClient::connect_as(&server, alice_id, "alice").await;
    let mut bob = TestClient::connect_as(&server, Uuid::new_v4(), "bob").await;

    let post_id = Uuid::new_v4();
    alice.send(&ClientEvent::LikePost { post_id }).await;
    match bob
        .wait_for(|event| matches!(event, ServerEvent::PostLiked { .. }))
        .await
    {
        Some(ServerEvent::PostLiked { post_id: liked, user_id, .. }) => {
            assert_eq!(liked, post_id);
            assert_eq!(user_id, alice_id);
        }
        other => panic!("expected post-liked, got {:?}", other),
    }

    let comment_id = Uuid::new_v4();
    alice
        .send(&ClientEvent::NewComment { post_id, comment_id })
        .await;
    assert!(bob
        .wait_for(|event| matches!(
            event,
            ServerEvent::CommentAdded { comment_id: added, .. } if *added == comment_id
        ))
        .await
        .is_some());
}

#[test_log::test(tokio::test)]
async fn malformed_frames_get_an_error_without_closing() {
    let server = TestServer::spawn().await;

    let mut alice = TestClient::connect_as(&server, Uuid::new_v4(), "alice").await;

    alice.send_raw("{definitely not json").await;
    assert!(alice
        .wait_for(|event| matches!(event, ServerEvent::Error { .. }))
        .await
        .is_some());

    // Session survives the bad frame.
    alice.send(&ClientEvent::Ping).await;
    assert!(alice
        .wait_for(|event| matches!(event, ServerEvent::Pong))
        .await
        .is_some());
}
