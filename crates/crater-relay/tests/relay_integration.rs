#[allow(dead_code)]
mod common;

use std::time::Duration;

use serde_json::json;

use crater_core::net::messages::{ClientMessage, OPPONENT_LEFT, ServerMessage};
use common::{
    TestRelay, ws_connect, ws_guest, ws_host, ws_read_server_msg, ws_read_until, ws_send,
    ws_send_raw, ws_try_read,
};

#[tokio::test]
async fn connect_assigns_distinct_ids() {
    let relay = TestRelay::new().await;
    let (_a, a_id) = ws_connect(&relay.ws_url()).await;
    let (_b, b_id) = ws_connect(&relay.ws_url()).await;
    assert_ne!(a_id, b_id);
}

#[tokio::test]
async fn full_match_handshake() {
    let relay = TestRelay::new().await;
    let (mut host, host_id, code) = ws_host(&relay.ws_url(), "Alice").await;
    let (mut guest, guest_id) = ws_guest(&relay.ws_url(), "Bob", &code).await;

    let joined = ws_read_until(&mut host, |m| matches!(m, ServerMessage::PlayerJoined { .. })).await;
    assert!(matches!(joined, ServerMessage::PlayerJoined { can_start: true, .. }));

    ws_send(&mut host, &ClientMessage::StartGame).await;
    let host_start = ws_read_until(&mut host, |m| matches!(m, ServerMessage::GameStart { .. })).await;
    let guest_start =
        ws_read_until(&mut guest, |m| matches!(m, ServerMessage::GameStart { .. })).await;
    assert_eq!(host_start, guest_start);
    let ServerMessage::GameStart {
        players,
        first_player,
        ..
    } = host_start
    else {
        unreachable!();
    };
    assert_eq!(first_player, 0);
    assert_eq!(players[0].id, host_id);
    assert_eq!(players[1].id, guest_id);
    assert_eq!(players[1].name, "Bob");

    let action = json!({"type": "shoot", "angle": -1.2, "power": 0.8});
    ws_send(
        &mut host,
        &ClientMessage::GameAction {
            action: action.clone(),
        },
    )
    .await;
    assert_eq!(
        ws_read_server_msg(&mut guest).await,
        ServerMessage::GameAction {
            action,
            player_id: host_id,
        }
    );

    ws_send(&mut host, &ClientMessage::EndTurn).await;
    let change = ServerMessage::TurnChange {
        current_player: 1,
        player_name: Some("Bob".to_string()),
    };
    assert_eq!(ws_read_server_msg(&mut host).await, change);
    assert_eq!(ws_read_server_msg(&mut guest).await, change);

    ws_send(
        &mut guest,
        &ClientMessage::GameOver {
            winner: "B".to_string(),
        },
    )
    .await;
    let over = ServerMessage::GameOver {
        winner: "B".to_string(),
        reason: None,
    };
    assert_eq!(ws_read_server_msg(&mut host).await, over);
    assert_eq!(ws_read_server_msg(&mut guest).await, over);
}

#[tokio::test]
async fn dropped_connection_forfeits_match() {
    let relay = TestRelay::new().await;
    let (mut host, _host_id, code) = ws_host(&relay.ws_url(), "Alice").await;
    let (guest, _guest_id) = ws_guest(&relay.ws_url(), "Bob", &code).await;
    ws_send(&mut host, &ClientMessage::StartGame).await;
    ws_read_until(&mut host, |m| matches!(m, ServerMessage::GameStart { .. })).await;

    drop(guest);

    let over = ws_read_until(&mut host, |m| matches!(m, ServerMessage::GameOver { .. })).await;
    assert_eq!(
        over,
        ServerMessage::GameOver {
            winner: OPPONENT_LEFT.to_string(),
            reason: Some("Opponent disconnected".to_string()),
        }
    );
}

#[tokio::test]
async fn refusals_come_back_as_errors() {
    let relay = TestRelay::with_max_rooms(1).await;
    let (mut host, _host_id, _code) = ws_host(&relay.ws_url(), "Alice").await;

    ws_send(&mut host, &ClientMessage::StartGame).await;
    assert_eq!(
        ws_read_server_msg(&mut host).await,
        ServerMessage::Error {
            message: "Need 2 players to start".to_string()
        }
    );

    let (mut other, _) = ws_connect(&relay.ws_url()).await;
    ws_send(&mut other, &ClientMessage::CreateRoom).await;
    assert_eq!(
        ws_read_server_msg(&mut other).await,
        ServerMessage::Error {
            message: "Maximum room limit reached".to_string()
        }
    );
}

#[tokio::test]
async fn junk_frames_are_dropped_without_closing() {
    let relay = TestRelay::new().await;
    let (mut stream, _) = ws_connect(&relay.ws_url()).await;

    ws_send_raw(&mut stream, "not json at all".to_string()).await;
    ws_send_raw(&mut stream, r#"{"type":"teleport"}"#.to_string()).await;
    ws_send_raw(&mut stream, "x".repeat(70 * 1024)).await;
    assert!(ws_try_read(&mut stream, Duration::from_millis(200)).await.is_none());

    ws_send(
        &mut stream,
        &ClientMessage::SetName {
            name: "Still here".to_string(),
        },
    )
    .await;
    assert_eq!(
        ws_read_server_msg(&mut stream).await,
        ServerMessage::NameSet {
            name: "Still here".to_string()
        }
    );
}
