use super::*;
use crate::rules::Color;
use crate::services::challenge;
use crate::state::test_helpers::{self, assert_channel_empty, connect, drain, join, kinds, recv_message, start_match};

#[tokio::test]
async fn join_lobby_welcomes_and_updates_lobby() {
    let state = test_helpers::test_app_state();
    let (alice, mut alice_rx) = join(&state, "alice").await;
    let (bob, mut bob_rx) = connect(&state).await;

    let replies = join_lobby(&mut *state.hub.lock().await, bob, Some("bob".into())).expect("join");
    assert_eq!(replies, vec![ServerMessage::system("Welcome bob to the lobby.")]);

    let update = ServerMessage::LobbyUpdate { players: vec!["alice".into(), "bob".into()] };
    assert_eq!(recv_message(&mut alice_rx).await, update);
    assert_eq!(recv_message(&mut bob_rx).await, update);
    let hub = state.hub.lock().await;
    assert_eq!(hub.location_of(alice), Some(Location::Lobby));
    assert_eq!(hub.name_of(bob), Some("bob"));
}

#[tokio::test]
async fn join_lobby_without_name_assigns_default() {
    let state = test_helpers::test_app_state();
    let (conn, _rx) = connect(&state).await;
    let replies = join_lobby(&mut *state.hub.lock().await, conn, None).expect("join");

    let hub = state.hub.lock().await;
    let name = hub.name_of(conn).expect("named").to_owned();
    let number: u32 = name.strip_prefix('P').expect("P prefix").parse().expect("numeric suffix");
    assert!(number < 1000);
    assert_eq!(replies, vec![ServerMessage::system(format!("Welcome {name} to the lobby."))]);
}

#[tokio::test]
async fn blank_name_is_treated_as_missing() {
    let state = test_helpers::test_app_state();
    let (conn, _rx) = connect(&state).await;
    join_lobby(&mut *state.hub.lock().await, conn, Some("   ".into())).expect("join");
    let hub = state.hub.lock().await;
    assert!(hub.name_of(conn).is_some_and(|name| name.starts_with('P')));
}

#[tokio::test]
async fn rejoining_keeps_name_when_none_given() {
    let state = test_helpers::test_app_state();
    let (alice, _rx) = join(&state, "alice").await;
    join_lobby(&mut *state.hub.lock().await, alice, None).expect("rejoin");
    let hub = state.hub.lock().await;
    assert_eq!(hub.name_of(alice), Some("alice"));
    assert_eq!(hub.lobby_players(), vec!["alice".to_string()]);
}

#[tokio::test]
async fn taken_name_is_rejected() {
    let state = test_helpers::test_app_state();
    let (_alice, _rx) = join(&state, "alice").await;
    let (other, _orx) = connect(&state).await;
    let err = join_lobby(&mut *state.hub.lock().await, other, Some("alice".into())).expect_err("duplicate");
    assert_eq!(err, SessionError::NameTaken("alice".into()));
    assert_eq!(err.to_string(), "name already taken");
    assert_eq!(state.hub.lock().await.location_of(other), Some(Location::Unassigned));
}

#[tokio::test]
async fn renaming_drops_challenges_under_the_old_name() {
    let state = test_helpers::test_app_state();
    let (alice, _a) = join(&state, "alice").await;
    let (_bob, _b) = join(&state, "bob").await;
    let mut hub = state.hub.lock().await;
    challenge::challenge(&mut hub, alice, "bob").expect("challenge");

    join_lobby(&mut hub, alice, Some("alicia".into())).expect("rename");
    assert!(hub.challenges.is_empty());
    assert_eq!(hub.lobby_players(), vec!["alicia".to_string(), "bob".to_string()]);
}

#[tokio::test]
async fn join_lobby_while_seated_is_rejected() {
    let state = test_helpers::test_app_state();
    let game = start_match(&state, "alice", "bob").await;
    let err = join_lobby(&mut *state.hub.lock().await, game.red.conn_id, None).expect_err("seated");
    assert_eq!(err, SessionError::AlreadyInRoom);
}

// =============================================================================
// leave_game
// =============================================================================

#[tokio::test]
async fn leave_game_forfeits_and_returns_to_lobby() {
    let state = test_helpers::test_app_state();
    let (_carol, mut carol_rx) = join(&state, "carol").await;
    let mut game = start_match(&state, "alice", "bob").await;
    drain(&mut carol_rx);

    let replies = leave_game(&state.recorder, &mut *state.hub.lock().await, game.black.conn_id).expect("leave");
    assert_eq!(replies, vec![ServerMessage::system("Returned to the lobby.")]);

    assert_eq!(
        drain(&mut game.red.rx),
        vec![ServerMessage::GameOver { winner: Color::Red, reason: "bob (black) left the game".into() }]
    );
    assert_eq!(kinds(&drain(&mut game.black.rx)), vec!["lobby_update"]);
    assert_eq!(
        drain(&mut carol_rx),
        vec![ServerMessage::LobbyUpdate { players: vec!["carol".into(), "bob".into()] }]
    );
    let hub = state.hub.lock().await;
    assert_eq!(hub.location_of(game.black.conn_id), Some(Location::Lobby));
    assert_eq!(hub.rooms[&game.room_id].seats.len(), 1);
}

#[tokio::test]
async fn leave_game_from_lobby_is_a_no_op() {
    let state = test_helpers::test_app_state();
    let (alice, mut rx) = join(&state, "alice").await;
    let replies = leave_game(&state.recorder, &mut *state.hub.lock().await, alice).expect("leave");
    assert!(replies.is_empty());
    assert_channel_empty(&mut rx).await;
}

#[tokio::test]
async fn leave_game_for_unnamed_connection_does_nothing() {
    let state = test_helpers::test_app_state();
    let (conn, _rx) = connect(&state).await;
    let replies = leave_game(&state.recorder, &mut *state.hub.lock().await, conn).expect("leave");
    assert!(replies.is_empty());
    assert_eq!(state.hub.lock().await.location_of(conn), Some(Location::Unassigned));
}

// =============================================================================
// disconnect
// =============================================================================

#[tokio::test]
async fn disconnect_from_lobby_updates_remaining_members() {
    let state = test_helpers::test_app_state();
    let (alice, _a) = join(&state, "alice").await;
    let (_bob, mut bob_rx) = join(&state, "bob").await;
    {
        let mut hub = state.hub.lock().await;
        challenge::challenge(&mut hub, alice, "bob").expect("challenge");
    }
    drain(&mut bob_rx);

    disconnect(&state.recorder, &mut *state.hub.lock().await, alice);
    assert_eq!(drain(&mut bob_rx), vec![ServerMessage::LobbyUpdate { players: vec!["bob".into()] }]);
    let hub = state.hub.lock().await;
    assert!(hub.challenges.is_empty());
    assert_eq!(hub.find_by_name("alice"), None);
}

#[tokio::test]
async fn disconnect_frees_the_name() {
    let state = test_helpers::test_app_state();
    let (alice, _a) = join(&state, "alice").await;
    disconnect(&state.recorder, &mut *state.hub.lock().await, alice);
    let (again, _rx) = connect(&state).await;
    assert!(join_lobby(&mut *state.hub.lock().await, again, Some("alice".into())).is_ok());
}

#[tokio::test]
async fn disconnect_unknown_connection_is_harmless() {
    let state = test_helpers::test_app_state();
    disconnect(&state.recorder, &mut *state.hub.lock().await, uuid::Uuid::new_v4());
    assert!(state.hub.lock().await.connections.is_empty());
}
