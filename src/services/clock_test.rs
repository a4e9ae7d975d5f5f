use super::*;
use crate::protocol::Clocks;
use crate::rules::Color;
use crate::services::persistence::GameRecord;
use crate::state::GameSettings;
use crate::state::test_helpers::{self, drain, kinds, recv_message, start_match};

fn current_game(hub: &Hub, room_id: RoomId) -> Uuid {
    hub.rooms[&room_id].game_id.expect("active game")
}

#[tokio::test]
async fn tick_decrements_side_to_move_and_broadcasts() {
    let state = test_helpers::test_app_state();
    let mut game = start_match(&state, "alice", "bob").await;
    let mut hub = state.hub.lock().await;
    let game_id = current_game(&hub, game.room_id);

    assert_eq!(tick(&mut hub, &state.recorder, game.room_id, game_id), Tick::Counted);
    assert_eq!(hub.rooms[&game.room_id].clocks, Clocks { red: 299, black: 300 });

    hub.rooms.get_mut(&game.room_id).expect("room").turn = Color::Black;
    assert_eq!(tick(&mut hub, &state.recorder, game.room_id, game_id), Tick::Counted);
    assert_eq!(hub.rooms[&game.room_id].clocks, Clocks { red: 299, black: 299 });
    drop(hub);

    let msgs = drain(&mut game.black.rx);
    assert_eq!(kinds(&msgs), vec!["clock_update", "clock_update"]);
    assert_eq!(msgs[1], ServerMessage::ClockUpdate { clocks: Clocks { red: 299, black: 299 } });
    assert_eq!(drain(&mut game.red.rx).len(), 2);
}

#[tokio::test]
async fn clock_reaching_zero_forfeits_on_time() {
    let (state, mut records) = test_helpers::test_app_state_with_records();
    let mut game = start_match(&state, "alice", "bob").await;
    let mut hub = state.hub.lock().await;
    let game_id = current_game(&hub, game.room_id);
    hub.rooms.get_mut(&game.room_id).expect("room").clocks = Clocks { red: 1, black: 300 };

    assert_eq!(tick(&mut hub, &state.recorder, game.room_id, game_id), Tick::Expired);
    let room = &hub.rooms[&game.room_id];
    assert!(!room.is_active());
    assert!(room.clock.is_none());
    drop(hub);

    let msgs = drain(&mut game.black.rx);
    assert_eq!(
        msgs,
        vec![
            ServerMessage::ClockUpdate { clocks: Clocks { red: 0, black: 300 } },
            ServerMessage::GameOver { winner: Color::Black, reason: TIME_FORFEIT.into() },
        ]
    );
    let _created = records.try_recv().expect("created record");
    assert_eq!(records.try_recv().expect("finish record"), GameRecord::Finished { game_id, winner: Color::Black });
}

#[tokio::test]
async fn tick_without_active_game_is_idle() {
    let state = test_helpers::test_app_state();
    let mut game = start_match(&state, "alice", "bob").await;
    let mut hub = state.hub.lock().await;
    let game_id = current_game(&hub, game.room_id);
    hub.rooms.get_mut(&game.room_id).expect("room").game_id = None;

    assert_eq!(tick(&mut hub, &state.recorder, game.room_id, game_id), Tick::Idle);
    assert_eq!(hub.rooms[&game.room_id].clocks, Clocks::new(300));
    drop(hub);
    assert!(drain(&mut game.red.rx).is_empty());
}

#[tokio::test]
async fn tick_for_stale_game_or_missing_room_stops() {
    let state = test_helpers::test_app_state();
    let game = start_match(&state, "alice", "bob").await;
    let mut hub = state.hub.lock().await;

    assert_eq!(tick(&mut hub, &state.recorder, game.room_id, Uuid::new_v4()), Tick::Stale);
    assert_eq!(hub.rooms[&game.room_id].clocks, Clocks::new(300));
    assert_eq!(tick(&mut hub, &state.recorder, Uuid::new_v4(), Uuid::new_v4()), Tick::Stale);
}

#[tokio::test]
async fn running_clock_ticks_until_forfeit() {
    let settings = GameSettings { clock_seconds: 2, tick: Duration::from_millis(10), ..GameSettings::default() };
    let (state, _records) = test_helpers::test_app_state_with(settings);
    let mut game = start_match(&state, "alice", "bob").await;

    assert_eq!(
        recv_message(&mut game.black.rx).await,
        ServerMessage::ClockUpdate { clocks: Clocks { red: 1, black: 2 } }
    );
    assert_eq!(
        recv_message(&mut game.black.rx).await,
        ServerMessage::ClockUpdate { clocks: Clocks { red: 0, black: 2 } }
    );
    assert_eq!(
        recv_message(&mut game.black.rx).await,
        ServerMessage::GameOver { winner: Color::Black, reason: TIME_FORFEIT.into() }
    );
    test_helpers::assert_channel_empty(&mut game.black.rx).await;
}

#[tokio::test]
async fn dropping_the_handle_cancels_the_task() {
    let settings = GameSettings { tick: Duration::from_millis(10), ..GameSettings::default() };
    let (state, _records) = test_helpers::test_app_state_with(settings);
    let mut game = start_match(&state, "alice", "bob").await;
    state.hub.lock().await.rooms.get_mut(&game.room_id).expect("room").stop_clock();
    drain(&mut game.red.rx);

    test_helpers::assert_channel_empty(&mut game.red.rx).await;
    let hub = state.hub.lock().await;
    assert!(hub.rooms[&game.room_id].is_active());
}

#[tokio::test]
async fn time_spent_waiting_for_the_lock_is_still_charged() {
    let settings = GameSettings { tick: Duration::from_millis(20), ..GameSettings::default() };
    let (state, _records) = test_helpers::test_app_state_with(settings);
    let game = start_match(&state, "alice", "bob").await;

    let hub = state.hub.lock().await;
    tokio::time::sleep(Duration::from_millis(300)).await;
    drop(hub);
    tokio::time::sleep(Duration::from_millis(40)).await;

    let hub = state.hub.lock().await;
    let clocks = hub.rooms[&game.room_id].clocks;
    assert!(clocks.red <= 290, "missed ticks were not charged: {clocks:?}");
    assert_eq!(clocks.black, 300);
}
