//! Clock service — one countdown task per active game.
//!
//! DESIGN
//! ======
//! Each task ticks on a fixed interval and does all of its work under the hub
//! lock: decrement the side to move, broadcast `clock_update`, and end the
//! game on time once a clock reaches zero.
//!
//! The task remembers the game id it was started for. If the room is gone or
//! now holds a different game, the task exits on its own, so a stale task can
//! never touch a rematch. Cancelling is done by dropping the [`ClockHandle`].

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, info};
use uuid::Uuid;

use super::{broadcast, persistence::GameRecorder, room};
use crate::protocol::ServerMessage;
use crate::state::{Hub, RoomId};

pub const TIME_FORFEIT: &str = "time forfeit";

/// Owns a running clock task and aborts it on drop.
#[derive(Debug)]
pub struct ClockHandle(JoinHandle<()>);

impl Drop for ClockHandle {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Outcome of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tick {
    /// One second was taken from the side to move.
    Counted,
    /// No game is running; nothing happened.
    Idle,
    /// The side to move ran out of time and the game is over.
    Expired,
    /// The room is gone or plays a different game.
    Stale,
}

/// Spawn the clock for `game_id` in `room_id`.
pub fn start(hub: Arc<Mutex<Hub>>, recorder: GameRecorder, room_id: RoomId, game_id: Uuid, tick: Duration) -> ClockHandle {
    debug!(%room_id, %game_id, tick_ms = tick.as_millis(), "clock started");
    ClockHandle(tokio::spawn(run(hub, recorder, room_id, game_id, tick)))
}

async fn run(hub: Arc<Mutex<Hub>>, recorder: GameRecorder, room_id: RoomId, game_id: Uuid, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    // Burst: ticks missed while the hub lock is held still cost the side to move.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);
    loop {
        ticker.tick().await;
        let mut guard = hub.lock().await;
        match tick(&mut guard, &recorder, room_id, game_id) {
            Tick::Counted | Tick::Idle => {}
            Tick::Expired | Tick::Stale => break,
        }
    }
    debug!(%room_id, %game_id, "clock task exited");
}

/// Advance the clock of `room_id` by one second.
pub(crate) fn tick(hub: &mut Hub, recorder: &GameRecorder, room_id: RoomId, game_id: Uuid) -> Tick {
    let Some(room) = hub.rooms.get_mut(&room_id) else {
        return Tick::Stale;
    };
    match room.game_id {
        None => return Tick::Idle,
        Some(current) if current != game_id => return Tick::Stale,
        Some(_) => {}
    }

    let side = room.turn;
    let remaining = room.clocks.tick(side);
    broadcast::to_room(&hub.connections, room, &ServerMessage::ClockUpdate { clocks: room.clocks }, None);

    if remaining > 0 {
        return Tick::Counted;
    }
    info!(%room_id, %game_id, loser = %side, "clock expired");
    room::finish_game(recorder, &hub.connections, room, side.opponent(), TIME_FORFEIT);
    Tick::Expired
}

#[cfg(test)]
#[path = "clock_test.rs"]
mod tests;
