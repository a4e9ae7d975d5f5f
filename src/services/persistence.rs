//! Persistence service — game records and the results query.
//!
//! DESIGN
//! ======
//! Game lifecycle events (start, each move, finish) are queued as
//! [`GameRecord`]s on a bounded channel and applied in order by a single
//! background writer, so the hub lock is never held across database I/O.
//! Game ids are minted in memory before the record is queued; a storage
//! outage therefore never blocks play.
//!
//! ERROR HANDLING
//! ==============
//! Recording is fire-and-forget. A full or closed queue drops the record
//! with a warning and a failed write is logged; neither reaches a player.

use std::sync::Arc;

use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::rules::{Color, Move};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("game storage is not configured")]
    Unavailable,
}

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WinCount {
    /// Winning side as recorded (`red` or `black`).
    pub player: String,
    pub wins: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameRecord {
    Created { game_id: Uuid, room_id: Uuid, red: String, black: String },
    Move { game_id: Uuid, index: u32, mv: Move, piece: String },
    Finished { game_id: Uuid, winner: Color },
}

impl GameRecord {
    fn game_id(&self) -> Uuid {
        match self {
            Self::Created { game_id, .. } | Self::Move { game_id, .. } | Self::Finished { game_id, .. } => *game_id,
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// Durable storage for finished and in-progress games.
#[async_trait::async_trait]
pub trait GameStore: Send + Sync {
    async fn create_game(&self, game_id: Uuid, room_id: Uuid, red: &str, black: &str) -> Result<(), StoreError>;
    async fn add_move(&self, game_id: Uuid, index: u32, mv: Move, piece: &str) -> Result<(), StoreError>;
    async fn finish_game(&self, game_id: Uuid, winner: Color) -> Result<(), StoreError>;
    /// Win counts grouped by winner, most wins first.
    async fn leaderboard(&self) -> Result<Vec<WinCount>, StoreError>;
}

/// Postgres-backed store. Schema lives in `src/db/migrations`.
pub struct PgGameStore {
    pool: PgPool,
}

impl PgGameStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl GameStore for PgGameStore {
    async fn create_game(&self, game_id: Uuid, room_id: Uuid, red: &str, black: &str) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO games (id, room_id, player_red, player_black) VALUES ($1, $2, $3, $4)")
            .bind(game_id)
            .bind(room_id)
            .bind(red)
            .bind(black)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn add_move(&self, game_id: Uuid, index: u32, mv: Move, piece: &str) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO moves (game_id, move_index, from_x, from_y, to_x, to_y, piece) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(game_id)
        .bind(i64::from(index))
        .bind(mv.from.x)
        .bind(mv.from.y)
        .bind(mv.to.x)
        .bind(mv.to.y)
        .bind(piece)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn finish_game(&self, game_id: Uuid, winner: Color) -> Result<(), StoreError> {
        sqlx::query("UPDATE games SET winner = $2, ended_at = now() WHERE id = $1")
            .bind(game_id)
            .bind(winner.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn leaderboard(&self) -> Result<Vec<WinCount>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT winner, COUNT(*) AS wins FROM games WHERE winner IS NOT NULL \
             GROUP BY winner ORDER BY wins DESC, winner",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(player, wins)| WinCount { player, wins }).collect())
    }
}

/// Store used when no database is configured: writes succeed and vanish,
/// queries report the store as unavailable.
pub struct NullGameStore;

#[async_trait::async_trait]
impl GameStore for NullGameStore {
    async fn create_game(&self, game_id: Uuid, _room_id: Uuid, _red: &str, _black: &str) -> Result<(), StoreError> {
        debug!(%game_id, "game record discarded (no storage)");
        Ok(())
    }

    async fn add_move(&self, _game_id: Uuid, _index: u32, _mv: Move, _piece: &str) -> Result<(), StoreError> {
        Ok(())
    }

    async fn finish_game(&self, game_id: Uuid, _winner: Color) -> Result<(), StoreError> {
        debug!(%game_id, "game result discarded (no storage)");
        Ok(())
    }

    async fn leaderboard(&self) -> Result<Vec<WinCount>, StoreError> {
        Err(StoreError::Unavailable)
    }
}

// =============================================================================
// RECORDER
// =============================================================================

/// Non-blocking handle for queueing game records. Cloned into every task that
/// can start, advance or end a game.
#[derive(Clone)]
pub struct GameRecorder {
    tx: mpsc::Sender<GameRecord>,
}

impl GameRecorder {
    #[must_use]
    pub fn new(tx: mpsc::Sender<GameRecord>) -> Self {
        Self { tx }
    }

    pub fn create_game(&self, game_id: Uuid, room_id: Uuid, red: &str, black: &str) {
        self.enqueue(GameRecord::Created { game_id, room_id, red: red.to_owned(), black: black.to_owned() });
    }

    pub fn add_move(&self, game_id: Uuid, index: u32, mv: Move, piece: &str) {
        self.enqueue(GameRecord::Move { game_id, index, mv, piece: piece.to_owned() });
    }

    pub fn finish_game(&self, game_id: Uuid, winner: Color) {
        self.enqueue(GameRecord::Finished { game_id, winner });
    }

    fn enqueue(&self, record: GameRecord) {
        let game_id = record.game_id();
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(%game_id, "game record queue full; dropping record");
            }
            Err(TrySendError::Closed(_)) => {
                warn!(%game_id, "game record queue closed; dropping record");
            }
        }
    }
}

/// Spawn the single writer that applies queued records in order. Returns the
/// recorder feeding it and the worker handle; the worker exits once every
/// recorder clone is dropped and the queue is drained.
#[must_use]
pub fn spawn_record_worker(store: Arc<dyn GameStore>, queue_capacity: usize) -> (GameRecorder, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<GameRecord>(queue_capacity.max(1));
    info!(queue_capacity, "game record worker configured");

    let handle = tokio::spawn(async move {
        while let Some(record) = rx.recv().await {
            apply_record(store.as_ref(), record).await;
        }
        debug!("game record worker stopped");
    });

    (GameRecorder::new(tx), handle)
}

async fn apply_record(store: &dyn GameStore, record: GameRecord) {
    let game_id = record.game_id();
    let result = match record {
        GameRecord::Created { game_id, room_id, red, black } => store.create_game(game_id, room_id, &red, &black).await,
        GameRecord::Move { game_id, index, mv, piece } => store.add_move(game_id, index, mv, &piece).await,
        GameRecord::Finished { game_id, winner } => store.finish_game(game_id, winner).await,
    };
    if let Err(e) = result {
        error!(error = %e, %game_id, "game record write failed");
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
