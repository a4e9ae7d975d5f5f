//! Results query — win counts by winning side.

use axum::Json;
use axum::extract::State;
use tracing::warn;

use crate::services::persistence::WinCount;
use crate::state::AppState;

/// `GET /leaderboard`. Storage failures degrade to an empty list.
pub async fn leaderboard(State(state): State<AppState>) -> Json<Vec<WinCount>> {
    match state.store.leaderboard().await {
        Ok(rows) => Json(rows),
        Err(e) => {
            warn!(error = %e, "leaderboard query failed");
            Json(Vec::new())
        }
    }
}

#[cfg(test)]
#[path = "leaderboard_test.rs"]
mod tests;
