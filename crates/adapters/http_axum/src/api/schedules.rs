//! Scheduler bookkeeping.

use axum::Json;
use axum::extract::State;

use hausbus_domain::schedule::ScheduleSnapshot;

use crate::state::AppState;

/// `GET /api/schedules`: every registered schedule and pending delayed
/// action with its last outcome.
pub async fn list(State(state): State<AppState>) -> Json<Vec<ScheduleSnapshot>> {
    Json(state.scheduler.schedules())
}
