//! JSON API handler modules.

#[allow(clippy::missing_errors_doc)]
pub mod areas;
#[allow(clippy::missing_errors_doc)]
pub mod components;
pub mod events;
pub mod schedules;

use axum::Router;
use axum::routing::{get, post};

use crate::state::AppState;

/// Build the `/api` sub-router.
pub fn routes() -> Router<AppState> {
    Router::new()
        // Components
        .route("/components", get(components::list))
        .route("/components/{id}", get(components::get))
        .route("/components/{id}/commands", post(components::execute))
        // Areas
        .route("/areas", get(areas::list))
        .route("/areas/{id}", get(areas::get))
        // Scheduler
        .route("/schedules", get(schedules::list))
        // Events
        .route("/events/stream", get(events::stream))
}
