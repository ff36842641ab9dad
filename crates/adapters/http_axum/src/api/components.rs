//! JSON handlers for components: status snapshots and commands.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use hausbus_app::component::ManagedComponent;
use hausbus_domain::command::Command;
use hausbus_domain::error::{HausbusError, NotFoundError};
use hausbus_domain::id::ComponentId;
use hausbus_domain::state::ComponentStatus;

use crate::error::ApiError;
use crate::state::AppState;

/// A component as seen by API clients.
#[derive(Debug, Serialize)]
pub struct ComponentView {
    pub id: ComponentId,
    pub kind: &'static str,
    pub status: ComponentStatus,
}

impl ComponentView {
    fn of(component: &dyn ManagedComponent) -> Self {
        Self {
            id: component.id().clone(),
            kind: component.kind(),
            status: component.status(),
        }
    }
}

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<ComponentView>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get and execute endpoints.
pub enum GetResponse {
    Ok(Json<ComponentView>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

fn find(state: &AppState, raw: &str) -> Result<Arc<dyn ManagedComponent>, ApiError> {
    let id = ComponentId::new(raw).map_err(|_| NotFoundError {
        kind: "component",
        id: raw.to_string(),
    })?;
    Ok(state.registry.get(&id)?)
}

/// `GET /api/components`
pub async fn list(State(state): State<AppState>) -> ListResponse {
    let views = state
        .registry
        .list()
        .iter()
        .map(|component| ComponentView::of(component.as_ref()))
        .collect();
    ListResponse::Ok(Json(views))
}

/// `GET /api/components/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<GetResponse, ApiError> {
    let component = find(&state, &id)?;
    Ok(GetResponse::Ok(Json(ComponentView::of(component.as_ref()))))
}

/// `POST /api/components/{id}/commands`
///
/// Runs the command on the blocking pool since it may write to the bus, then
/// answers with the component's new status.
pub async fn execute(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(command): Json<Command>,
) -> Result<GetResponse, ApiError> {
    let component = find(&state, &id)?;
    tracing::info!(component = %component.id(), %command, "executing command");
    let view = tokio::task::spawn_blocking(move || {
        component.execute(&command)?;
        Ok::<_, HausbusError>(ComponentView::of(component.as_ref()))
    })
    .await
    .map_err(|err| HausbusError::action(err.to_string()))??;
    Ok(GetResponse::Ok(Json(view)))
}
