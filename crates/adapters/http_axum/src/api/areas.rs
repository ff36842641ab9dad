//! JSON handlers for areas.

use axum::Json;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};

use hausbus_domain::area::Area;
use hausbus_domain::error::NotFoundError;
use hausbus_domain::id::AreaId;

use crate::error::ApiError;
use crate::state::AppState;

/// Possible responses from the list endpoint.
pub enum ListResponse {
    Ok(Json<Vec<Area>>),
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// Possible responses from the get endpoint.
pub enum GetResponse {
    Ok(Json<Area>),
}

impl IntoResponse for GetResponse {
    fn into_response(self) -> Response {
        match self {
            Self::Ok(json) => json.into_response(),
        }
    }
}

/// `GET /api/areas`
pub async fn list(State(state): State<AppState>) -> ListResponse {
    ListResponse::Ok(Json(state.registry.areas()))
}

/// `GET /api/areas/{id}`
pub async fn get(State(state): State<AppState>, Path(id): Path<String>) -> Result<GetResponse, ApiError> {
    let area_id = AreaId::new(id.as_str()).map_err(|_| NotFoundError { kind: "area", id })?;
    let area = state.registry.area(&area_id)?;
    Ok(GetResponse::Ok(Json(area)))
}
