use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use super::repo_to_api;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn full_menu(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let tree = state.full_menu.tree().await.map_err(repo_to_api)?;

    Ok(Json(
        tree.into_iter()
            .map(FullMenuResponse::from)
            .collect::<Vec<_>>(),
    ))
}
