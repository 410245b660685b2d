//! Menu handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::menus::CreateMenuCommand;
use crate::domain::patch::MenuPatch;

use super::{json_body, menu_to_api, parse_id};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn list_menus(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let menus = state.menus.list().await.map_err(menu_to_api)?;

    Ok(Json(
        menus
            .into_iter()
            .map(MenuWithCountsResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_menu(
    State(state): State<ApiState>,
    Path(menu_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id("menu_id", &menu_id)?;

    let menu = state.menus.get(id).await.map_err(menu_to_api)?;

    Ok(Json(MenuWithCountsResponse::from(menu)))
}

pub async fn create_menu(
    State(state): State<ApiState>,
    payload: Result<Json<MenuCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let payload = json_body(payload)?;

    let command = CreateMenuCommand {
        title: payload.title,
        description: payload.description,
    };

    let menu = state.menus.create(command).await.map_err(menu_to_api)?;

    Ok((StatusCode::CREATED, Json(MenuResponse::from(menu))))
}

pub async fn update_menu(
    State(state): State<ApiState>,
    Path(menu_id): Path<String>,
    payload: Result<Json<MenuUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id("menu_id", &menu_id)?;
    let payload = json_body(payload)?;

    let patch = MenuPatch::new(payload.title, payload.description)
        .map_err(|err| menu_to_api(err.into()))?;

    let menu = state.menus.update(id, patch).await.map_err(menu_to_api)?;

    Ok(Json(MenuResponse::from(menu)))
}

pub async fn delete_menu(
    State(state): State<ApiState>,
    Path(menu_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id("menu_id", &menu_id)?;

    let menu = state.menus.delete(id).await.map_err(menu_to_api)?;

    Ok(Json(MenuResponse::from(menu)))
}
