//! Submenu handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::submenus::CreateSubmenuCommand;
use crate::domain::patch::SubmenuPatch;

use super::{json_body, parse_id, submenu_to_api};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn list_submenus(
    State(state): State<ApiState>,
    Path(menu_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;

    let submenus = state
        .submenus
        .list(menu_id)
        .await
        .map_err(submenu_to_api)?;

    Ok(Json(
        submenus
            .into_iter()
            .map(SubmenuWithCountResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_submenu(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let id = parse_id("submenu_id", &submenu_id)?;

    let submenu = state
        .submenus
        .get(menu_id, id)
        .await
        .map_err(submenu_to_api)?;

    Ok(Json(SubmenuWithCountResponse::from(submenu)))
}

pub async fn create_submenu(
    State(state): State<ApiState>,
    Path(menu_id): Path<String>,
    payload: Result<Json<SubmenuCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let payload = json_body(payload)?;

    let command = CreateSubmenuCommand {
        title: payload.title,
        description: payload.description,
    };

    let submenu = state
        .submenus
        .create(menu_id, command)
        .await
        .map_err(submenu_to_api)?;

    Ok((StatusCode::CREATED, Json(SubmenuResponse::from(submenu))))
}

pub async fn update_submenu(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id)): Path<(String, String)>,
    payload: Result<Json<SubmenuUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let id = parse_id("submenu_id", &submenu_id)?;
    let payload = json_body(payload)?;

    let patch = SubmenuPatch::new(payload.title, payload.description)
        .map_err(|err| submenu_to_api(err.into()))?;

    let submenu = state
        .submenus
        .update(menu_id, id, patch)
        .await
        .map_err(submenu_to_api)?;

    Ok(Json(SubmenuResponse::from(submenu)))
}

pub async fn delete_submenu(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let id = parse_id("submenu_id", &submenu_id)?;

    let submenu = state
        .submenus
        .delete(menu_id, id)
        .await
        .map_err(submenu_to_api)?;

    Ok(Json(SubmenuResponse::from(submenu)))
}
