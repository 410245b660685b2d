//! Dish handlers

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::dishes::CreateDishCommand;
use crate::domain::patch::DishPatch;

use super::{dish_to_api, json_body, parse_id};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::*;
use crate::infra::http::api::state::ApiState;

pub async fn list_dishes(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let submenu_id = parse_id("submenu_id", &submenu_id)?;

    let dishes = state
        .dishes
        .list(menu_id, submenu_id)
        .await
        .map_err(dish_to_api)?;

    Ok(Json(
        dishes
            .into_iter()
            .map(DishResponse::from)
            .collect::<Vec<_>>(),
    ))
}

pub async fn get_dish(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id, dish_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let submenu_id = parse_id("submenu_id", &submenu_id)?;
    let id = parse_id("dish_id", &dish_id)?;

    let dish = state
        .dishes
        .get(menu_id, submenu_id, id)
        .await
        .map_err(dish_to_api)?;

    Ok(Json(DishResponse::from(dish)))
}

pub async fn create_dish(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id)): Path<(String, String)>,
    payload: Result<Json<DishCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let submenu_id = parse_id("submenu_id", &submenu_id)?;
    let payload = json_body(payload)?;

    let command = CreateDishCommand {
        title: payload.title,
        description: payload.description,
        price: payload.price,
    };

    let dish = state
        .dishes
        .create(menu_id, submenu_id, command)
        .await
        .map_err(dish_to_api)?;

    Ok((StatusCode::CREATED, Json(DishResponse::from(dish))))
}

pub async fn update_dish(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id, dish_id)): Path<(String, String, String)>,
    payload: Result<Json<DishUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let submenu_id = parse_id("submenu_id", &submenu_id)?;
    let id = parse_id("dish_id", &dish_id)?;
    let payload = json_body(payload)?;

    let patch = DishPatch::new(payload.title, payload.description, payload.price)
        .map_err(|err| dish_to_api(err.into()))?;

    let dish = state
        .dishes
        .update(menu_id, submenu_id, id, patch)
        .await
        .map_err(dish_to_api)?;

    Ok(Json(DishResponse::from(dish)))
}

pub async fn delete_dish(
    State(state): State<ApiState>,
    Path((menu_id, submenu_id, dish_id)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let menu_id = parse_id("menu_id", &menu_id)?;
    let submenu_id = parse_id("submenu_id", &submenu_id)?;
    let id = parse_id("dish_id", &dish_id)?;

    let dish = state
        .dishes
        .delete(menu_id, submenu_id, id)
        .await
        .map_err(dish_to_api)?;

    Ok(Json(DishResponse::from(dish)))
}
