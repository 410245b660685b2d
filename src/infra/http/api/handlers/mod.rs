//! API handlers organized by resource type.
//!
//! Identifiers arrive as raw path segments and are parsed here so malformed
//! ids answer with the API error body instead of the extractor's plain text.

mod dishes;
mod full_menu;
mod menus;
mod submenus;

pub use dishes::*;
pub use full_menu::*;
pub use menus::*;
pub use submenus::*;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use uuid::Uuid;

use crate::application::dishes::DishServiceError;
use crate::application::menus::MenuServiceError;
use crate::application::repos::RepoError;
use crate::application::submenus::SubmenuServiceError;
use crate::domain::error::DomainError;

use super::error::{ApiError, codes};

pub(crate) fn parse_id(segment: &'static str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::invalid_id(segment, raw))
}

/// Unwrap a JSON body, reporting every rejection as a plain 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        ApiError::bad_request("invalid request body", Some(rejection.body_text()))
    })
}

// ----- Shared error conversions -----

pub(crate) fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Database timeout",
            None,
        ),
        RepoError::Persistence(msg) => ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::REPO,
            "Persistence error",
            Some(msg),
        ),
    }
}

fn validation_to_api(message: &'static str, err: DomainError) -> ApiError {
    ApiError::new(
        StatusCode::BAD_REQUEST,
        codes::INVALID_INPUT,
        message,
        Some(err.to_string()),
    )
}

pub(crate) fn menu_to_api(err: MenuServiceError) -> ApiError {
    match err {
        MenuServiceError::Validation(err) => validation_to_api("Invalid menu", err),
        MenuServiceError::NotFound => ApiError::not_found("menu not found"),
        MenuServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn submenu_to_api(err: SubmenuServiceError) -> ApiError {
    match err {
        SubmenuServiceError::Validation(err) => validation_to_api("Invalid submenu", err),
        SubmenuServiceError::MenuNotFound => ApiError::not_found("menu not found"),
        SubmenuServiceError::NotFound => ApiError::not_found("submenu not found"),
        SubmenuServiceError::Repo(repo) => repo_to_api(repo),
    }
}

pub(crate) fn dish_to_api(err: DishServiceError) -> ApiError {
    match err {
        DishServiceError::Validation(err) => validation_to_api("Invalid dish", err),
        DishServiceError::SubmenuNotFound => ApiError::not_found("submenu not found"),
        DishServiceError::NotFound => ApiError::not_found("dish not found"),
        DishServiceError::Repo(repo) => repo_to_api(repo),
    }
}
