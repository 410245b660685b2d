use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::entities::{
    DishRecord, MenuRecord, MenuTree, MenuWithCounts, SubmenuRecord, SubmenuWithCount,
};
use crate::domain::patch::{DishPatch, MenuPatch, SubmenuPatch};
use crate::domain::price::Price;

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct CreateMenuParams {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateSubmenuParams {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateDishParams {
    pub id: Uuid,
    pub submenu_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Price,
}

#[async_trait]
pub trait MenusRepo: Send + Sync {
    async fn list_menus(&self) -> Result<Vec<MenuWithCounts>, RepoError>;

    async fn find_menu(&self, id: Uuid) -> Result<Option<MenuWithCounts>, RepoError>;
}

#[async_trait]
pub trait MenusWriteRepo: Send + Sync {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuRecord, RepoError>;

    async fn update_menu(
        &self,
        id: Uuid,
        patch: &MenuPatch,
    ) -> Result<Option<MenuRecord>, RepoError>;

    /// Deletes the menu and, through cascading keys, everything beneath it.
    async fn delete_menu(&self, id: Uuid) -> Result<Option<MenuRecord>, RepoError>;
}

#[async_trait]
pub trait SubmenusRepo: Send + Sync {
    async fn list_submenus(&self, menu_id: Uuid) -> Result<Vec<SubmenuWithCount>, RepoError>;

    async fn find_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmenuWithCount>, RepoError>;
}

#[async_trait]
pub trait SubmenusWriteRepo: Send + Sync {
    async fn create_submenu(&self, params: CreateSubmenuParams)
    -> Result<SubmenuRecord, RepoError>;

    async fn update_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
        patch: &SubmenuPatch,
    ) -> Result<Option<SubmenuRecord>, RepoError>;

    async fn delete_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmenuRecord>, RepoError>;
}

/// Dish lookups are scoped by both ancestors: a dish is only visible through
/// the submenu that owns it, and that submenu only through its menu.
#[async_trait]
pub trait DishesRepo: Send + Sync {
    async fn list_dishes(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
    ) -> Result<Vec<DishRecord>, RepoError>;

    async fn find_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DishRecord>, RepoError>;
}

#[async_trait]
pub trait DishesWriteRepo: Send + Sync {
    async fn create_dish(&self, params: CreateDishParams) -> Result<DishRecord, RepoError>;

    async fn update_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
        patch: &DishPatch,
    ) -> Result<Option<DishRecord>, RepoError>;

    async fn delete_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DishRecord>, RepoError>;
}

#[async_trait]
pub trait MenuTreeRepo: Send + Sync {
    async fn load_menu_tree(&self) -> Result<Vec<MenuTree>, RepoError>;
}

/// Liveness probe against the backing store.
#[async_trait]
pub trait HealthRepo: Send + Sync {
    async fn ping(&self) -> Result<(), RepoError>;
}
