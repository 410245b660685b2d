//! Domain entities mirrored from persistent storage.
//!
//! The `*With*` variants carry derived counts and are the shapes cached under
//! the single-entity and list keys.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::price::Price;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuRecord {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuWithCounts {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub submenus_count: u64,
    pub dishes_count: u64,
}

impl MenuWithCounts {
    pub fn record(&self) -> MenuRecord {
        MenuRecord {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmenuRecord {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmenuWithCount {
    pub id: Uuid,
    pub menu_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub dishes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DishRecord {
    pub id: Uuid,
    pub submenu_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Price,
}

/// A menu with all of its submenus and their dishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuTree {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub submenus: Vec<SubmenuTree>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmenuTree {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub dishes: Vec<DishRecord>,
}
