//! Cache key definitions.
//!
//! Keys mirror the REST resource paths, so every descendant of an entity's own
//! key shares that key as a string prefix. Prefix invalidation relies on this.

use std::fmt;

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    // Collections
    /// All menus, with counts.
    MenuList,
    /// Submenus of one menu.
    SubmenuList { menu_id: Uuid },
    /// Dishes of one submenu.
    DishList { menu_id: Uuid, submenu_id: Uuid },

    // Single entities
    Menu {
        menu_id: Uuid,
    },
    Submenu {
        menu_id: Uuid,
        submenu_id: Uuid,
    },
    Dish {
        menu_id: Uuid,
        submenu_id: Uuid,
        dish_id: Uuid,
    },

    // Aggregate
    /// The full nested menu tree.
    FullTree,
}

impl CacheKey {
    pub fn render(&self) -> String {
        match self {
            CacheKey::MenuList => "/menus/".to_string(),
            CacheKey::FullTree => "/menus/full".to_string(),
            CacheKey::Menu { menu_id } => format!("/menus/{menu_id}"),
            CacheKey::SubmenuList { menu_id } => format!("/menus/{menu_id}/submenus"),
            CacheKey::Submenu {
                menu_id,
                submenu_id,
            } => format!("/menus/{menu_id}/submenus/{submenu_id}"),
            CacheKey::DishList {
                menu_id,
                submenu_id,
            } => format!("/menus/{menu_id}/submenus/{submenu_id}/dishes"),
            CacheKey::Dish {
                menu_id,
                submenu_id,
                dish_id,
            } => format!("/menus/{menu_id}/submenus/{submenu_id}/dishes/{dish_id}"),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
