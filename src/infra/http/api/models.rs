//! Wire payloads and their conversions from domain records.

pub use carta_api_types::*;

use crate::domain::entities::{
    DishRecord, MenuRecord, MenuTree, MenuWithCounts, SubmenuRecord, SubmenuTree,
    SubmenuWithCount,
};

impl From<MenuRecord> for MenuResponse {
    fn from(record: MenuRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
        }
    }
}

impl From<MenuWithCounts> for MenuWithCountsResponse {
    fn from(menu: MenuWithCounts) -> Self {
        Self {
            id: menu.id,
            title: menu.title,
            description: menu.description,
            submenus_count: menu.submenus_count,
            dishes_count: menu.dishes_count,
        }
    }
}

impl From<SubmenuRecord> for SubmenuResponse {
    fn from(record: SubmenuRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            menu_id: record.menu_id,
        }
    }
}

impl From<SubmenuWithCount> for SubmenuWithCountResponse {
    fn from(submenu: SubmenuWithCount) -> Self {
        Self {
            id: submenu.id,
            title: submenu.title,
            description: submenu.description,
            menu_id: submenu.menu_id,
            dishes_count: submenu.dishes_count,
        }
    }
}

impl From<DishRecord> for DishResponse {
    fn from(record: DishRecord) -> Self {
        Self {
            id: record.id,
            title: record.title,
            description: record.description,
            price: record.price.into(),
            submenu_id: record.submenu_id,
        }
    }
}

impl From<SubmenuTree> for FullSubmenuResponse {
    fn from(submenu: SubmenuTree) -> Self {
        Self {
            id: submenu.id,
            title: submenu.title,
            description: submenu.description,
            dishes: submenu.dishes.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<MenuTree> for FullMenuResponse {
    fn from(menu: MenuTree) -> Self {
        Self {
            id: menu.id,
            title: menu.title,
            description: menu.description,
            submenus: menu.submenus.into_iter().map(Into::into).collect(),
        }
    }
}
