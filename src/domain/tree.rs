//! Folding of flattened menu → submenu → dish join rows into nested trees.

use uuid::Uuid;

use super::entities::{DishRecord, MenuTree, SubmenuTree};
use super::price::Price;

/// One row of a `menus LEFT JOIN submenus LEFT JOIN dishes` result.
#[derive(Debug, Clone)]
pub struct MenuTreeRow {
    pub menu_id: Uuid,
    pub menu_title: String,
    pub menu_description: Option<String>,
    pub submenu: Option<SubmenuPart>,
}

#[derive(Debug, Clone)]
pub struct SubmenuPart {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub dish: Option<DishPart>,
}

#[derive(Debug, Clone)]
pub struct DishPart {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: Price,
}

/// Rows must arrive grouped by menu, then by submenu; the order of the groups
/// is preserved in the output.
pub fn assemble(rows: impl IntoIterator<Item = MenuTreeRow>) -> Vec<MenuTree> {
    let mut menus: Vec<MenuTree> = Vec::new();

    for row in rows {
        if menus.last().is_none_or(|menu| menu.id != row.menu_id) {
            menus.push(MenuTree {
                id: row.menu_id,
                title: row.menu_title,
                description: row.menu_description,
                submenus: Vec::new(),
            });
        }
        let Some(menu) = menus.last_mut() else {
            continue;
        };

        let Some(submenu) = row.submenu else {
            continue;
        };
        if menu.submenus.last().is_none_or(|s| s.id != submenu.id) {
            menu.submenus.push(SubmenuTree {
                id: submenu.id,
                title: submenu.title,
                description: submenu.description,
                dishes: Vec::new(),
            });
        }
        let Some(current) = menu.submenus.last_mut() else {
            continue;
        };

        if let Some(dish) = submenu.dish {
            current.dishes.push(DishRecord {
                id: dish.id,
                submenu_id: current.id,
                title: dish.title,
                description: dish.description,
                price: dish.price,
            });
        }
    }

    menus
}
