use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{MenuTreeRepo, RepoError},
    domain::entities::MenuTree,
    domain::price::Price,
    domain::tree::{DishPart, MenuTreeRow, SubmenuPart, assemble},
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TreeRow {
    menu_id: Uuid,
    menu_title: String,
    menu_description: Option<String>,
    submenu_id: Option<Uuid>,
    submenu_title: Option<String>,
    submenu_description: Option<String>,
    dish_id: Option<Uuid>,
    dish_title: Option<String>,
    dish_description: Option<String>,
    dish_price: Option<String>,
}

impl TryFrom<TreeRow> for MenuTreeRow {
    type Error = RepoError;

    fn try_from(row: TreeRow) -> Result<Self, Self::Error> {
        let dish = match (row.dish_id, row.dish_title, row.dish_price) {
            (Some(id), Some(title), Some(price)) => Some(DishPart {
                id,
                title,
                description: row.dish_description,
                price: Price::parse(&price).map_err(|err| RepoError::Integrity {
                    message: format!("dish {id} carries an unreadable price: {err}"),
                })?,
            }),
            _ => None,
        };

        let submenu = match (row.submenu_id, row.submenu_title) {
            (Some(id), Some(title)) => Some(SubmenuPart {
                id,
                title,
                description: row.submenu_description,
                dish,
            }),
            _ => None,
        };

        Ok(Self {
            menu_id: row.menu_id,
            menu_title: row.menu_title,
            menu_description: row.menu_description,
            submenu,
        })
    }
}

#[async_trait]
impl MenuTreeRepo for PostgresRepositories {
    async fn load_menu_tree(&self) -> Result<Vec<MenuTree>, RepoError> {
        let rows = sqlx::query_as::<_, TreeRow>(
            r#"
            SELECT
                m.id AS menu_id,
                m.title AS menu_title,
                m.description AS menu_description,
                s.id AS submenu_id,
                s.title AS submenu_title,
                s.description AS submenu_description,
                d.id AS dish_id,
                d.title AS dish_title,
                d.description AS dish_description,
                d.price AS dish_price
            FROM menus m
            LEFT JOIN submenus s ON s.menu_id = m.id
            LEFT JOIN dishes d ON d.submenu_id = s.id
            ORDER BY m.created_at, m.id, s.created_at, s.id, d.created_at, d.id
            "#,
        )
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let rows = rows
            .into_iter()
            .map(MenuTreeRow::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(assemble(rows))
    }
}
