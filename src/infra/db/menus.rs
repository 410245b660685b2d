use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{CreateMenuParams, MenusRepo, MenusWriteRepo, RepoError},
    domain::entities::{MenuRecord, MenuWithCounts},
    domain::patch::MenuPatch,
};

use super::{PostgresRepositories, map_sqlx_error};

const MENU_WITH_COUNTS_SELECT: &str = r#"
    SELECT
        m.id,
        m.title,
        m.description,
        COUNT(DISTINCT s.id) AS submenus_count,
        COUNT(d.id) AS dishes_count
    FROM menus m
    LEFT JOIN submenus s ON s.menu_id = m.id
    LEFT JOIN dishes d ON d.submenu_id = s.id
"#;

#[derive(sqlx::FromRow)]
struct MenuRow {
    id: Uuid,
    title: String,
    description: Option<String>,
}

impl From<MenuRow> for MenuRecord {
    fn from(row: MenuRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
struct MenuCountsRow {
    id: Uuid,
    title: String,
    description: Option<String>,
    submenus_count: i64,
    dishes_count: i64,
}

impl TryFrom<MenuCountsRow> for MenuWithCounts {
    type Error = RepoError;

    fn try_from(row: MenuCountsRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            title: row.title,
            description: row.description,
            submenus_count: PostgresRepositories::convert_count(row.submenus_count)?,
            dishes_count: PostgresRepositories::convert_count(row.dishes_count)?,
        })
    }
}

#[async_trait]
impl MenusRepo for PostgresRepositories {
    async fn list_menus(&self) -> Result<Vec<MenuWithCounts>, RepoError> {
        let sql = format!(
            "{MENU_WITH_COUNTS_SELECT} GROUP BY m.id, m.title, m.description, m.created_at \
             ORDER BY m.created_at, m.id"
        );
        let rows = sqlx::query_as::<_, MenuCountsRow>(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows.into_iter().map(MenuWithCounts::try_from).collect()
    }

    async fn find_menu(&self, id: Uuid) -> Result<Option<MenuWithCounts>, RepoError> {
        let sql = format!(
            "{MENU_WITH_COUNTS_SELECT} WHERE m.id = $1 GROUP BY m.id, m.title, m.description"
        );
        let row = sqlx::query_as::<_, MenuCountsRow>(&sql)
            .bind(id)
            .fetch_optional(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        row.map(MenuWithCounts::try_from).transpose()
    }
}

#[async_trait]
impl MenusWriteRepo for PostgresRepositories {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuRecord, RepoError> {
        let row = sqlx::query_as::<_, MenuRow>(
            r#"
            INSERT INTO menus (id, title, description)
            VALUES ($1, $2, $3)
            RETURNING id, title, description
            "#,
        )
        .bind(params.id)
        .bind(params.title)
        .bind(params.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_menu(
        &self,
        id: Uuid,
        patch: &MenuPatch,
    ) -> Result<Option<MenuRecord>, RepoError> {
        let row = sqlx::query_as::<_, MenuRow>(
            r#"
            UPDATE menus
            SET title = COALESCE($2, title),
                description = CASE WHEN $3 THEN $4 ELSE description END
            WHERE id = $1
            RETURNING id, title, description
            "#,
        )
        .bind(id)
        .bind(patch.title.as_deref())
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(MenuRecord::from))
    }

    async fn delete_menu(&self, id: Uuid) -> Result<Option<MenuRecord>, RepoError> {
        let row = sqlx::query_as::<_, MenuRow>(
            r#"
            DELETE FROM menus
            WHERE id = $1
            RETURNING id, title, description
            "#,
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(MenuRecord::from))
    }
}
