use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{CreateSubmenuParams, RepoError, SubmenusRepo, SubmenusWriteRepo},
    domain::entities::{SubmenuRecord, SubmenuWithCount},
    domain::patch::SubmenuPatch,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct SubmenuRow {
    id: Uuid,
    menu_id: Uuid,
    title: String,
    description: Option<String>,
}

impl From<SubmenuRow> for SubmenuRecord {
    fn from(row: SubmenuRow) -> Self {
        Self {
            id: row.id,
            menu_id: row.menu_id,
            title: row.title,
            description: row.description,
        }
    }
}

#[derive(sqlx::FromRow)]
struct SubmenuCountRow {
    id: Uuid,
    menu_id: Uuid,
    title: String,
    description: Option<String>,
    dishes_count: i64,
}

impl TryFrom<SubmenuCountRow> for SubmenuWithCount {
    type Error = RepoError;

    fn try_from(row: SubmenuCountRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            menu_id: row.menu_id,
            title: row.title,
            description: row.description,
            dishes_count: PostgresRepositories::convert_count(row.dishes_count)?,
        })
    }
}

#[async_trait]
impl SubmenusRepo for PostgresRepositories {
    async fn list_submenus(&self, menu_id: Uuid) -> Result<Vec<SubmenuWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, SubmenuCountRow>(
            r#"
            SELECT s.id, s.menu_id, s.title, s.description, COUNT(d.id) AS dishes_count
            FROM submenus s
            LEFT JOIN dishes d ON d.submenu_id = s.id
            WHERE s.menu_id = $1
            GROUP BY s.id, s.menu_id, s.title, s.description, s.created_at
            ORDER BY s.created_at, s.id
            "#,
        )
        .bind(menu_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(SubmenuWithCount::try_from).collect()
    }

    async fn find_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmenuWithCount>, RepoError> {
        let row = sqlx::query_as::<_, SubmenuCountRow>(
            r#"
            SELECT s.id, s.menu_id, s.title, s.description, COUNT(d.id) AS dishes_count
            FROM submenus s
            LEFT JOIN dishes d ON d.submenu_id = s.id
            WHERE s.id = $1 AND s.menu_id = $2
            GROUP BY s.id, s.menu_id, s.title, s.description
            "#,
        )
        .bind(id)
        .bind(menu_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(SubmenuWithCount::try_from).transpose()
    }
}

#[async_trait]
impl SubmenusWriteRepo for PostgresRepositories {
    async fn create_submenu(
        &self,
        params: CreateSubmenuParams,
    ) -> Result<SubmenuRecord, RepoError> {
        let row = sqlx::query_as::<_, SubmenuRow>(
            r#"
            INSERT INTO submenus (id, menu_id, title, description)
            VALUES ($1, $2, $3, $4)
            RETURNING id, menu_id, title, description
            "#,
        )
        .bind(params.id)
        .bind(params.menu_id)
        .bind(params.title)
        .bind(params.description)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.into())
    }

    async fn update_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
        patch: &SubmenuPatch,
    ) -> Result<Option<SubmenuRecord>, RepoError> {
        let row = sqlx::query_as::<_, SubmenuRow>(
            r#"
            UPDATE submenus
            SET title = COALESCE($3, title),
                description = CASE WHEN $4 THEN $5 ELSE description END
            WHERE id = $1 AND menu_id = $2
            RETURNING id, menu_id, title, description
            "#,
        )
        .bind(id)
        .bind(menu_id)
        .bind(patch.title.as_deref())
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SubmenuRecord::from))
    }

    async fn delete_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmenuRecord>, RepoError> {
        let row = sqlx::query_as::<_, SubmenuRow>(
            r#"
            DELETE FROM submenus
            WHERE id = $1 AND menu_id = $2
            RETURNING id, menu_id, title, description
            "#,
        )
        .bind(id)
        .bind(menu_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(SubmenuRecord::from))
    }
}
