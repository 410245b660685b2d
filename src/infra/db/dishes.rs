use async_trait::async_trait;
use uuid::Uuid;

use crate::{
    application::repos::{CreateDishParams, DishesRepo, DishesWriteRepo, RepoError},
    domain::entities::DishRecord,
    domain::patch::DishPatch,
    domain::price::Price,
};

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct DishRow {
    id: Uuid,
    submenu_id: Uuid,
    title: String,
    description: Option<String>,
    price: String,
}

impl TryFrom<DishRow> for DishRecord {
    type Error = RepoError;

    fn try_from(row: DishRow) -> Result<Self, Self::Error> {
        let price = Price::parse(&row.price).map_err(|err| RepoError::Integrity {
            message: format!("dish {} carries an unreadable price: {err}", row.id),
        })?;
        Ok(Self {
            id: row.id,
            submenu_id: row.submenu_id,
            title: row.title,
            description: row.description,
            price,
        })
    }
}

#[async_trait]
impl DishesRepo for PostgresRepositories {
    async fn list_dishes(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
    ) -> Result<Vec<DishRecord>, RepoError> {
        let rows = sqlx::query_as::<_, DishRow>(
            r#"
            SELECT d.id, d.submenu_id, d.title, d.description, d.price
            FROM dishes d
            INNER JOIN submenus s ON s.id = d.submenu_id
            WHERE d.submenu_id = $1 AND s.menu_id = $2
            ORDER BY d.created_at, d.id
            "#,
        )
        .bind(submenu_id)
        .bind(menu_id)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        rows.into_iter().map(DishRecord::try_from).collect()
    }

    async fn find_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DishRecord>, RepoError> {
        let row = sqlx::query_as::<_, DishRow>(
            r#"
            SELECT d.id, d.submenu_id, d.title, d.description, d.price
            FROM dishes d
            INNER JOIN submenus s ON s.id = d.submenu_id
            WHERE d.id = $1 AND d.submenu_id = $2 AND s.menu_id = $3
            "#,
        )
        .bind(id)
        .bind(submenu_id)
        .bind(menu_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(DishRecord::try_from).transpose()
    }
}

#[async_trait]
impl DishesWriteRepo for PostgresRepositories {
    async fn create_dish(&self, params: CreateDishParams) -> Result<DishRecord, RepoError> {
        let row = sqlx::query_as::<_, DishRow>(
            r#"
            INSERT INTO dishes (id, submenu_id, title, description, price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, submenu_id, title, description, price
            "#,
        )
        .bind(params.id)
        .bind(params.submenu_id)
        .bind(params.title)
        .bind(params.description)
        .bind(String::from(params.price))
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.try_into()
    }

    async fn update_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
        patch: &DishPatch,
    ) -> Result<Option<DishRecord>, RepoError> {
        let row = sqlx::query_as::<_, DishRow>(
            r#"
            UPDATE dishes d
            SET title = COALESCE($4, d.title),
                description = CASE WHEN $5 THEN $6 ELSE d.description END,
                price = COALESCE($7, d.price)
            FROM submenus s
            WHERE d.id = $1
              AND d.submenu_id = $2
              AND s.id = d.submenu_id
              AND s.menu_id = $3
            RETURNING d.id, d.submenu_id, d.title, d.description, d.price
            "#,
        )
        .bind(id)
        .bind(submenu_id)
        .bind(menu_id)
        .bind(patch.title.as_deref())
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(patch.price.as_ref().map(|price| price.as_str()))
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(DishRecord::try_from).transpose()
    }

    async fn delete_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DishRecord>, RepoError> {
        let row = sqlx::query_as::<_, DishRow>(
            r#"
            DELETE FROM dishes d
            USING submenus s
            WHERE d.id = $1
              AND d.submenu_id = $2
              AND s.id = d.submenu_id
              AND s.menu_id = $3
            RETURNING d.id, d.submenu_id, d.title, d.description, d.price
            "#,
        )
        .bind(id)
        .bind(submenu_id)
        .bind(menu_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(DishRecord::try_from).transpose()
    }
}
