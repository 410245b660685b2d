use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{CreateMenuParams, MenusRepo, MenusWriteRepo, RepoError};
use crate::cache::{CacheKey, CacheTrigger};
use crate::domain::entities::{MenuRecord, MenuWithCounts};
use crate::domain::error::DomainError;
use crate::domain::patch::MenuPatch;
use crate::domain::validation::{normalize_description, normalize_title};

#[derive(Debug, Error)]
pub enum MenuServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("menu not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateMenuCommand {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct MenuService {
    reader: Arc<dyn MenusRepo>,
    writer: Arc<dyn MenusWriteRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl MenuService {
    pub fn new(reader: Arc<dyn MenusRepo>, writer: Arc<dyn MenusWriteRepo>) -> Self {
        Self {
            reader,
            writer,
            cache_trigger: None,
        }
    }

    /// Set the cache trigger for this service.
    pub fn with_cache_trigger(mut self, trigger: Arc<CacheTrigger>) -> Self {
        self.cache_trigger = Some(trigger);
        self
    }

    /// Set the cache trigger for this service (optional).
    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    pub async fn list(&self) -> Result<Vec<MenuWithCounts>, MenuServiceError> {
        let load = || async { Ok::<_, MenuServiceError>(self.reader.list_menus().await?) };
        match &self.cache_trigger {
            Some(trigger) => trigger.read_through(CacheKey::MenuList, load).await,
            None => load().await,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<MenuWithCounts, MenuServiceError> {
        let load = || async {
            self.reader
                .find_menu(id)
                .await?
                .ok_or(MenuServiceError::NotFound)
        };
        match &self.cache_trigger {
            Some(trigger) => {
                trigger
                    .read_through(CacheKey::Menu { menu_id: id }, load)
                    .await
            }
            None => load().await,
        }
    }

    pub async fn create(&self, command: CreateMenuCommand) -> Result<MenuRecord, MenuServiceError> {
        let params = CreateMenuParams {
            id: Uuid::new_v4(),
            title: normalize_title(&command.title)?,
            description: normalize_description(command.description),
        };

        let menu = self.writer.create_menu(params).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.menu_created(menu.id).await;
        }

        Ok(menu)
    }

    /// Apply a partial update. An empty patch changes nothing and publishes
    /// no cache event.
    pub async fn update(&self, id: Uuid, patch: MenuPatch) -> Result<MenuRecord, MenuServiceError> {
        if patch.is_empty() {
            return self
                .reader
                .find_menu(id)
                .await?
                .map(|menu| menu.record())
                .ok_or(MenuServiceError::NotFound);
        }

        let menu = self
            .writer
            .update_menu(id, &patch)
            .await?
            .ok_or(MenuServiceError::NotFound)?;

        // The write is committed; a failed re-read must not skip invalidation.
        if let Some(trigger) = &self.cache_trigger {
            match self.reader.find_menu(id).await {
                Ok(Some(fresh)) => trigger.menu_updated(id, Some(&fresh)).await,
                Ok(None) => trigger.menu_deleted(id).await,
                Err(err) => {
                    warn!(
                        menu_id = %id,
                        error = %err,
                        "Re-read after menu update failed; invalidating without snapshot"
                    );
                    trigger.menu_updated::<MenuWithCounts>(id, None).await;
                }
            }
        }

        Ok(menu)
    }

    pub async fn delete(&self, id: Uuid) -> Result<MenuRecord, MenuServiceError> {
        let menu = self
            .writer
            .delete_menu(id)
            .await?
            .ok_or(MenuServiceError::NotFound)?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.menu_deleted(id).await;
        }

        Ok(menu)
    }
}
