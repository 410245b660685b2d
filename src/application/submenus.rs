use std::sync::Arc;

use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::repos::{
    CreateSubmenuParams, MenusRepo, RepoError, SubmenusRepo, SubmenusWriteRepo,
};
use crate::cache::{CacheKey, CacheTrigger};
use crate::domain::entities::{SubmenuRecord, SubmenuWithCount};
use crate::domain::error::DomainError;
use crate::domain::patch::SubmenuPatch;
use crate::domain::validation::{normalize_description, normalize_title};

#[derive(Debug, Error)]
pub enum SubmenuServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("menu not found")]
    MenuNotFound,
    #[error("submenu not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateSubmenuCommand {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Clone)]
pub struct SubmenuService {
    menus: Arc<dyn MenusRepo>,
    reader: Arc<dyn SubmenusRepo>,
    writer: Arc<dyn SubmenusWriteRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl SubmenuService {
    pub fn new(
        menus: Arc<dyn MenusRepo>,
        reader: Arc<dyn SubmenusRepo>,
        writer: Arc<dyn SubmenusWriteRepo>,
    ) -> Self {
        Self {
            menus,
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

    /// Submenus of a menu. An unknown menu yields an empty list.
    pub async fn list(&self, menu_id: Uuid) -> Result<Vec<SubmenuWithCount>, SubmenuServiceError> {
        let load = || async {
            Ok::<_, SubmenuServiceError>(self.reader.list_submenus(menu_id).await?)
        };
        match &self.cache_trigger {
            Some(trigger) => {
                trigger
                    .read_through(CacheKey::SubmenuList { menu_id }, load)
                    .await
            }
            None => load().await,
        }
    }

    pub async fn get(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<SubmenuWithCount, SubmenuServiceError> {
        let load = || async {
            self.reader
                .find_submenu(menu_id, id)
                .await?
                .ok_or(SubmenuServiceError::NotFound)
        };
        let Some(trigger) = &self.cache_trigger else {
            return load().await;
        };
        let key = CacheKey::Submenu {
            menu_id,
            submenu_id: id,
        };
        trigger.read_through(key, load).await
    }

    pub async fn create(
        &self,
        menu_id: Uuid,
        command: CreateSubmenuCommand,
    ) -> Result<SubmenuRecord, SubmenuServiceError> {
        let title = normalize_title(&command.title)?;
        if self.menus.find_menu(menu_id).await?.is_none() {
            return Err(SubmenuServiceError::MenuNotFound);
        }

        let params = CreateSubmenuParams {
            id: Uuid::new_v4(),
            menu_id,
            title,
            description: normalize_description(command.description),
        };
        let submenu = self.writer.create_submenu(params).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.submenu_created(menu_id, submenu.id).await;
        }

        Ok(submenu)
    }

    pub async fn update(
        &self,
        menu_id: Uuid,
        id: Uuid,
        patch: SubmenuPatch,
    ) -> Result<SubmenuRecord, SubmenuServiceError> {
        if patch.is_empty() {
            return self
                .reader
                .find_submenu(menu_id, id)
                .await?
                .map(|submenu| SubmenuRecord {
                    id: submenu.id,
                    menu_id: submenu.menu_id,
                    title: submenu.title,
                    description: submenu.description,
                })
                .ok_or(SubmenuServiceError::NotFound);
        }

        let submenu = self
            .writer
            .update_submenu(menu_id, id, &patch)
            .await?
            .ok_or(SubmenuServiceError::NotFound)?;

        // The write is committed; a failed re-read must not skip invalidation.
        if let Some(trigger) = &self.cache_trigger {
            match self.reader.find_submenu(menu_id, id).await {
                Ok(Some(fresh)) => trigger.submenu_updated(menu_id, id, Some(&fresh)).await,
                Ok(None) => trigger.submenu_deleted(menu_id, id).await,
                Err(err) => {
                    warn!(
                        menu_id = %menu_id,
                        submenu_id = %id,
                        error = %err,
                        "Re-read after submenu update failed; invalidating without snapshot"
                    );
                    trigger
                        .submenu_updated::<SubmenuWithCount>(menu_id, id, None)
                        .await;
                }
            }
        }

        Ok(submenu)
    }

    pub async fn delete(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<SubmenuRecord, SubmenuServiceError> {
        let submenu = self
            .writer
            .delete_submenu(menu_id, id)
            .await?
            .ok_or(SubmenuServiceError::NotFound)?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.submenu_deleted(menu_id, id).await;
        }

        Ok(submenu)
    }
}
