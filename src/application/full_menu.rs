//! Full-tree read: every menu with its submenus and their dishes.

use std::sync::Arc;

use crate::application::repos::{MenuTreeRepo, RepoError};
use crate::cache::{CacheKey, CacheTrigger};
use crate::domain::entities::MenuTree;

#[derive(Clone)]
pub struct FullMenuService {
    repo: Arc<dyn MenuTreeRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl FullMenuService {
    pub fn new(repo: Arc<dyn MenuTreeRepo>) -> Self {
        Self {
            repo,
            cache_trigger: None,
        }
    }

    pub fn with_cache_trigger_opt(mut self, trigger: Option<Arc<CacheTrigger>>) -> Self {
        self.cache_trigger = trigger;
        self
    }

    /// Serve the aggregate key, falling back to a single joined query.
    pub async fn tree(&self) -> Result<Vec<MenuTree>, RepoError> {
        let load = || self.repo.load_menu_tree();
        match &self.cache_trigger {
            Some(trigger) => trigger.read_through(CacheKey::FullTree, load).await,
            None => load().await,
        }
    }
}
