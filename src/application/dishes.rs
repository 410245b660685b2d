use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use crate::application::repos::{
    CreateDishParams, DishesRepo, DishesWriteRepo, RepoError, SubmenusRepo,
};
use crate::cache::{CacheKey, CacheTrigger};
use crate::domain::entities::DishRecord;
use crate::domain::error::DomainError;
use crate::domain::patch::DishPatch;
use crate::domain::price::Price;
use crate::domain::validation::{normalize_description, normalize_title};

#[derive(Debug, Error)]
pub enum DishServiceError {
    #[error(transparent)]
    Validation(#[from] DomainError),
    #[error("submenu not found")]
    SubmenuNotFound,
    #[error("dish not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Debug, Clone)]
pub struct CreateDishCommand {
    pub title: String,
    pub description: Option<String>,
    pub price: String,
}

#[derive(Clone)]
pub struct DishService {
    submenus: Arc<dyn SubmenusRepo>,
    reader: Arc<dyn DishesRepo>,
    writer: Arc<dyn DishesWriteRepo>,
    cache_trigger: Option<Arc<CacheTrigger>>,
}

impl DishService {
    pub fn new(
        submenus: Arc<dyn SubmenusRepo>,
        reader: Arc<dyn DishesRepo>,
        writer: Arc<dyn DishesWriteRepo>,
    ) -> Self {
        Self {
            submenus,
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

    pub async fn list(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
    ) -> Result<Vec<DishRecord>, DishServiceError> {
        let load = || async {
            Ok::<_, DishServiceError>(self.reader.list_dishes(menu_id, submenu_id).await?)
        };
        let Some(trigger) = &self.cache_trigger else {
            return load().await;
        };
        let key = CacheKey::DishList {
            menu_id,
            submenu_id,
        };
        trigger.read_through(key, load).await
    }

    pub async fn get(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
    ) -> Result<DishRecord, DishServiceError> {
        let load = || async {
            self.reader
                .find_dish(menu_id, submenu_id, id)
                .await?
                .ok_or(DishServiceError::NotFound)
        };
        let Some(trigger) = &self.cache_trigger else {
            return load().await;
        };
        let key = CacheKey::Dish {
            menu_id,
            submenu_id,
            dish_id: id,
        };
        trigger.read_through(key, load).await
    }

    pub async fn create(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        command: CreateDishCommand,
    ) -> Result<DishRecord, DishServiceError> {
        let title = normalize_title(&command.title)?;
        let price = Price::parse(&command.price)?;
        if self
            .submenus
            .find_submenu(menu_id, submenu_id)
            .await?
            .is_none()
        {
            return Err(DishServiceError::SubmenuNotFound);
        }

        let params = CreateDishParams {
            id: Uuid::new_v4(),
            submenu_id,
            title,
            description: normalize_description(command.description),
            price,
        };
        let dish = self.writer.create_dish(params).await?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.dish_created(menu_id, submenu_id, dish.id).await;
        }

        Ok(dish)
    }

    pub async fn update(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
        patch: DishPatch,
    ) -> Result<DishRecord, DishServiceError> {
        if patch.is_empty() {
            return self
                .reader
                .find_dish(menu_id, submenu_id, id)
                .await?
                .ok_or(DishServiceError::NotFound);
        }

        let dish = self
            .writer
            .update_dish(menu_id, submenu_id, id, &patch)
            .await?
            .ok_or(DishServiceError::NotFound)?;

        if let Some(trigger) = &self.cache_trigger {
            trigger
                .dish_updated(menu_id, submenu_id, id, Some(&dish))
                .await;
        }

        Ok(dish)
    }

    pub async fn delete(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
    ) -> Result<DishRecord, DishServiceError> {
        let dish = self
            .writer
            .delete_dish(menu_id, submenu_id, id)
            .await?
            .ok_or(DishServiceError::NotFound)?;

        if let Some(trigger) = &self.cache_trigger {
            trigger.dish_deleted(menu_id, submenu_id, id).await;
        }

        Ok(dish)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::domain::entities::SubmenuWithCount;

    struct StubStore {
        menu_id: Uuid,
        submenu_id: Uuid,
        dishes: Mutex<Vec<DishRecord>>,
    }

    impl StubStore {
        fn new() -> Self {
            Self {
                menu_id: Uuid::new_v4(),
                submenu_id: Uuid::new_v4(),
                dishes: Mutex::new(Vec::new()),
            }
        }

        fn owns(&self, menu_id: Uuid, submenu_id: Uuid) -> bool {
            self.menu_id == menu_id && self.submenu_id == submenu_id
        }
    }

    #[async_trait]
    impl SubmenusRepo for StubStore {
        async fn list_submenus(&self, _menu_id: Uuid) -> Result<Vec<SubmenuWithCount>, RepoError> {
            Ok(Vec::new())
        }

        async fn find_submenu(
            &self,
            menu_id: Uuid,
            id: Uuid,
        ) -> Result<Option<SubmenuWithCount>, RepoError> {
            Ok(self.owns(menu_id, id).then(|| SubmenuWithCount {
                id,
                menu_id,
                title: "Mains".into(),
                description: None,
                dishes_count: 0,
            }))
        }
    }

    #[async_trait]
    impl DishesRepo for StubStore {
        async fn list_dishes(
            &self,
            menu_id: Uuid,
            submenu_id: Uuid,
        ) -> Result<Vec<DishRecord>, RepoError> {
            if !self.owns(menu_id, submenu_id) {
                return Ok(Vec::new());
            }
            Ok(self.dishes.lock().unwrap().clone())
        }

        async fn find_dish(
            &self,
            menu_id: Uuid,
            submenu_id: Uuid,
            id: Uuid,
        ) -> Result<Option<DishRecord>, RepoError> {
            if !self.owns(menu_id, submenu_id) {
                return Ok(None);
            }
            Ok(self
                .dishes
                .lock()
                .unwrap()
                .iter()
                .find(|dish| dish.id == id)
                .cloned())
        }
    }

    #[async_trait]
    impl DishesWriteRepo for StubStore {
        async fn create_dish(&self, params: CreateDishParams) -> Result<DishRecord, RepoError> {
            let dish = DishRecord {
                id: params.id,
                submenu_id: params.submenu_id,
                title: params.title,
                description: params.description,
                price: params.price,
            };
            self.dishes.lock().unwrap().push(dish.clone());
            Ok(dish)
        }

        async fn update_dish(
            &self,
            menu_id: Uuid,
            submenu_id: Uuid,
            id: Uuid,
            patch: &DishPatch,
        ) -> Result<Option<DishRecord>, RepoError> {
            if !self.owns(menu_id, submenu_id) {
                return Ok(None);
            }
            let mut dishes = self.dishes.lock().unwrap();
            let Some(dish) = dishes.iter_mut().find(|dish| dish.id == id) else {
                return Ok(None);
            };
            if let Some(price) = &patch.price {
                dish.price = price.clone();
            }
            Ok(Some(dish.clone()))
        }

        async fn delete_dish(
            &self,
            menu_id: Uuid,
            submenu_id: Uuid,
            id: Uuid,
        ) -> Result<Option<DishRecord>, RepoError> {
            if !self.owns(menu_id, submenu_id) {
                return Ok(None);
            }
            let mut dishes = self.dishes.lock().unwrap();
            let position = dishes.iter().position(|dish| dish.id == id);
            Ok(position.map(|index| dishes.remove(index)))
        }
    }

    fn service(store: Arc<StubStore>) -> DishService {
        DishService::new(store.clone(), store.clone(), store)
    }

    fn command(title: &str, price: &str) -> CreateDishCommand {
        CreateDishCommand {
            title: title.to_string(),
            description: Some("House special".to_string()),
            price: price.to_string(),
        }
    }

    #[tokio::test]
    async fn create_keeps_price_text_exactly() {
        let store = Arc::new(StubStore::new());
        let dishes = service(store.clone());

        let dish = dishes
            .create(store.menu_id, store.submenu_id, command("Soup", "10.99"))
            .await
            .unwrap();

        assert_eq!(dish.price.as_str(), "10.99");
        assert_eq!(dish.submenu_id, store.submenu_id);
    }

    #[tokio::test]
    async fn create_rejects_malformed_price() {
        let store = Arc::new(StubStore::new());
        let dishes = service(store.clone());

        let err = dishes
            .create(store.menu_id, store.submenu_id, command("Soup", "ten"))
            .await
            .unwrap_err();
        assert!(matches!(err, DishServiceError::Validation(_)));
    }

    #[tokio::test]
    async fn create_under_unknown_submenu_is_rejected() {
        let store = Arc::new(StubStore::new());
        let dishes = service(store.clone());

        let err = dishes
            .create(store.menu_id, Uuid::new_v4(), command("Soup", "1"))
            .await
            .unwrap_err();
        assert!(matches!(err, DishServiceError::SubmenuNotFound));
    }

    #[tokio::test]
    async fn update_and_delete_require_matching_ancestors() {
        let store = Arc::new(StubStore::new());
        let dishes = service(store.clone());
        let dish = dishes
            .create(store.menu_id, store.submenu_id, command("Soup", "5.50"))
            .await
            .unwrap();

        let patch = DishPatch::new(None, None, Some("6.00".into())).unwrap();
        assert!(matches!(
            dishes
                .update(Uuid::new_v4(), store.submenu_id, dish.id, patch.clone())
                .await,
            Err(DishServiceError::NotFound)
        ));

        let updated = dishes
            .update(store.menu_id, store.submenu_id, dish.id, patch)
            .await
            .unwrap();
        assert_eq!(updated.price.as_str(), "6.00");

        let deleted = dishes
            .delete(store.menu_id, store.submenu_id, dish.id)
            .await
            .unwrap();
        assert_eq!(deleted.id, dish.id);
        assert!(matches!(
            dishes.get(store.menu_id, store.submenu_id, dish.id).await,
            Err(DishServiceError::NotFound)
        ));
    }
}
