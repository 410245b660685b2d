//! Shared harness for router-level tests: an in-memory store double that
//! behaves like the Postgres schema (unique sibling titles, cascading deletes,
//! derived counts) and a router wired exactly as `serve` wires it.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use carta::application::dishes::DishService;
use carta::application::full_menu::FullMenuService;
use carta::application::menus::MenuService;
use carta::application::repos::{
    CreateDishParams, CreateMenuParams, CreateSubmenuParams, DishesRepo, DishesWriteRepo,
    HealthRepo, MenuTreeRepo, MenusRepo, MenusWriteRepo, RepoError, SubmenusRepo,
    SubmenusWriteRepo,
};
use carta::application::submenus::SubmenuService;
use carta::cache::{
    CacheAction, CacheBackend, CacheConfig, CacheConsumer, CacheEvent, CacheKey, CacheStore,
    CacheTrigger, ConsumptionPlan, EventKind, EventQueue, MemoryBackend,
};
use carta::domain::entities::{
    DishRecord, MenuRecord, MenuTree, MenuWithCounts, SubmenuRecord, SubmenuTree,
    SubmenuWithCount,
};
use carta::domain::patch::{DishPatch, MenuPatch, SubmenuPatch};
use carta::infra::http::{ApiState, build_router};

#[derive(Default)]
struct Tables {
    menus: Vec<MenuRecord>,
    submenus: Vec<SubmenuRecord>,
    dishes: Vec<DishRecord>,
}

impl Tables {
    fn menu_with_counts(&self, menu: &MenuRecord) -> MenuWithCounts {
        let submenu_ids: Vec<Uuid> = self
            .submenus
            .iter()
            .filter(|s| s.menu_id == menu.id)
            .map(|s| s.id)
            .collect();
        let dishes_count = self
            .dishes
            .iter()
            .filter(|d| submenu_ids.contains(&d.submenu_id))
            .count();
        MenuWithCounts {
            id: menu.id,
            title: menu.title.clone(),
            description: menu.description.clone(),
            submenus_count: submenu_ids.len() as u64,
            dishes_count: dishes_count as u64,
        }
    }

    fn submenu_with_count(&self, submenu: &SubmenuRecord) -> SubmenuWithCount {
        SubmenuWithCount {
            id: submenu.id,
            menu_id: submenu.menu_id,
            title: submenu.title.clone(),
            description: submenu.description.clone(),
            dishes_count: self
                .dishes
                .iter()
                .filter(|d| d.submenu_id == submenu.id)
                .count() as u64,
        }
    }

    fn submenu_in_menu(&self, menu_id: Uuid, submenu_id: Uuid) -> bool {
        self.submenus
            .iter()
            .any(|s| s.id == submenu_id && s.menu_id == menu_id)
    }
}

/// Store double. `reads` counts every read-side call so tests can tell a
/// cache hit from a store round-trip.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
    reads: AtomicUsize,
    unhealthy: AtomicBool,
}

impl InMemoryStore {
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    fn read(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.tables.lock().unwrap()
    }

    fn write(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap()
    }
}

fn duplicate(constraint: &str) -> RepoError {
    RepoError::Duplicate {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl MenusRepo for InMemoryStore {
    async fn list_menus(&self) -> Result<Vec<MenuWithCounts>, RepoError> {
        let tables = self.read();
        Ok(tables
            .menus
            .iter()
            .map(|m| tables.menu_with_counts(m))
            .collect())
    }

    async fn find_menu(&self, id: Uuid) -> Result<Option<MenuWithCounts>, RepoError> {
        let tables = self.read();
        Ok(tables
            .menus
            .iter()
            .find(|m| m.id == id)
            .map(|m| tables.menu_with_counts(m)))
    }
}

#[async_trait]
impl MenusWriteRepo for InMemoryStore {
    async fn create_menu(&self, params: CreateMenuParams) -> Result<MenuRecord, RepoError> {
        let mut tables = self.write();
        if tables.menus.iter().any(|m| m.title == params.title) {
            return Err(duplicate("menus_title_key"));
        }
        let record = MenuRecord {
            id: params.id,
            title: params.title,
            description: params.description,
        };
        tables.menus.push(record.clone());
        Ok(record)
    }

    async fn update_menu(
        &self,
        id: Uuid,
        patch: &MenuPatch,
    ) -> Result<Option<MenuRecord>, RepoError> {
        let mut tables = self.write();
        if let Some(title) = &patch.title
            && tables.menus.iter().any(|m| m.id != id && &m.title == title)
        {
            return Err(duplicate("menus_title_key"));
        }
        let Some(menu) = tables.menus.iter_mut().find(|m| m.id == id) else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            menu.title = title.clone();
        }
        if let Some(description) = &patch.description {
            menu.description = description.clone();
        }
        Ok(Some(menu.clone()))
    }

    async fn delete_menu(&self, id: Uuid) -> Result<Option<MenuRecord>, RepoError> {
        let mut tables = self.write();
        let Some(pos) = tables.menus.iter().position(|m| m.id == id) else {
            return Ok(None);
        };
        let menu = tables.menus.remove(pos);
        let doomed: Vec<Uuid> = tables
            .submenus
            .iter()
            .filter(|s| s.menu_id == id)
            .map(|s| s.id)
            .collect();
        tables.submenus.retain(|s| s.menu_id != id);
        tables.dishes.retain(|d| !doomed.contains(&d.submenu_id));
        Ok(Some(menu))
    }
}

#[async_trait]
impl SubmenusRepo for InMemoryStore {
    async fn list_submenus(&self, menu_id: Uuid) -> Result<Vec<SubmenuWithCount>, RepoError> {
        let tables = self.read();
        Ok(tables
            .submenus
            .iter()
            .filter(|s| s.menu_id == menu_id)
            .map(|s| tables.submenu_with_count(s))
            .collect())
    }

    async fn find_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmenuWithCount>, RepoError> {
        let tables = self.read();
        Ok(tables
            .submenus
            .iter()
            .find(|s| s.id == id && s.menu_id == menu_id)
            .map(|s| tables.submenu_with_count(s)))
    }
}

#[async_trait]
impl SubmenusWriteRepo for InMemoryStore {
    async fn create_submenu(
        &self,
        params: CreateSubmenuParams,
    ) -> Result<SubmenuRecord, RepoError> {
        let mut tables = self.write();
        if !tables.menus.iter().any(|m| m.id == params.menu_id) {
            return Err(RepoError::InvalidInput {
                message: "menu does not exist".into(),
            });
        }
        if tables
            .submenus
            .iter()
            .any(|s| s.menu_id == params.menu_id && s.title == params.title)
        {
            return Err(duplicate("submenus_menu_title_key"));
        }
        let record = SubmenuRecord {
            id: params.id,
            menu_id: params.menu_id,
            title: params.title,
            description: params.description,
        };
        tables.submenus.push(record.clone());
        Ok(record)
    }

    async fn update_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
        patch: &SubmenuPatch,
    ) -> Result<Option<SubmenuRecord>, RepoError> {
        let mut tables = self.write();
        if let Some(title) = &patch.title
            && tables
                .submenus
                .iter()
                .any(|s| s.menu_id == menu_id && s.id != id && &s.title == title)
        {
            return Err(duplicate("submenus_menu_title_key"));
        }
        let Some(submenu) = tables
            .submenus
            .iter_mut()
            .find(|s| s.id == id && s.menu_id == menu_id)
        else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            submenu.title = title.clone();
        }
        if let Some(description) = &patch.description {
            submenu.description = description.clone();
        }
        Ok(Some(submenu.clone()))
    }

    async fn delete_submenu(
        &self,
        menu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<SubmenuRecord>, RepoError> {
        let mut tables = self.write();
        let Some(pos) = tables
            .submenus
            .iter()
            .position(|s| s.id == id && s.menu_id == menu_id)
        else {
            return Ok(None);
        };
        let submenu = tables.submenus.remove(pos);
        tables.dishes.retain(|d| d.submenu_id != id);
        Ok(Some(submenu))
    }
}

#[async_trait]
impl DishesRepo for InMemoryStore {
    async fn list_dishes(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
    ) -> Result<Vec<DishRecord>, RepoError> {
        let tables = self.read();
        if !tables.submenu_in_menu(menu_id, submenu_id) {
            return Ok(Vec::new());
        }
        Ok(tables
            .dishes
            .iter()
            .filter(|d| d.submenu_id == submenu_id)
            .cloned()
            .collect())
    }

    async fn find_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
    ) -> Result<Option<DishRecord>, RepoError> {
        let tables = self.read();
        if !tables.submenu_in_menu(menu_id, submenu_id) {
            return Ok(None);
        }
        Ok(tables
            .dishes
            .iter()
            .find(|d| d.id == id && d.submenu_id == submenu_id)
            .cloned())
    }
}

#[async_trait]
impl DishesWriteRepo for InMemoryStore {
    async fn create_dish(&self, params: CreateDishParams) -> Result<DishRecord, RepoError> {
        let mut tables = self.write();
        if !tables.submenus.iter().any(|s| s.id == params.submenu_id) {
            return Err(RepoError::InvalidInput {
                message: "submenu does not exist".into(),
            });
        }
        if tables
            .dishes
            .iter()
            .any(|d| d.submenu_id == params.submenu_id && d.title == params.title)
        {
            return Err(duplicate("dishes_submenu_title_key"));
        }
        let record = DishRecord {
            id: params.id,
            submenu_id: params.submenu_id,
            title: params.title,
            description: params.description,
            price: params.price,
        };
        tables.dishes.push(record.clone());
        Ok(record)
    }

    async fn update_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        id: Uuid,
        patch: &DishPatch,
    ) -> Result<Option<DishRecord>, RepoError> {
        let mut tables = self.write();
        if !tables.submenu_in_menu(menu_id, submenu_id) {
            return Ok(None);
        }
        if let Some(title) = &patch.title
            && tables
                .dishes
                .iter()
                .any(|d| d.submenu_id == submenu_id && d.id != id && &d.title == title)
        {
            return Err(duplicate("dishes_submenu_title_key"));
        }
        let Some(dish) = tables
            .dishes
            .iter_mut()
            .find(|d| d.id == id && d.submenu_id == submenu_id)
        else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            dish.title = title.clone();
        }
        if let Some(description) = &patch.description {
            dish.description = description.clone();
        }
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
        let mut tables = self.write();
        if !tables.submenu_in_menu(menu_id, submenu_id) {
            return Ok(None);
        }
        let Some(pos) = tables
            .dishes
            .iter()
            .position(|d| d.id == id && d.submenu_id == submenu_id)
        else {
            return Ok(None);
        };
        Ok(Some(tables.dishes.remove(pos)))
    }
}

#[async_trait]
impl MenuTreeRepo for InMemoryStore {
    async fn load_menu_tree(&self) -> Result<Vec<MenuTree>, RepoError> {
        let tables = self.read();
        Ok(tables
            .menus
            .iter()
            .map(|menu| MenuTree {
                id: menu.id,
                title: menu.title.clone(),
                description: menu.description.clone(),
                submenus: tables
                    .submenus
                    .iter()
                    .filter(|s| s.menu_id == menu.id)
                    .map(|s| SubmenuTree {
                        id: s.id,
                        title: s.title.clone(),
                        description: s.description.clone(),
                        dishes: tables
                            .dishes
                            .iter()
                            .filter(|d| d.submenu_id == s.id)
                            .cloned()
                            .collect(),
                    })
                    .collect(),
            })
            .collect())
    }
}

#[async_trait]
impl HealthRepo for InMemoryStore {
    async fn ping(&self) -> Result<(), RepoError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Err(RepoError::Timeout)
        } else {
            Ok(())
        }
    }
}

/// Router plus handles on everything behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryStore>,
    pub backend: Arc<MemoryBackend>,
    pub trigger: Option<Arc<CacheTrigger>>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_cache(true)
    }

    pub fn with_cache(enabled: bool) -> Self {
        let config = CacheConfig {
            enabled,
            ..Default::default()
        };
        let store = Arc::new(InMemoryStore::default());
        let backend = Arc::new(MemoryBackend::new(&config));

        let trigger = enabled.then(|| {
            let cache_backend: Arc<dyn CacheBackend> = backend.clone();
            let cache_store = Arc::new(CacheStore::new(cache_backend, &config));
            let queue = Arc::new(EventQueue::new());
            let consumer = Arc::new(CacheConsumer::new(
                config.clone(),
                cache_store,
                queue.clone(),
            ));
            Arc::new(CacheTrigger::new(config.clone(), queue, consumer))
        });

        let state = ApiState {
            menus: Arc::new(
                MenuService::new(store.clone(), store.clone())
                    .with_cache_trigger_opt(trigger.clone()),
            ),
            submenus: Arc::new(
                SubmenuService::new(store.clone(), store.clone(), store.clone())
                    .with_cache_trigger_opt(trigger.clone()),
            ),
            dishes: Arc::new(
                DishService::new(store.clone(), store.clone(), store.clone())
                    .with_cache_trigger_opt(trigger.clone()),
            ),
            full_menu: Arc::new(
                FullMenuService::new(store.clone()).with_cache_trigger_opt(trigger.clone()),
            ),
            health: store.clone(),
        };

        Self {
            router: build_router(state),
            store,
            backend,
            trigger,
        }
    }

    /// Apply every pending cache event, as the background consumer would.
    pub async fn settle(&self) {
        if let Some(trigger) = &self.trigger {
            trigger.flush().await;
        }
    }

    pub async fn call(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let request = builder.body(body).expect("request should build");

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        self.settle().await;
        (status, json)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(body)).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, None).await
    }

    /// Create a menu and return its id.
    pub async fn menu(&self, title: &str) -> String {
        let (status, body) = self
            .post("/api/v1/menus/", serde_json::json!({ "title": title }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }

    pub async fn submenu(&self, menu_id: &str, title: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/v1/menus/{menu_id}/submenus/"),
                serde_json::json!({ "title": title }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }

    pub async fn dish(&self, menu_id: &str, submenu_id: &str, title: &str, price: &str) -> String {
        let (status, body) = self
            .post(
                &format!("/api/v1/menus/{menu_id}/submenus/{submenu_id}/dishes/"),
                serde_json::json!({ "title": title, "price": price }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        id_of(&body)
    }
}

pub fn id_of(body: &Value) -> String {
    body["id"]
        .as_str()
        .expect("response carries an id")
        .to_string()
}

/// Every key an event invalidates or sets; the aggregate shows up as its
/// full-tree key.
pub fn touched_keys(kind: &EventKind) -> Vec<CacheKey> {
    ConsumptionPlan::from_events(vec![CacheEvent::new(kind.clone(), 0)])
        .actions
        .into_iter()
        .map(|action| match action {
            CacheAction::InvalidateExact(key)
            | CacheAction::InvalidatePrefix(key)
            | CacheAction::Set { key, .. } => key,
            CacheAction::InvalidateAggregate => CacheKey::FullTree,
        })
        .collect()
}
