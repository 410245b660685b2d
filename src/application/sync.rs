//! Menu sync job.
//!
//! Reconciles the store with a TOML document describing the desired tree.
//! Entities are matched by title at each level; everything goes through the
//! same services the HTTP handlers use so cache maintenance applies as usual.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::dishes::{CreateDishCommand, DishService, DishServiceError};
use crate::application::menus::{CreateMenuCommand, MenuService, MenuServiceError};
use crate::application::repos::{MenuTreeRepo, RepoError};
use crate::application::submenus::{CreateSubmenuCommand, SubmenuService, SubmenuServiceError};
use crate::domain::entities::{DishRecord, MenuTree, SubmenuTree};
use crate::domain::patch::{DishPatch, MenuPatch, SubmenuPatch};
use crate::domain::price::Price;
use crate::domain::validation::{normalize_description, normalize_title};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to read `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse menu document: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid menu document: {0}")]
    Invalid(String),
    #[error(transparent)]
    Menu(#[from] MenuServiceError),
    #[error(transparent)]
    Submenu(#[from] SubmenuServiceError),
    #[error(transparent)]
    Dish(#[from] DishServiceError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Desired state, as read from the sync file.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct MenuDocument {
    #[serde(default)]
    pub menus: Vec<MenuSpec>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MenuSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub submenus: Vec<SubmenuSpec>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SubmenuSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dishes: Vec<DishSpec>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DishSpec {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: String,
}

impl MenuDocument {
    pub fn parse(raw: &str) -> Result<Self, SyncError> {
        let document: Self = toml::from_str(raw)?;
        document.normalized()
    }

    /// Trim titles, blank descriptions to `None`, canonicalize prices, and
    /// reject sibling title collisions.
    fn normalized(self) -> Result<Self, SyncError> {
        let invalid = |err: crate::domain::error::DomainError| SyncError::Invalid(err.to_string());

        let mut menu_titles = HashSet::new();
        let mut menus = Vec::with_capacity(self.menus.len());
        for menu in self.menus {
            let title = normalize_title(&menu.title).map_err(invalid)?;
            ensure_unique(&mut menu_titles, &title, "menu")?;

            let mut submenu_titles = HashSet::new();
            let mut submenus = Vec::with_capacity(menu.submenus.len());
            for submenu in menu.submenus {
                let sub_title = normalize_title(&submenu.title).map_err(invalid)?;
                ensure_unique(&mut submenu_titles, &sub_title, "submenu")?;

                let mut dish_titles = HashSet::new();
                let mut dishes = Vec::with_capacity(submenu.dishes.len());
                for dish in submenu.dishes {
                    let dish_title = normalize_title(&dish.title).map_err(invalid)?;
                    ensure_unique(&mut dish_titles, &dish_title, "dish")?;
                    let price = Price::parse(&dish.price).map_err(invalid)?;
                    dishes.push(DishSpec {
                        title: dish_title,
                        description: normalize_description(dish.description),
                        price: price.as_str().to_string(),
                    });
                }

                submenus.push(SubmenuSpec {
                    title: sub_title,
                    description: normalize_description(submenu.description),
                    dishes,
                });
            }

            menus.push(MenuSpec {
                title,
                description: normalize_description(menu.description),
                submenus,
            });
        }

        Ok(Self { menus })
    }
}

fn ensure_unique(seen: &mut HashSet<String>, title: &str, kind: &str) -> Result<(), SyncError> {
    if seen.insert(title.to_string()) {
        Ok(())
    } else {
        Err(SyncError::Invalid(format!("duplicate {kind} title `{title}`")))
    }
}

/// One reconciliation step. Creates carry the whole nested spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOp {
    DeleteMenu {
        menu_id: Uuid,
    },
    DeleteSubmenu {
        menu_id: Uuid,
        submenu_id: Uuid,
    },
    DeleteDish {
        menu_id: Uuid,
        submenu_id: Uuid,
        dish_id: Uuid,
    },
    UpdateMenu {
        menu_id: Uuid,
        description: Option<String>,
    },
    UpdateSubmenu {
        menu_id: Uuid,
        submenu_id: Uuid,
        description: Option<String>,
    },
    UpdateDish {
        menu_id: Uuid,
        submenu_id: Uuid,
        dish_id: Uuid,
        description: Option<String>,
        price: String,
    },
    CreateMenu(MenuSpec),
    CreateSubmenu {
        menu_id: Uuid,
        spec: SubmenuSpec,
    },
    CreateDish {
        menu_id: Uuid,
        submenu_id: Uuid,
        spec: DishSpec,
    },
}

/// Diff the current tree against the normalized document.
///
/// Deletes come first, then updates, then creates.
pub fn plan_sync(current: &[MenuTree], desired: &MenuDocument) -> Vec<SyncOp> {
    let mut deletes = Vec::new();
    let mut updates = Vec::new();
    let mut creates = Vec::new();

    for menu in current {
        if !desired.menus.iter().any(|spec| spec.title == menu.title) {
            deletes.push(SyncOp::DeleteMenu { menu_id: menu.id });
        }
    }

    for spec in &desired.menus {
        let Some(menu) = current.iter().find(|menu| menu.title == spec.title) else {
            creates.push(SyncOp::CreateMenu(spec.clone()));
            continue;
        };

        if menu.description != spec.description {
            updates.push(SyncOp::UpdateMenu {
                menu_id: menu.id,
                description: spec.description.clone(),
            });
        }

        plan_submenus(menu, spec, &mut deletes, &mut updates, &mut creates);
    }

    deletes.extend(updates);
    deletes.extend(creates);
    deletes
}

fn plan_submenus(
    menu: &MenuTree,
    spec: &MenuSpec,
    deletes: &mut Vec<SyncOp>,
    updates: &mut Vec<SyncOp>,
    creates: &mut Vec<SyncOp>,
) {
    for submenu in &menu.submenus {
        if !spec.submenus.iter().any(|s| s.title == submenu.title) {
            deletes.push(SyncOp::DeleteSubmenu {
                menu_id: menu.id,
                submenu_id: submenu.id,
            });
        }
    }

    for sub_spec in &spec.submenus {
        let Some(submenu) = menu.submenus.iter().find(|s| s.title == sub_spec.title) else {
            creates.push(SyncOp::CreateSubmenu {
                menu_id: menu.id,
                spec: sub_spec.clone(),
            });
            continue;
        };

        if submenu.description != sub_spec.description {
            updates.push(SyncOp::UpdateSubmenu {
                menu_id: menu.id,
                submenu_id: submenu.id,
                description: sub_spec.description.clone(),
            });
        }

        plan_dishes(menu.id, submenu, sub_spec, deletes, updates, creates);
    }
}

fn plan_dishes(
    menu_id: Uuid,
    submenu: &SubmenuTree,
    spec: &SubmenuSpec,
    deletes: &mut Vec<SyncOp>,
    updates: &mut Vec<SyncOp>,
    creates: &mut Vec<SyncOp>,
) {
    for dish in &submenu.dishes {
        if !spec.dishes.iter().any(|d| d.title == dish.title) {
            deletes.push(SyncOp::DeleteDish {
                menu_id,
                submenu_id: submenu.id,
                dish_id: dish.id,
            });
        }
    }

    for dish_spec in &spec.dishes {
        match submenu.dishes.iter().find(|d| d.title == dish_spec.title) {
            None => creates.push(SyncOp::CreateDish {
                menu_id,
                submenu_id: submenu.id,
                spec: dish_spec.clone(),
            }),
            Some(dish) if dish_differs(dish, dish_spec) => updates.push(SyncOp::UpdateDish {
                menu_id,
                submenu_id: submenu.id,
                dish_id: dish.id,
                description: dish_spec.description.clone(),
                price: dish_spec.price.clone(),
            }),
            Some(_) => {}
        }
    }
}

fn dish_differs(dish: &DishRecord, spec: &DishSpec) -> bool {
    dish.description != spec.description || dish.price.as_str() != spec.price
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0
    }
}

#[derive(Debug, Clone)]
pub struct SyncJobConfig {
    pub file: PathBuf,
    pub interval: Duration,
    pub retry_delay: Duration,
}

#[derive(Clone)]
pub struct SyncJob {
    config: SyncJobConfig,
    tree: Arc<dyn MenuTreeRepo>,
    menus: MenuService,
    submenus: SubmenuService,
    dishes: DishService,
}

impl SyncJob {
    pub fn new(
        config: SyncJobConfig,
        tree: Arc<dyn MenuTreeRepo>,
        menus: MenuService,
        submenus: SubmenuService,
        dishes: DishService,
    ) -> Self {
        Self {
            config,
            tree,
            menus,
            submenus,
            dishes,
        }
    }

    pub fn file(&self) -> &Path {
        &self.config.file
    }

    /// Run one full reconciliation pass.
    pub async fn run_once(&self) -> Result<SyncReport, SyncError> {
        let raw = tokio::fs::read_to_string(&self.config.file)
            .await
            .map_err(|source| SyncError::Read {
                path: self.config.file.clone(),
                source,
            })?;
        let desired = MenuDocument::parse(&raw)?;
        self.apply_document(&desired).await
    }

    /// Reconcile the store with an already parsed document.
    pub async fn apply_document(&self, desired: &MenuDocument) -> Result<SyncReport, SyncError> {
        let current = self.tree.load_menu_tree().await?;
        let ops = plan_sync(&current, desired);
        let mut report = SyncReport::default();

        for op in ops {
            self.apply(op, &mut report).await?;
        }

        Ok(report)
    }

    /// Loop until shutdown: `interval` between successful passes,
    /// `retry_delay` after a failed one.
    pub async fn run_forever(self, mut shutdown: watch::Receiver<bool>) {
        info!(file = %self.config.file.display(), "Menu sync job started");
        loop {
            let delay = match self.run_once().await {
                Ok(report) => {
                    if report.is_noop() {
                        info!("Menu sync pass found nothing to change");
                    } else {
                        info!(
                            created = report.created,
                            updated = report.updated,
                            deleted = report.deleted,
                            "Menu sync pass applied"
                        );
                    }
                    self.config.interval
                }
                Err(err) => {
                    error!(
                        error = %err,
                        retry_in_secs = self.config.retry_delay.as_secs(),
                        "Menu sync pass failed"
                    );
                    self.config.retry_delay
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Menu sync job stopped");
    }

    async fn apply(&self, op: SyncOp, report: &mut SyncReport) -> Result<(), SyncError> {
        match op {
            SyncOp::DeleteMenu { menu_id } => {
                self.menus.delete(menu_id).await?;
                report.deleted += 1;
            }
            SyncOp::DeleteSubmenu {
                menu_id,
                submenu_id,
            } => {
                self.submenus.delete(menu_id, submenu_id).await?;
                report.deleted += 1;
            }
            SyncOp::DeleteDish {
                menu_id,
                submenu_id,
                dish_id,
            } => {
                self.dishes.delete(menu_id, submenu_id, dish_id).await?;
                report.deleted += 1;
            }
            SyncOp::UpdateMenu {
                menu_id,
                description,
            } => {
                let patch = MenuPatch::new(None, Some(description)).map_err(MenuServiceError::from)?;
                self.menus.update(menu_id, patch).await?;
                report.updated += 1;
            }
            SyncOp::UpdateSubmenu {
                menu_id,
                submenu_id,
                description,
            } => {
                let patch =
                    SubmenuPatch::new(None, Some(description)).map_err(SubmenuServiceError::from)?;
                self.submenus.update(menu_id, submenu_id, patch).await?;
                report.updated += 1;
            }
            SyncOp::UpdateDish {
                menu_id,
                submenu_id,
                dish_id,
                description,
                price,
            } => {
                let patch = DishPatch::new(None, Some(description), Some(price))
                    .map_err(DishServiceError::from)?;
                self.dishes
                    .update(menu_id, submenu_id, dish_id, patch)
                    .await?;
                report.updated += 1;
            }
            SyncOp::CreateMenu(spec) => {
                let menu = self
                    .menus
                    .create(CreateMenuCommand {
                        title: spec.title,
                        description: spec.description,
                    })
                    .await?;
                report.created += 1;
                for submenu in spec.submenus {
                    self.create_submenu(menu.id, submenu, report).await?;
                }
            }
            SyncOp::CreateSubmenu { menu_id, spec } => {
                self.create_submenu(menu_id, spec, report).await?;
            }
            SyncOp::CreateDish {
                menu_id,
                submenu_id,
                spec,
            } => {
                self.create_dish(menu_id, submenu_id, spec, report).await?;
            }
        }
        Ok(())
    }

    async fn create_submenu(
        &self,
        menu_id: Uuid,
        spec: SubmenuSpec,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let submenu = self
            .submenus
            .create(
                menu_id,
                CreateSubmenuCommand {
                    title: spec.title,
                    description: spec.description,
                },
            )
            .await?;
        report.created += 1;
        for dish in spec.dishes {
            self.create_dish(menu_id, submenu.id, dish, report).await?;
        }
        Ok(())
    }

    async fn create_dish(
        &self,
        menu_id: Uuid,
        submenu_id: Uuid,
        spec: DishSpec,
        report: &mut SyncReport,
    ) -> Result<(), SyncError> {
        let title = spec.title.clone();
        match self
            .dishes
            .create(
                menu_id,
                submenu_id,
                CreateDishCommand {
                    title: spec.title,
                    description: spec.description,
                    price: spec.price,
                },
            )
            .await
        {
            Ok(_) => {
                report.created += 1;
                Ok(())
            }
            Err(DishServiceError::Repo(RepoError::Duplicate { .. })) => {
                warn!(title = %title, "Dish appeared concurrently; skipping create");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}
