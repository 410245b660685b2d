use std::sync::Arc;

use crate::application::dishes::DishService;
use crate::application::full_menu::FullMenuService;
use crate::application::menus::MenuService;
use crate::application::repos::HealthRepo;
use crate::application::submenus::SubmenuService;

#[derive(Clone)]
pub struct ApiState {
    pub menus: Arc<MenuService>,
    pub submenus: Arc<SubmenuService>,
    pub dishes: Arc<DishService>,
    pub full_menu: Arc<FullMenuService>,
    pub health: Arc<dyn HealthRepo>,
}
