//! Application services: validation, cache read-through, and one cache event
//! per mutation, on top of the repository traits.

pub mod dishes;
pub mod error;
pub mod full_menu;
pub mod menus;
pub mod repos;
pub mod submenus;
pub mod sync;
