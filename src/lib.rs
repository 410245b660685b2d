//! Restaurant menu API with a path-keyed cache and precise fan-out invalidation.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
