//! Domain layer types and invariants.

pub mod entities;
pub mod error;
pub mod patch;
pub mod price;
pub mod tree;
pub mod validation;
