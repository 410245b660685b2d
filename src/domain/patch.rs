//! Partial updates. `None` leaves a field untouched; for descriptions
//! `Some(None)` clears the stored value.

use super::error::DomainError;
use super::price::Price;
use super::validation::{normalize_description, normalize_title};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MenuPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
}

impl MenuPatch {
    pub fn new(
        title: Option<String>,
        description: Option<Option<String>>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            title: title.as_deref().map(normalize_title).transpose()?,
            description: description.map(normalize_description),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmenuPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
}

impl SubmenuPatch {
    pub fn new(
        title: Option<String>,
        description: Option<Option<String>>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            title: title.as_deref().map(normalize_title).transpose()?,
            description: description.map(normalize_description),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DishPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub price: Option<Price>,
}

impl DishPatch {
    pub fn new(
        title: Option<String>,
        description: Option<Option<String>>,
        price: Option<String>,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            title: title.as_deref().map(normalize_title).transpose()?,
            description: description.map(normalize_description),
            price: price.as_deref().map(Price::parse).transpose()?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none() && self.price.is_none()
    }
}
