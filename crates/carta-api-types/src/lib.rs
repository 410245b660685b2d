//! Request and response payloads for the carta `/api/v1` surface.
//!
//! Ids are UUIDs rendered as strings; prices travel as decimal strings and
//! are never reinterpreted as floats.

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

// ----- Requests -----

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MenuCreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial menu update. Absent fields are left unchanged; an explicit
/// `"description": null` clears the description.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct MenuUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SubmenuCreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SubmenuUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DishCreateRequest {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DishUpdateRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub description: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
}

/// Marks a field as present even when its value is `null`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ----- Responses -----

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MenuResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MenuWithCountsResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub submenus_count: u64,
    pub dishes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubmenuResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub menu_id: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SubmenuWithCountResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub menu_id: Uuid,
    pub dishes_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DishResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub price: String,
    pub submenu_id: Uuid,
}

/// One menu of the `/menus/full` tree.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FullMenuResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub submenus: Vec<FullSubmenuResponse>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FullSubmenuResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub dishes: Vec<DishResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let absent: MenuUpdateRequest = serde_json::from_str(r#"{"title":"Lunch"}"#).unwrap();
        assert_eq!(absent.title.as_deref(), Some("Lunch"));
        assert!(absent.description.is_none());

        let cleared: MenuUpdateRequest = serde_json::from_str(r#"{"description":null}"#).unwrap();
        assert!(cleared.title.is_none());
        assert_eq!(cleared.description, Some(None));

        let set: MenuUpdateRequest =
            serde_json::from_str(r#"{"description":"seasonal"}"#).unwrap();
        assert_eq!(set.description, Some(Some("seasonal".to_string())));
    }

    #[test]
    fn dish_create_requires_price() {
        let err = serde_json::from_str::<DishCreateRequest>(r#"{"title":"Soup"}"#);
        assert!(err.is_err());

        let ok: DishCreateRequest =
            serde_json::from_str(r#"{"title":"Soup","price":"10.99"}"#).unwrap();
        assert_eq!(ok.price, "10.99");
        assert!(ok.description.is_none());
    }
}
