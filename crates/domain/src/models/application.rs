//! Application listing domain model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Listing status of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStatus {
    Active,
    Suspended,
    Deleted,
}

impl AppStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStatus::Active => "active",
            AppStatus::Suspended => "suspended",
            AppStatus::Deleted => "deleted",
        }
    }
}

/// An application offered in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: i64,
    pub app_id: String,
    pub name: String,
    pub country_code: String,
    pub category_id: Option<i64>,
    pub subcategory_id: Option<i64>,
    pub icon_url: Option<String>,
    pub is_free: bool,
    pub account_price: Decimal,
    pub rating: Decimal,
    pub sort_order: i32,
    pub status: AppStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A node of the two-level category tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
}

/// Category placement of an application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPlacement {
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
}

/// Places an application under a leaf category.
///
/// A leaf with a parent puts the parent in `category_id` and the leaf in
/// `subcategory_id`; a root leaf fills `category_id` only.
pub fn place_category(leaf: &Category) -> CategoryPlacement {
    match leaf.parent_id {
        Some(parent) => CategoryPlacement {
            category_id: parent,
            subcategory_id: Some(leaf.id),
        },
        None => CategoryPlacement {
            category_id: leaf.id,
            subcategory_id: None,
        },
    }
}

/// Request payload for creating an application.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationRequest {
    #[validate(length(min = 1, max = 128, message = "App id must be 1-128 characters"))]
    pub app_id: String,

    #[validate(length(min = 1, max = 200, message = "Name must be 1-200 characters"))]
    pub name: String,

    #[validate(length(equal = 2, message = "Country code must be 2 characters"))]
    pub country_code: String,

    pub category_id: Option<i64>,

    pub icon_url: Option<String>,

    #[serde(default)]
    pub is_free: bool,

    #[serde(default)]
    pub account_price: Decimal,

    #[serde(default)]
    pub sort_order: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_place_under_parent() {
        let leaf = Category {
            id: 12,
            name: "Puzzle".into(),
            parent_id: Some(3),
        };
        let placement = place_category(&leaf);
        assert_eq!(placement.category_id, 3);
        assert_eq!(placement.subcategory_id, Some(12));
    }

    #[test]
    fn test_place_root_leaf() {
        let leaf = Category {
            id: 3,
            name: "Games".into(),
            parent_id: None,
        };
        let placement = place_category(&leaf);
        assert_eq!(placement.category_id, 3);
        assert_eq!(placement.subcategory_id, None);
    }
}
