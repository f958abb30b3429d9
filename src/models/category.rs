// Category models - expense categories with embedded subcategories
// Path: categories/{category_id}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subcategory embedded in a category document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Subcategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subcategory {
    pub fn new(name: String, description: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            name,
            description,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Category stored in Firestore
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CategoryDB {
    /// Document ID
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
    /// Hex color, e.g. "#FF6B6B"
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
    /// Soft-delete flag
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default)]
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_active() -> bool {
    true
}

impl CategoryDB {
    /// Case-insensitive subcategory lookup
    pub fn find_subcategory(&self, name: &str) -> Option<usize> {
        let wanted = name.trim().to_lowercase();
        self.subcategories
            .iter()
            .position(|sub| sub.name.to_lowercase() == wanted)
    }

    pub fn subcategory_names(&self) -> Vec<&str> {
        self.subcategories.iter().map(|s| s.name.as_str()).collect()
    }
}

/// Request body for creating a category
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryCreate {
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i64,
    /// Optional initial subcategories
    #[serde(default)]
    pub subcategories: Vec<SubcategoryCreate>,
}

/// Request body for updating a category
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub is_active: Option<bool>,
    pub sort_order: Option<i64>,
}

/// Request body for adding a subcategory
#[derive(Debug, Clone, Deserialize)]
pub struct SubcategoryCreate {
    pub name: String,
    pub description: Option<String>,
}

/// Request body for renaming or re-describing a subcategory
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubcategoryUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_subcategory_ignores_case() {
        let now = Utc::now();
        let category = CategoryDB {
            id: "abc".to_string(),
            name: "Transportation".to_string(),
            description: None,
            subcategories: vec![
                Subcategory::new("Bus".to_string(), None),
                Subcategory::new("Taxi".to_string(), None),
            ],
            color: None,
            icon: None,
            is_active: true,
            sort_order: 2,
            created_at: now,
            updated_at: now,
        };

        assert_eq!(category.find_subcategory("taxi"), Some(1));
        assert_eq!(category.find_subcategory(" BUS "), Some(0));
        assert_eq!(category.find_subcategory("Train"), None);
        assert_eq!(category.subcategory_names(), vec!["Bus", "Taxi"]);
    }
}
