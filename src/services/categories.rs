// Category and subcategory management
// Categories are soft-deleted by default; subcategories live inside the category document

use chrono::Utc;
use std::sync::Arc;

use super::firestore::document_id_from_seed;
use super::store::DocumentStore;
use crate::error::{AppError, Result};
use crate::models::{
    CategoryCreate, CategoryDB, CategoryUpdate, Subcategory, SubcategoryCreate, SubcategoryUpdate,
};
use crate::utils::validation::{
    check_reserved_category_name, validate_category_name, validate_color, validate_description,
    validate_document_id, validate_icon, validate_subcategory_name,
};

struct DefaultCategory {
    name: &'static str,
    description: &'static str,
    color: &'static str,
    icon: &'static str,
    sort_order: i64,
    subcategories: &'static [(&'static str, &'static str)],
}

const DEFAULT_CATEGORIES: &[DefaultCategory] = &[
    DefaultCategory {
        name: "Food & Dining",
        description: "Expenses related to food and dining",
        color: "#FF6B6B",
        icon: "🍽️",
        sort_order: 1,
        subcategories: &[
            ("Breakfast", "Morning meals"),
            ("Lunch", "Midday meals"),
            ("Dinner", "Evening meals"),
            ("Snacks", "Light snacks and beverages"),
            ("Restaurant", "Restaurant dining"),
            ("Delivery", "Food delivery services"),
        ],
    },
    DefaultCategory {
        name: "Transportation",
        description: "Travel and commuting expenses",
        color: "#4ECDC4",
        icon: "🚗",
        sort_order: 2,
        subcategories: &[
            ("Bus", "Public bus transportation"),
            ("Taxi", "Taxi and ride-sharing services"),
            ("Train", "Train and metro services"),
            ("Fuel", "Vehicle fuel expenses"),
            ("Parking", "Parking fees"),
            ("Maintenance", "Vehicle maintenance"),
        ],
    },
    DefaultCategory {
        name: "Entertainment",
        description: "Leisure and entertainment expenses",
        color: "#45B7D1",
        icon: "🎬",
        sort_order: 3,
        subcategories: &[
            ("Movies", "Cinema and movie tickets"),
            ("Games", "Video games and gaming"),
            ("Music", "Music and concerts"),
            ("Events", "Live events and shows"),
            ("Books", "Books and publications"),
            ("Streaming", "Streaming services"),
        ],
    },
    DefaultCategory {
        name: "Utilities",
        description: "Household and utility bills",
        color: "#96CEB4",
        icon: "💡",
        sort_order: 4,
        subcategories: &[
            ("Electricity", "Electricity bills"),
            ("Water", "Water supply bills"),
            ("Internet", "Internet service"),
            ("Phone", "Mobile and landline"),
            ("Gas", "Gas supply bills"),
            ("Other", "Other utility services"),
        ],
    },
    DefaultCategory {
        name: "Healthcare",
        description: "Medical and health-related expenses",
        color: "#FECA57",
        icon: "🏥",
        sort_order: 5,
        subcategories: &[
            ("Doctor", "Doctor consultations"),
            ("Medicine", "Medicines and pharmaceuticals"),
            ("Hospital", "Hospital visits and treatments"),
            ("Insurance", "Health insurance premiums"),
            ("Dental", "Dental care"),
            ("Optical", "Eye care and glasses"),
        ],
    },
];

fn optional<F>(value: &Option<String>, validate: F) -> Result<Option<String>>
where
    F: Fn(&str) -> Result<String>,
{
    value.as_deref().map(validate).transpose()
}

fn require_id(category_id: &str) -> Result<&str> {
    validate_document_id("category_id", category_id)
}

pub struct CategoryService {
    store: Arc<dyn DocumentStore>,
}

impl CategoryService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Categories ordered by sort_order
    pub async fn get_all_categories(&self, include_inactive: bool) -> Result<Vec<CategoryDB>> {
        let categories = self.store.list_categories(include_inactive).await?;
        tracing::info!(
            "Retrieved {} categories (include_inactive={})",
            categories.len(),
            include_inactive
        );
        Ok(categories)
    }

    pub async fn get_category_by_id(&self, category_id: &str) -> Result<CategoryDB> {
        let id = require_id(category_id)?;
        self.store
            .get_category(id)
            .await?
            .ok_or_else(|| AppError::not_found("category", id))
    }

    /// Case-insensitive lookup
    pub async fn get_category_by_name(&self, name: &str) -> Result<Option<CategoryDB>> {
        if name.trim().is_empty() {
            return Err(AppError::invalid("name", "Category name cannot be empty"));
        }
        self.store.find_category_by_name(name.trim()).await
    }

    pub async fn create_category(&self, data: &CategoryCreate) -> Result<CategoryDB> {
        let name = validate_category_name(&data.name)?;
        check_reserved_category_name(&name)?;

        let now = Utc::now();
        let mut subcategories: Vec<Subcategory> = Vec::with_capacity(data.subcategories.len());
        for sub in &data.subcategories {
            let sub_name = validate_subcategory_name(&sub.name)?;
            if subcategories
                .iter()
                .any(|s| s.name.to_lowercase() == sub_name.to_lowercase())
            {
                return Err(AppError::already_exists("subcategory", sub_name));
            }
            subcategories.push(Subcategory::new(
                sub_name,
                optional(&sub.description, validate_description)?,
            ));
        }

        if self.get_category_by_name(&name).await?.is_some() {
            return Err(AppError::already_exists("category", name));
        }

        let mut category = CategoryDB {
            id: document_id_from_seed(&name.to_lowercase()),
            name,
            description: optional(&data.description, validate_description)?,
            subcategories,
            color: optional(&data.color, validate_color)?,
            icon: optional(&data.icon, validate_icon)?,
            is_active: true,
            sort_order: data.sort_order,
            created_at: now,
            updated_at: now,
        };

        if let Err(e) = self.store.create_category(&category).await {
            // The derived id can be held by a category that was renamed since
            if !matches!(e, AppError::AlreadyExists { .. })
                || self.store.find_category_by_name(&category.name).await?.is_some()
            {
                return Err(e);
            }
            category.id = uuid::Uuid::new_v4().to_string();
            self.store.create_category(&category).await?;
        }

        tracing::info!(
            "Category created: {} ({}) with {} subcategories",
            category.name,
            category.id,
            category.subcategories.len()
        );
        Ok(category)
    }

    pub async fn update_category(&self, category_id: &str, data: &CategoryUpdate) -> Result<CategoryDB> {
        let name = optional(&data.name, validate_category_name)?;
        let description = optional(&data.description, validate_description)?;
        let color = optional(&data.color, validate_color)?;
        let icon = optional(&data.icon, validate_icon)?;

        let mut category = self.get_category_by_id(category_id).await?;
        let old_name = category.name.clone();

        if let Some(new_name) = name {
            if new_name != category.name {
                if let Some(existing) = self.get_category_by_name(&new_name).await? {
                    if existing.id != category.id {
                        return Err(AppError::already_exists("category", new_name));
                    }
                }
            }
            category.name = new_name;
        }
        if description.is_some() {
            category.description = description;
        }
        if color.is_some() {
            category.color = color;
        }
        if icon.is_some() {
            category.icon = icon;
        }
        if let Some(active) = data.is_active {
            category.is_active = active;
        }
        if let Some(order) = data.sort_order {
            category.sort_order = order;
        }
        category.updated_at = Utc::now();

        self.store.save_category(&category).await?;

        tracing::info!(
            "Category updated: {} ({} -> {})",
            category.id,
            old_name,
            category.name
        );
        Ok(category)
    }

    /// Soft delete unless `hard_delete`; refuses categories that still have subcategories
    pub async fn delete_category(&self, category_id: &str, hard_delete: bool) -> Result<bool> {
        let mut category = self.get_category_by_id(category_id).await?;

        if !category.subcategories.is_empty() && !hard_delete {
            return Err(AppError::BusinessRule(format!(
                "Cannot delete category '{}' because it contains {} subcategories. \
                 Remove all subcategories first or use hard delete.",
                category.name,
                category.subcategories.len()
            )));
        }

        if hard_delete {
            let deleted = self.store.delete_category(&category.id).await?;
            tracing::warn!("Category hard deleted: {} ({})", category.name, category.id);
            return Ok(deleted);
        }

        category.is_active = false;
        category.updated_at = Utc::now();
        self.store.save_category(&category).await?;
        tracing::info!("Category soft deleted: {} ({})", category.name, category.id);
        Ok(true)
    }

    pub async fn add_subcategory(&self, category_id: &str, data: &SubcategoryCreate) -> Result<CategoryDB> {
        let name = validate_subcategory_name(&data.name)?;
        let description = optional(&data.description, validate_description)?;

        let mut category = self.get_category_by_id(category_id).await?;
        if category.find_subcategory(&name).is_some() {
            return Err(AppError::already_exists("subcategory", name));
        }

        category.subcategories.push(Subcategory::new(name.clone(), description));
        category.updated_at = Utc::now();
        self.store.save_category(&category).await?;

        tracing::info!("Subcategory {} added to {}", name, category.name);
        Ok(category)
    }

    pub async fn update_subcategory(
        &self,
        category_id: &str,
        old_name: &str,
        data: &SubcategoryUpdate,
    ) -> Result<CategoryDB> {
        let new_name = optional(&data.name, validate_subcategory_name)?;
        let description = optional(&data.description, validate_description)?;

        let mut category = self.get_category_by_id(category_id).await?;
        let index = category
            .find_subcategory(old_name)
            .ok_or_else(|| AppError::not_found("subcategory", old_name))?;

        if let Some(name) = &new_name {
            let conflict = category
                .find_subcategory(name)
                .map_or(false, |other| other != index);
            if conflict {
                return Err(AppError::already_exists("subcategory", name.clone()));
            }
        }

        let now = Utc::now();
        let sub = &mut category.subcategories[index];
        if let Some(name) = new_name {
            sub.name = name;
        }
        if description.is_some() {
            sub.description = description;
        }
        sub.updated_at = now;
        category.updated_at = now;

        self.store.save_category(&category).await?;
        tracing::info!("Subcategory {} updated in {}", old_name, category.name);
        Ok(category)
    }

    pub async fn remove_subcategory(&self, category_id: &str, name: &str) -> Result<bool> {
        let mut category = self.get_category_by_id(category_id).await?;
        let index = category
            .find_subcategory(name)
            .ok_or_else(|| AppError::not_found("subcategory", name))?;

        let removed = category.subcategories.remove(index);
        category.updated_at = Utc::now();
        self.store.save_category(&category).await?;

        tracing::info!("Subcategory {} removed from {}", removed.name, category.name);
        Ok(true)
    }

    /// Create the default categories when the collection is empty
    pub async fn seed_default_categories(&self) -> Result<Vec<CategoryDB>> {
        let existing = self.store.count_categories().await?;
        if existing > 0 {
            tracing::info!("Categories already seeded ({} present)", existing);
            return Ok(vec![]);
        }

        let mut created = Vec::with_capacity(DEFAULT_CATEGORIES.len());
        for default in DEFAULT_CATEGORIES {
            let data = CategoryCreate {
                name: default.name.to_string(),
                description: Some(default.description.to_string()),
                color: Some(default.color.to_string()),
                icon: Some(default.icon.to_string()),
                sort_order: default.sort_order,
                subcategories: default
                    .subcategories
                    .iter()
                    .map(|(name, description)| SubcategoryCreate {
                        name: name.to_string(),
                        description: Some(description.to_string()),
                    })
                    .collect(),
            };

            match self.create_category(&data).await {
                Ok(category) => created.push(category),
                Err(e) => tracing::error!("Failed to create default category {}: {}", default.name, e),
            }
        }

        tracing::info!("Default categories seeded: {}", created.len());
        Ok(created)
    }
}
