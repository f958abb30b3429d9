// Input validation and redaction helpers

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};

pub const REDACTED: &str = "***REDACTED***";

const SENSITIVE_KEYS: &[&str] = &[
    "openai_api_key",
    "google_api_key",
    "langsmith_api_key",
    "mongodb_uri",
    "mongo_uri",
    "db_uri",
    "api_key",
    "apikey",
    "token",
    "access_token",
    "secret",
];

const RESERVED_CATEGORY_NAMES: &[&str] = &["uncategorized", "other", "miscellaneous"];

const MAX_NAME_LEN: usize = 50;
const MAX_DESCRIPTION_LEN: usize = 200;
const MAX_ICON_LEN: usize = 50;
const MAX_DOCUMENT_ID_BYTES: usize = 1500;

/// Shallow copy of `data` with sensitive top-level values masked.
/// Keys are compared case-insensitively.
pub fn redact_sensitive_data(data: &Map<String, Value>) -> Map<String, Value> {
    data.iter()
        .map(|(key, value)| {
            let lowered = key.to_lowercase();
            if SENSITIVE_KEYS.contains(&lowered.as_str()) {
                (key.clone(), Value::String(REDACTED.to_string()))
            } else {
                (key.clone(), value.clone())
            }
        })
        .collect()
}

fn category_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\s\-_&]+$").expect("valid category pattern"))
}

fn subcategory_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-zA-Z0-9\s\-_]+$").expect("valid subcategory pattern"))
}

fn color_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^#[0-9A-Fa-f]{6}$").expect("valid color pattern"))
}

/// Validate a category name and return it trimmed
pub fn validate_category_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid("name", "Category name is required"));
    }
    let len = trimmed.chars().count();
    if len < 2 {
        return Err(AppError::invalid("name", "Category name must be at least 2 characters"));
    }
    if len > MAX_NAME_LEN {
        return Err(AppError::invalid("name", "Category name cannot exceed 50 characters"));
    }
    if !category_name_pattern().is_match(trimmed) {
        return Err(AppError::invalid(
            "name",
            "Category name can only contain letters, numbers, spaces, hyphens, underscores, and ampersands",
        ));
    }
    Ok(trimmed.to_string())
}

/// Reserved names may not be used for new categories
pub fn check_reserved_category_name(name: &str) -> Result<()> {
    let lowered = name.trim().to_lowercase();
    if RESERVED_CATEGORY_NAMES.contains(&lowered.as_str()) {
        return Err(AppError::invalid(
            "name",
            format!("'{}' is a reserved category name", name.trim()),
        ));
    }
    Ok(())
}

/// Validate a subcategory name and return it trimmed
pub fn validate_subcategory_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::invalid("name", "Subcategory name is required"));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(AppError::invalid("name", "Subcategory name cannot exceed 50 characters"));
    }
    if !subcategory_name_pattern().is_match(trimmed) {
        return Err(AppError::invalid(
            "name",
            "Subcategory name can only contain letters, numbers, spaces, hyphens, and underscores",
        ));
    }
    Ok(trimmed.to_string())
}

pub fn validate_color(color: &str) -> Result<String> {
    let trimmed = color.trim();
    if !color_pattern().is_match(trimmed) {
        return Err(AppError::invalid("color", "Color must be a hex value like #F8BBD9"));
    }
    Ok(trimmed.to_string())
}

pub fn validate_icon(icon: &str) -> Result<String> {
    let trimmed = icon.trim();
    if trimmed.chars().count() > MAX_ICON_LEN {
        return Err(AppError::invalid("icon", "Icon cannot exceed 50 characters"));
    }
    Ok(trimmed.to_string())
}

/// Document ids are single path segments in the store's URLs
pub fn validate_document_id<'a>(field: &str, id: &'a str) -> Result<&'a str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::invalid(field, "ID cannot be empty"));
    }
    let reserved = id == "." || id == ".." || (id.len() > 4 && id.starts_with("__") && id.ends_with("__"));
    if id.contains('/') || reserved || id.len() > MAX_DOCUMENT_ID_BYTES {
        return Err(AppError::invalid(field, "Not a valid document ID"));
    }
    Ok(id)
}

pub fn validate_description(description: &str) -> Result<String> {
    let trimmed = description.trim();
    if trimmed.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(AppError::invalid(
            "description",
            "Description cannot exceed 200 characters",
        ));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_redact_masks_sensitive_keys_case_insensitively() {
        let snapshot = json!({
            "provider": "openai",
            "OPENAI_API_KEY": "sk-123",
            "Token": "abc",
            "model": "gpt-4o"
        });
        let redacted = redact_sensitive_data(snapshot.as_object().unwrap());

        assert_eq!(redacted["provider"], "openai");
        assert_eq!(redacted["model"], "gpt-4o");
        assert_eq!(redacted["OPENAI_API_KEY"], REDACTED);
        assert_eq!(redacted["Token"], REDACTED);
    }

    #[test]
    fn test_redact_is_shallow() {
        let snapshot = json!({"nested": {"api_key": "keep-me"}});
        let redacted = redact_sensitive_data(snapshot.as_object().unwrap());
        assert_eq!(redacted["nested"]["api_key"], "keep-me");
    }

    #[test]
    fn test_category_names() {
        assert_eq!(validate_category_name("  Food & Dining ").unwrap(), "Food & Dining");
        assert!(validate_category_name("F").is_err());
        assert!(validate_category_name("Food!").is_err());
        assert!(validate_category_name(&"x".repeat(51)).is_err());
        assert!(check_reserved_category_name("Other").is_err());
        assert!(check_reserved_category_name("Others").is_ok());
    }

    #[test]
    fn test_subcategory_names() {
        assert_eq!(validate_subcategory_name(" Bus ").unwrap(), "Bus");
        assert_eq!(validate_subcategory_name("X").unwrap(), "X");
        // Ampersand is only allowed in category names
        assert!(validate_subcategory_name("Tea & Coffee").is_err());
        assert!(validate_subcategory_name("   ").is_err());
    }

    #[test]
    fn test_colors_and_icons() {
        assert_eq!(validate_color("#f8bbd9").unwrap(), "#f8bbd9");
        assert!(validate_color("pink").is_err());
        assert!(validate_color("#F8BBD").is_err());
        assert_eq!(validate_icon(" 🍽️ ").unwrap(), "🍽️");
        assert!(validate_description(&"d".repeat(201)).is_err());
    }

    #[test]
    fn test_document_ids_stay_within_one_path_segment() {
        assert_eq!(validate_document_id("id", " abc-123 ").unwrap(), "abc-123");
        assert!(validate_document_id("id", "").is_err());
        assert!(validate_document_id("id", "../categories/abc").is_err());
        assert!(validate_document_id("id", "expenses/abc").is_err());
        assert!(validate_document_id("id", "..").is_err());
        assert!(validate_document_id("id", "__name__").is_err());
        assert!(validate_document_id("id", &"a".repeat(1501)).is_err());
    }
}
