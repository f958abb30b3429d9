// Conversion between domain models and Firestore REST typed values
// Document format: {"name": ".../documents/{collection}/{id}", "fields": {"key": {"stringValue": "..."}}}

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use crate::error::{AppError, Result};
use crate::models::{CategoryDB, ExpenseDB, ExpenseUpdate, ExtractionLog, NewExpense, Subcategory};

// Value builders

pub fn string_value(s: &str) -> Value {
    json!({"stringValue": s})
}

pub fn optional_string(s: Option<&str>) -> Value {
    match s {
        Some(s) => string_value(s),
        None => json!({"nullValue": null}),
    }
}

pub fn double_value(f: f64) -> Value {
    json!({"doubleValue": f})
}

pub fn integer_value(i: i64) -> Value {
    // Firestore encodes int64 as a string
    json!({"integerValue": i.to_string()})
}

pub fn bool_value(b: bool) -> Value {
    json!({"booleanValue": b})
}

pub fn timestamp_value(dt: &DateTime<Utc>) -> Value {
    json!({"timestampValue": dt.to_rfc3339_opts(SecondsFormat::Micros, true)})
}

/// Encode arbitrary JSON as a Firestore value
pub fn to_firestore_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({"nullValue": null}),
        Value::Bool(b) => bool_value(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => integer_value(i),
            None => double_value(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => string_value(s),
        Value::Array(items) => json!({
            "arrayValue": {"values": items.iter().map(to_firestore_value).collect::<Vec<_>>()}
        }),
        Value::Object(map) => json!({"mapValue": {"fields": to_firestore_fields(map)}}),
    }
}

pub fn to_firestore_fields(map: &Map<String, Value>) -> Value {
    let fields: Map<String, Value> = map
        .iter()
        .map(|(k, v)| (k.clone(), to_firestore_value(v)))
        .collect();
    Value::Object(fields)
}

/// Decode a Firestore value back into plain JSON
pub fn from_firestore_value(value: &Value) -> Value {
    if let Some(s) = value.get("stringValue") {
        return s.clone();
    }
    if let Some(b) = value.get("booleanValue") {
        return b.clone();
    }
    if let Some(i) = value.get("integerValue") {
        return i
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .map(Value::from)
            .unwrap_or(Value::Null);
    }
    if let Some(d) = value.get("doubleValue") {
        return d.clone();
    }
    if let Some(ts) = value.get("timestampValue") {
        return ts.clone();
    }
    if let Some(array) = value.get("arrayValue") {
        let items = array
            .get("values")
            .and_then(|v| v.as_array())
            .map(|values| values.iter().map(from_firestore_value).collect())
            .unwrap_or_default();
        return Value::Array(items);
    }
    if let Some(map) = value.get("mapValue") {
        let fields = map
            .get("fields")
            .and_then(|f| f.as_object())
            .map(|f| {
                f.iter()
                    .map(|(k, v)| (k.clone(), from_firestore_value(v)))
                    .collect()
            })
            .unwrap_or_default();
        return Value::Object(fields);
    }
    Value::Null
}

// Field readers

pub fn get_string(fields: &Value, key: &str) -> Option<String> {
    fields.get(key)?.get("stringValue")?.as_str().map(|s| s.to_string())
}

/// Numbers written by other clients may come back as integers
pub fn get_f64(fields: &Value, key: &str) -> Option<f64> {
    let value = fields.get(key)?;
    if let Some(d) = value.get("doubleValue").and_then(|v| v.as_f64()) {
        return Some(d);
    }
    value
        .get("integerValue")?
        .as_str()
        .and_then(|s| s.parse::<i64>().ok())
        .map(|i| i as f64)
}

pub fn get_i64(fields: &Value, key: &str) -> Option<i64> {
    fields
        .get(key)?
        .get("integerValue")?
        .as_str()
        .and_then(|s| s.parse().ok())
}

pub fn get_bool(fields: &Value, key: &str) -> Option<bool> {
    fields.get(key)?.get("booleanValue")?.as_bool()
}

pub fn get_timestamp(fields: &Value, key: &str) -> Option<DateTime<Utc>> {
    fields
        .get(key)?
        .get("timestampValue")?
        .as_str()
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn require<T>(value: Option<T>, key: &str) -> Result<T> {
    value.ok_or_else(|| AppError::Store(format!("Missing or invalid field: {}", key)))
}

/// Document id is the last segment of the resource name
pub fn document_id(doc: &Value) -> Result<String> {
    doc.get("name")
        .and_then(|n| n.as_str())
        .and_then(|n| n.rsplit('/').next())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Store("Document has no name".to_string()))
}

fn document_fields(doc: &Value) -> Value {
    doc.get("fields").cloned().unwrap_or_else(|| json!({}))
}

// Expenses

pub fn expense_fields(expense: &NewExpense) -> Value {
    json!({
        "amount": double_value(expense.amount),
        "category": string_value(&expense.category),
        "subcategory": string_value(&expense.subcategory),
        "description": string_value(&expense.description),
        "datetime": timestamp_value(&expense.datetime),
        "provider": string_value(&expense.provider),
        "model": string_value(&expense.model),
        "original_query": string_value(&expense.original_query),
        "created_at": timestamp_value(&expense.created_at),
    })
}

/// Fields and update mask paths for a partial expense update
pub fn expense_update_fields(update: &ExpenseUpdate, now: &DateTime<Utc>) -> (Vec<&'static str>, Value) {
    let mut paths = vec!["updated_at"];
    let mut fields = json!({"updated_at": timestamp_value(now)});

    if let Some(amount) = update.amount {
        paths.push("amount");
        fields["amount"] = double_value(amount);
    }
    if let Some(dt) = &update.datetime {
        paths.push("datetime");
        fields["datetime"] = timestamp_value(dt);
    }

    let strings = [
        ("category", &update.category),
        ("subcategory", &update.subcategory),
        ("description", &update.description),
        ("provider", &update.provider),
        ("model", &update.model),
        ("original_query", &update.original_query),
    ];
    for (path, value) in strings {
        if let Some(v) = value {
            paths.push(path);
            fields[path] = string_value(v);
        }
    }

    (paths, fields)
}

pub fn parse_expense(doc: &Value) -> Result<ExpenseDB> {
    let fields = document_fields(doc);
    let created_at = require(get_timestamp(&fields, "created_at"), "created_at")?;

    Ok(ExpenseDB {
        id: document_id(doc)?,
        amount: require(get_f64(&fields, "amount"), "amount")?,
        category: get_string(&fields, "category").unwrap_or_default(),
        subcategory: get_string(&fields, "subcategory").unwrap_or_default(),
        description: get_string(&fields, "description").unwrap_or_default(),
        datetime: get_timestamp(&fields, "datetime").unwrap_or(created_at),
        provider: get_string(&fields, "provider").unwrap_or_default(),
        model: get_string(&fields, "model").unwrap_or_default(),
        original_query: get_string(&fields, "original_query").unwrap_or_default(),
        created_at,
        updated_at: get_timestamp(&fields, "updated_at"),
    })
}

// Extraction logs

pub fn log_fields(log: &ExtractionLog) -> Result<Value> {
    let extraction = serde_json::to_value(&log.extraction)?;
    Ok(json!({
        "original_query": string_value(&log.original_query),
        "provider": string_value(&log.provider),
        "model": string_value(&log.model),
        "created_at": timestamp_value(&log.created_at),
        "settings_snapshot": {"mapValue": {"fields": to_firestore_fields(&log.settings_snapshot)}},
        "extraction": to_firestore_value(&extraction),
    }))
}

// Categories

fn subcategory_value(sub: &Subcategory) -> Value {
    json!({
        "mapValue": {
            "fields": {
                "name": string_value(&sub.name),
                "description": optional_string(sub.description.as_deref()),
                "created_at": timestamp_value(&sub.created_at),
                "updated_at": timestamp_value(&sub.updated_at),
            }
        }
    })
}

/// `name_lower` backs case-insensitive lookups
pub fn category_fields(category: &CategoryDB) -> Value {
    json!({
        "name": string_value(&category.name),
        "name_lower": string_value(&category.name.to_lowercase()),
        "description": optional_string(category.description.as_deref()),
        "subcategories": {
            "arrayValue": {
                "values": category.subcategories.iter().map(subcategory_value).collect::<Vec<_>>()
            }
        },
        "color": optional_string(category.color.as_deref()),
        "icon": optional_string(category.icon.as_deref()),
        "is_active": bool_value(category.is_active),
        "sort_order": integer_value(category.sort_order),
        "created_at": timestamp_value(&category.created_at),
        "updated_at": timestamp_value(&category.updated_at),
    })
}

fn parse_subcategory(value: &Value, fallback_time: DateTime<Utc>) -> Option<Subcategory> {
    let fields = value.get("mapValue")?.get("fields")?;
    Some(Subcategory {
        name: get_string(fields, "name")?,
        description: get_string(fields, "description"),
        created_at: get_timestamp(fields, "created_at").unwrap_or(fallback_time),
        updated_at: get_timestamp(fields, "updated_at").unwrap_or(fallback_time),
    })
}

pub fn parse_category(doc: &Value) -> Result<CategoryDB> {
    let fields = document_fields(doc);
    let created_at = get_timestamp(&fields, "created_at").unwrap_or_else(Utc::now);

    let subcategories = fields
        .get("subcategories")
        .and_then(|v| v.get("arrayValue"))
        .and_then(|v| v.get("values"))
        .and_then(|v| v.as_array())
        .map(|values| {
            values
                .iter()
                .filter_map(|v| parse_subcategory(v, created_at))
                .collect()
        })
        .unwrap_or_default();

    Ok(CategoryDB {
        id: document_id(doc)?,
        name: require(get_string(&fields, "name"), "name")?,
        description: get_string(&fields, "description"),
        subcategories,
        color: get_string(&fields, "color"),
        icon: get_string(&fields, "icon"),
        is_active: get_bool(&fields, "is_active").unwrap_or(true),
        sort_order: get_i64(&fields, "sort_order").unwrap_or(0),
        created_at,
        updated_at: get_timestamp(&fields, "updated_at").unwrap_or(created_at),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExtractionResult;

    fn ts(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_generic_json_encoding() {
        let encoded = to_firestore_value(&json!({"n": 3, "x": 1.5, "tags": [], "ok": null}));
        let fields = &encoded["mapValue"]["fields"];
        assert_eq!(fields["n"], json!({"integerValue": "3"}));
        assert_eq!(fields["x"], json!({"doubleValue": 1.5}));
        assert_eq!(fields["tags"], json!({"arrayValue": {"values": []}}));
        assert_eq!(fields["ok"], json!({"nullValue": null}));
    }

    #[test]
    fn test_decoding_handles_empty_array_and_nested_maps() {
        let value = json!({"mapValue": {"fields": {
            "a": {"arrayValue": {}},
            "b": {"mapValue": {"fields": {"c": {"integerValue": "7"}}}}
        }}});
        assert_eq!(from_firestore_value(&value), json!({"a": [], "b": {"c": 7}}));
    }

    #[test]
    fn test_parse_expense_document() {
        let doc = json!({
            "name": "projects/p/databases/(default)/documents/expenses/exp-1",
            "fields": {
                "amount": {"integerValue": "15"},
                "category": {"stringValue": "Transportation"},
                "subcategory": {"stringValue": "Bus"},
                "description": {"stringValue": "kaale bus ma 15 rupiya"},
                "datetime": {"timestampValue": "2024-03-09T07:00:00Z"},
                "provider": {"stringValue": "gemini"},
                "model": {"stringValue": "gemini-1.5-flash"},
                "original_query": {"stringValue": "kaale bus ma 15 rupiya"},
                "created_at": {"timestampValue": "2024-03-10T07:00:00.123456Z"}
            }
        });

        let expense = parse_expense(&doc).unwrap();
        assert_eq!(expense.id, "exp-1");
        assert_eq!(expense.amount, 15.0);
        assert_eq!(expense.datetime, ts("2024-03-09T07:00:00Z"));
        assert!(expense.updated_at.is_none());
    }

    #[test]
    fn test_parse_expense_without_amount_fails() {
        let doc = json!({
            "name": "x/expenses/exp-2",
            "fields": {"created_at": {"timestampValue": "2024-03-10T07:00:00Z"}}
        });
        assert!(parse_expense(&doc).is_err());
    }

    #[test]
    fn test_update_mask_lists_only_present_fields() {
        let update = ExpenseUpdate {
            amount: Some(42.5),
            subcategory: Some("Taxi".to_string()),
            ..Default::default()
        };
        let (paths, fields) = expense_update_fields(&update, &Utc::now());

        assert_eq!(paths, vec!["updated_at", "amount", "subcategory"]);
        assert_eq!(fields["amount"], json!({"doubleValue": 42.5}));
        assert!(fields.get("category").is_none());
    }

    #[test]
    fn test_category_fields_parse_back() {
        let now = ts("2024-01-01T00:00:00Z");
        let category = CategoryDB {
            id: "cat-1".to_string(),
            name: "Food & Dining".to_string(),
            description: None,
            subcategories: vec![Subcategory {
                name: "Snacks".to_string(),
                description: Some("Light snacks and beverages".to_string()),
                created_at: now,
                updated_at: now,
            }],
            color: Some("#FF6B6B".to_string()),
            icon: Some("🍽️".to_string()),
            is_active: true,
            sort_order: 1,
            created_at: now,
            updated_at: now,
        };

        let fields = category_fields(&category);
        assert_eq!(fields["name_lower"], json!({"stringValue": "food & dining"}));

        let doc = json!({"name": "x/categories/cat-1", "fields": fields});
        assert_eq!(parse_category(&doc).unwrap(), category);
    }

    #[test]
    fn test_log_fields_keep_extraction_and_snapshot() {
        let log = ExtractionLog {
            original_query: "chai 10".to_string(),
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            created_at: Utc::now(),
            settings_snapshot: json!({"provider": "openai"}).as_object().unwrap().clone(),
            extraction: ExtractionResult::failed("openai", "gpt-4o", "boom"),
        };

        let fields = log_fields(&log).unwrap();
        assert_eq!(
            fields["settings_snapshot"]["mapValue"]["fields"]["provider"],
            json!({"stringValue": "openai"})
        );
        assert_eq!(
            fields["extraction"]["mapValue"]["fields"]["error"],
            json!({"stringValue": "boom"})
        );
        assert_eq!(
            fields["extraction"]["mapValue"]["fields"]["valid"],
            json!({"booleanValue": false})
        );
    }
}
