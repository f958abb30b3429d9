// Prompt templates for expense extraction and transcription

use crate::models::CategoryDB;

/// Used when categories cannot be loaded from the store
pub const FALLBACK_CATEGORIES_BLOCK: &str = "- Food: Snacks, Breakfast, Lunch, Dinner\n- Transportation: Bus, Taxi, Train\n- Utilities: Electricity, Water, Internet";

pub const TRANSCRIPTION_PROMPT: &str = "You are a speech-to-text assistant. Transcribe the following audio to plain text. \
Preserve numerals and currency values. Support Gujarati-English mixed speech (Gujlish). \
Return only the transcription without any extra commentary.";

/// Placeholders: {now_iso}, {categories_block}, {text}
pub const EXTRACTION_PROMPT: &str = r#"You are a careful information extractor. Extract expense info from Gujlish (Gujarati+English, incl. WhatsApp-style slang). Keep description exactly as written.

Current time (IST, ISO8601 with timezone): {now_iso}. Use this to resolve relative words like 'today/yesterday/tomorrow' and Gujarati words like 'aaje' (today) and 'kaale' (yesterday or tomorrow based on context). If ambiguous, assume 'kaale' means the most recent past unless the text clearly indicates future.

Allowed categories and subcategories (choose only from these; pick the closest match):
{categories_block}

Extraction rules:
- amount: numeric value only. Recognize 'rs', 'rupiya', 'rupees', '₹', and patterns like '20rs', '20 rs', '₹20', '20 rupiya', '20 na'.
- Gujarati snack terms map to subcategory 'Snacks' under 'Food' when appropriate (e.g., 'padika/padikaa/padika', 'nashto', 'farsan/farshan', 'fafda', 'gathiya').
- description: ORIGINAL TEXT EXACTLY AS WRITTEN (no translation).
- datetime: Return ISO8601 string with timezone if present in text; if not specified, use current IST time. If text includes relative time, resolve using the provided current time.
- category/subcategory: choose exactly one each from the allowed lists. If none fits, set null and add the field name to missing_fields.
- Only return JSON. No extra text, no code fences.

Output JSON schema:
{"valid": boolean, "amount": number|null, "category": string|null, "subcategory": string|null, "description": string, "datetime": string, "missing_fields": []}

Examples:
Input: '20rs na padika' -> {"valid": true, "amount": 20, "category": "Food", "subcategory": "Snacks", "description": "20rs na padika", "datetime": "{now_iso}", "missing_fields": []}
Input: 'kaale bus ma 15 rupiya' -> amount 15, category 'Transportation', subcategory 'Bus', datetime resolved to yesterday based on current time.

Input: {text}"#;

/// One line per category: "- Name: Sub1, Sub2" ("None" when it has no subcategories)
pub fn format_categories_block(categories: &[CategoryDB]) -> String {
    categories
        .iter()
        .map(|cat| {
            let subs = if cat.subcategories.is_empty() {
                "None".to_string()
            } else {
                cat.subcategory_names().join(", ")
            };
            format!("- {}: {}", cat.name, subs)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Fill the extraction template. User text goes in last so braces in it are left alone.
pub fn build_extraction_prompt(text: &str, now_iso: &str, categories_block: &str) -> String {
    EXTRACTION_PROMPT
        .replace("{now_iso}", now_iso)
        .replace("{categories_block}", categories_block)
        .replace("{text}", text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Subcategory;
    use chrono::Utc;

    fn category(name: &str, subs: &[&str]) -> CategoryDB {
        let now = Utc::now();
        CategoryDB {
            id: name.to_lowercase(),
            name: name.to_string(),
            description: None,
            subcategories: subs
                .iter()
                .map(|s| Subcategory::new(s.to_string(), None))
                .collect(),
            color: None,
            icon: None,
            is_active: true,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_categories_block_format() {
        let block = format_categories_block(&[
            category("Transportation", &["Bus", "Taxi"]),
            category("Gifts", &[]),
        ]);
        assert_eq!(block, "- Transportation: Bus, Taxi\n- Gifts: None");
    }

    #[test]
    fn test_prompt_substitution() {
        let prompt = build_extraction_prompt(
            "20rs na padika {now_iso}",
            "2024-03-10T12:30:00+05:30",
            FALLBACK_CATEGORIES_BLOCK,
        );

        assert!(prompt.contains("Current time (IST, ISO8601 with timezone): 2024-03-10T12:30:00+05:30."));
        assert!(prompt.contains("\"datetime\": \"2024-03-10T12:30:00+05:30\""));
        assert!(prompt.contains("- Transportation: Bus, Taxi, Train"));
        // Placeholders inside user text are not expanded
        assert!(prompt.ends_with("Input: 20rs na padika {now_iso}"));
        assert!(!prompt.contains("{categories_block}"));
    }
}
