use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Characters of page text fed to the clean/summarize prompt.
pub const PROCESS_PAGE_MAX_CHARS: usize = 15_000;
/// Characters of page text fed to the action finder prompt.
pub const FIND_ACTION_MAX_CHARS: usize = 10_000;
/// Clickable element labels included as action finder context.
pub const MAX_CLICKABLE_ELEMENTS: usize = 20;
pub const SUMMARY_POINTS: usize = 3;

/// Page text sent by the extension for the Clean View and TL;DR.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageContent {
    pub url: String,
    pub text_content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionFinderInput {
    pub url: String,
    pub text_content: String,
    #[serde(default)]
    pub clickable_elements: Option<Vec<String>>,
}

/// Labels of the clickable elements found on a page. Returned indices
/// refer to this ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterInput {
    pub labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub summary_points: Vec<String>,
    pub clean_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResult {
    pub recommended_action: String,
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    pub valid_indices: Vec<usize>,
}

/// A result type the model must produce as constrained JSON.
///
/// `response_schema` is handed to the provider; `validate` re-checks the
/// parts of the contract that deserialization alone cannot express.
pub trait StructuredOutput: DeserializeOwned {
    fn response_schema() -> Value;

    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl StructuredOutput for SummaryResult {
    fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "summary_points": {
                    "type": "ARRAY",
                    "items": { "type": "STRING" },
                    "minItems": SUMMARY_POINTS,
                    "maxItems": SUMMARY_POINTS
                },
                "clean_text": { "type": "STRING" }
            },
            "required": ["summary_points", "clean_text"]
        })
    }

    fn validate(&self) -> Result<(), String> {
        if self.summary_points.len() != SUMMARY_POINTS {
            return Err(format!(
                "expected {} summary points, got {}",
                SUMMARY_POINTS,
                self.summary_points.len()
            ));
        }
        Ok(())
    }
}

impl StructuredOutput for ActionResult {
    fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "recommended_action": { "type": "STRING" },
                "reasoning": { "type": "STRING" }
            },
            "required": ["recommended_action", "reasoning"]
        })
    }
}

impl StructuredOutput for FilterResult {
    fn response_schema() -> Value {
        json!({
            "type": "OBJECT",
            "properties": {
                "valid_indices": {
                    "type": "ARRAY",
                    "items": { "type": "INTEGER" }
                }
            },
            "required": ["valid_indices"]
        })
    }
}

impl FilterResult {
    /// Every index must point into a label list of length `len`.
    pub fn check_bounds(&self, len: usize) -> Result<(), String> {
        match self.valid_indices.iter().find(|&&i| i >= len) {
            Some(i) => Err(format!(
                "index {} out of range for {} labels",
                i, len
            )),
            None => Ok(()),
        }
    }
}

/// First `max_chars` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
