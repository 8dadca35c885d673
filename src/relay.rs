//! The three relay operations. Each builds a prompt, asks the [`Brain`] for a
//! schema-constrained completion and checks the reply against its typed
//! result before handing it back.

use std::sync::Arc;

use serde_json::Value;
use tracing::info;

use crate::brain::{Brain, BrainError, Generation};
use crate::error::{ApiError, Operation};
use crate::prompts;
use crate::types::{
    ActionFinderInput, ActionResult, FilterInput, FilterResult, PageContent, StructuredOutput,
    SummaryResult,
};

#[derive(Clone)]
pub struct Relay {
    brain: Arc<dyn Brain>,
    model: String,
}

impl Relay {
    pub fn new(brain: Arc<dyn Brain>, model: impl Into<String>) -> Self {
        Self {
            brain,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub async fn process_page(&self, page: PageContent) -> Result<SummaryResult, ApiError> {
        info!(url = %page.url, chars = page.text_content.chars().count(), "process page");
        let prompt = prompts::process_page_prompt(&page);
        self.generate(&prompt)
            .await
            .map_err(|e| ApiError::new(Operation::ProcessPage, e))
    }

    pub async fn find_action(&self, input: ActionFinderInput) -> Result<ActionResult, ApiError> {
        info!(
            url = %input.url,
            clickable = input.clickable_elements.as_ref().map_or(0, Vec::len),
            "find action"
        );
        let prompt = prompts::find_action_prompt(&input);
        self.generate(&prompt)
            .await
            .map_err(|e| ApiError::new(Operation::FindAction, e))
    }

    pub async fn filter_actions(&self, input: FilterInput) -> Result<FilterResult, ApiError> {
        info!(labels = input.labels.len(), "filter actions");
        if input.labels.is_empty() {
            return Ok(FilterResult {
                valid_indices: Vec::new(),
            });
        }

        let prompt = prompts::filter_actions_prompt(&input.labels);
        let result: FilterResult = self
            .generate(&prompt)
            .await
            .map_err(|e| ApiError::new(Operation::FilterActions, e))?;

        result.check_bounds(input.labels.len()).map_err(|msg| {
            ApiError::new(Operation::FilterActions, BrainError::Contract(msg))
        })?;
        Ok(result)
    }

    async fn generate<T: StructuredOutput>(&self, prompt: &str) -> Result<T, BrainError> {
        let schema = T::response_schema();
        let raw: Value = self
            .brain
            .generate_structured(Generation {
                model: &self.model,
                prompt,
                schema: &schema,
            })
            .await?;

        let parsed: T = serde_json::from_value(raw)?;
        parsed.validate().map_err(BrainError::Contract)?;
        Ok(parsed)
    }
}
