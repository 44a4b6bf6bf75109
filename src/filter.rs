//! Prompt filtering: reduce three candidates per topic down to one.
//!
//! A single LLM call receives the entire generated-prompts file and returns
//! a fenced JSON array. The array is written through as-is — the shape of
//! its elements is the model's responsibility, not schema-enforced here.
//!
//! Unlike generation, a malformed reply writes nothing: the output file is
//! left untouched and the failure is only logged. See DESIGN.md.

use std::path::Path;

use thiserror::Error;

use crate::artifacts::{self, ArtifactError};
use crate::extract;
use crate::gateway::{Attribution, ChatGateway, ChatRequest, ProviderError};
use crate::prompts;

/// What the filter call did to the output file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOutcome {
    /// The reduced array was written, with this many records.
    Written { records: usize },
    /// The model reply was unusable; the output file was not modified.
    LeftUntouched,
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Reduce the generated-prompts file to one prompt per topic.
pub async fn filter_prompts(
    gateway: &dyn ChatGateway,
    model: &str,
    input_path: &Path,
    output_path: &Path,
) -> Result<FilterOutcome, FilterError> {
    let file_content = artifacts::read_to_string(input_path)?;
    let file_name = input_path.display().to_string();

    let req = ChatRequest::new(
        model,
        prompts::filter_messages(&file_name, &file_content),
        Attribution::new("filter"),
    );
    let resp = gateway.chat(req).await?;

    let Some(json) = extract::fenced_json_array(&resp.content) else {
        tracing::warn!("no JSON array found enclosed in ```json ... ```, output left untouched");
        return Ok(FilterOutcome::LeftUntouched);
    };

    match serde_json::from_str::<Vec<serde_json::Value>>(json) {
        Ok(records) => {
            artifacts::write_json_pretty(output_path, &records)?;
            Ok(FilterOutcome::Written {
                records: records.len(),
            })
        }
        Err(err) => {
            tracing::warn!(error = %err, "filtered prompt JSON failed to parse, output left untouched");
            Ok(FilterOutcome::LeftUntouched)
        }
    }
}
