//! Prompt execution against the assistant under evaluation.
//!
//! Each filtered prompt is sent to the assistant model with the metadata
//! catalog attached. The user-visible answer is whatever follows the
//! `</think>` reasoning marker; a call failure stores the error's message
//! string as the response so the transcript stays serializable.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::artifacts::{self, ArtifactError};
use crate::extract;
use crate::gateway::{Attribution, ChatGateway, ChatRequest};
use crate::prompts;
use crate::transcript::{self, TranscriptEntry};

/// Sentinel stored when the model output carries no `</think>` marker.
pub const NO_RESPONSE_SENTINEL: &str = "No response found";

/// One record of the filtered-prompts artifact. Only `prompt` is required;
/// a record without it is a hard error (the filter stage does not enforce
/// the shape, so this is where it surfaces).
#[derive(Debug, Clone, Deserialize)]
pub struct FilteredPrompt {
    #[serde(default)]
    pub topic: Option<String>,
    pub prompt: String,
}

#[derive(Debug, Error)]
pub enum ExecuteError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("failed to write transcript {path}: {source}")]
    Transcript {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Run every filtered prompt against the assistant and write the transcript.
pub async fn run_prompts(
    gateway: &dyn ChatGateway,
    model: &str,
    prompts_path: &Path,
    transcript_path: &Path,
    metadata_json: &str,
) -> Result<Vec<TranscriptEntry>, ExecuteError> {
    let filtered: Vec<FilteredPrompt> = artifacts::read_json(prompts_path)?;

    let mut entries = Vec::with_capacity(filtered.len());
    for record in &filtered {
        tracing::info!(prompt = %record.prompt, "querying assistant");
        let req = ChatRequest::new(
            model,
            prompts::assistant_messages(&record.prompt, metadata_json),
            Attribution::new("execute"),
        );
        let response = match gateway.chat(req).await {
            Ok(resp) => answer_segment(&resp.content),
            // The error's message, never the error value, goes in the record.
            Err(err) => err.to_string(),
        };
        entries.push(TranscriptEntry::new(record.prompt.clone(), response));
    }

    transcript::write_transcript(transcript_path, &entries).map_err(|source| {
        ExecuteError::Transcript {
            path: transcript_path.to_path_buf(),
            source,
        }
    })?;
    Ok(entries)
}

/// The user-visible answer after the reasoning marker, or the sentinel.
fn answer_segment(raw: &str) -> String {
    match extract::after_think(raw) {
        Some(answer) => answer.to_string(),
        None => NO_RESPONSE_SENTINEL.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_is_post_think_segment() {
        let raw = "<think>checking the catalog</think>\nMeasure OD-2 covers EMS runs.";
        assert_eq!(answer_segment(raw), "Measure OD-2 covers EMS runs.");
    }

    #[test]
    fn missing_marker_yields_sentinel() {
        assert_eq!(answer_segment("bare answer, no marker"), NO_RESPONSE_SENTINEL);
    }

    #[test]
    fn filtered_prompt_requires_prompt_field() {
        let ok: FilteredPrompt =
            serde_json::from_str(r#"{"topic": "EMS", "prompt": "EMS data"}"#).unwrap();
        assert_eq!(ok.prompt, "EMS data");
        assert_eq!(ok.topic.as_deref(), Some("EMS"));

        let missing = serde_json::from_str::<FilteredPrompt>(r#"{"topic": "EMS"}"#);
        assert!(missing.is_err());
    }
}
