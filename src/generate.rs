//! Topic-to-prompt generation.
//!
//! One LLM call per topic line, asking for three varied candidate prompts in
//! a fenced JSON object. Malformed output degrades to an error record for
//! that topic; the batch continues.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifacts::{self, ArtifactError};
use crate::extract;
use crate::gateway::{Attribution, ChatGateway, ChatRequest, ProviderError};
use crate::prompts;

/// Generated candidates for one topic, or the failure that replaced them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PromptRecord {
    Generated {
        topic: String,
        prompt_1: String,
        prompt_2: String,
        prompt_3: String,
    },
    Failed {
        topic: String,
        error: String,
    },
}

impl PromptRecord {
    pub fn topic(&self) -> &str {
        match self {
            PromptRecord::Generated { topic, .. } => topic,
            PromptRecord::Failed { topic, .. } => topic,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PromptRecord::Failed { .. })
    }
}

/// The shape the generator model is instructed to emit.
#[derive(Debug, Deserialize)]
struct CandidatePrompts {
    prompt_1: String,
    prompt_2: String,
    prompt_3: String,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("failed to read topics {path}: {source}")]
    Topics {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Generate three candidate prompts per topic line and write the record list
/// to `output_path`.
pub async fn generate_prompts(
    gateway: &dyn ChatGateway,
    model: &str,
    topics_path: &Path,
    output_path: &Path,
) -> Result<Vec<PromptRecord>, GenerateError> {
    let topics = std::fs::read_to_string(topics_path).map_err(|source| GenerateError::Topics {
        path: topics_path.to_path_buf(),
        source,
    })?;

    let mut records = Vec::new();
    for topic in topics.lines().map(str::trim).filter(|t| !t.is_empty()) {
        tracing::info!(topic, "generating candidate prompts");
        let req = ChatRequest::new(
            model,
            prompts::generation_messages(topic),
            Attribution::new("generate"),
        );
        let resp = gateway.chat(req).await?;
        records.push(record_from_output(topic, &resp.content));
    }

    artifacts::write_json_pretty(output_path, &records)?;
    Ok(records)
}

/// Parse one model output into a record, degrading to `Failed` on any
/// malformed output.
fn record_from_output(topic: &str, raw: &str) -> PromptRecord {
    let Some(json) = extract::fenced_json_object(raw) else {
        tracing::warn!(topic, "no JSON object found enclosed in ```json ... ```");
        return PromptRecord::Failed {
            topic: topic.to_string(),
            error: "No JSON output provided".to_string(),
        };
    };
    match serde_json::from_str::<CandidatePrompts>(json) {
        Ok(candidates) => PromptRecord::Generated {
            topic: topic.to_string(),
            prompt_1: candidates.prompt_1,
            prompt_2: candidates.prompt_2,
            prompt_3: candidates.prompt_3,
        },
        Err(err) => {
            tracing::warn!(topic, error = %err, "candidate prompt JSON failed to parse");
            PromptRecord::Failed {
                topic: topic.to_string(),
                error: err.to_string(),
            }
        }
    }
}
