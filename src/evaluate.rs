//! Rubric evaluation of transcript pairs via a judge model.
//!
//! Every prompt/response pair is judged against the fixed four-question
//! rubric with the metadata catalog attached. Any failure along the way
//! (no reasoning marker, no fence, bad JSON, call error) degrades to an
//! error-carrying record; the batch never aborts on one item.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::artifacts::{self, ArtifactError};
use crate::extract;
use crate::gateway::{Attribution, ChatGateway, ChatRequest};
use crate::prompts;
use crate::transcript::{TranscriptEntry, TranscriptReader};

/// One judged rubric question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EvaluationItem {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub justification: String,
}

/// Judge output for one pair, or the failure that replaced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EvaluationRecord {
    Evaluated {
        prompt: String,
        response: String,
        evaluation: Vec<EvaluationItem>,
    },
    Failed {
        prompt: String,
        response: String,
        error: String,
    },
}

impl EvaluationRecord {
    fn failed(pair: &TranscriptEntry, error: impl Into<String>) -> Self {
        EvaluationRecord::Failed {
            prompt: pair.prompt.clone(),
            response: pair.response.clone(),
            error: error.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EvaluateError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Judge every pair in the transcript and write the record list.
///
/// A missing transcript is logged and produces an empty record list rather
/// than an error.
pub async fn evaluate_prompts(
    gateway: &dyn ChatGateway,
    model: &str,
    transcript_path: &Path,
    output_path: &Path,
    metadata_json: &str,
) -> Result<Vec<EvaluationRecord>, EvaluateError> {
    let pairs: Vec<TranscriptEntry> = match TranscriptReader::open(transcript_path) {
        Ok(reader) => reader.collect(),
        Err(err) => {
            tracing::warn!(path = %transcript_path.display(), error = %err, "transcript not readable");
            Vec::new()
        }
    };

    let records = evaluate_pairs(gateway, model, &pairs, metadata_json).await;
    artifacts::write_json_pretty(output_path, &records)?;
    Ok(records)
}

/// Judge already-parsed pairs.
pub async fn evaluate_pairs(
    gateway: &dyn ChatGateway,
    model: &str,
    pairs: &[TranscriptEntry],
    metadata_json: &str,
) -> Vec<EvaluationRecord> {
    let mut records = Vec::with_capacity(pairs.len());
    for pair in pairs {
        tracing::info!(prompt = %pair.prompt, "judging response");
        let req = ChatRequest::new(
            model,
            prompts::judge_messages(&pair.prompt, &pair.response, metadata_json),
            Attribution::new("evaluate::judge"),
        );
        let record = match gateway.chat(req).await {
            Ok(resp) => record_from_output(pair, &resp.content),
            Err(err) => EvaluationRecord::failed(pair, err.to_string()),
        };
        records.push(record);
    }
    records
}

fn record_from_output(pair: &TranscriptEntry, raw: &str) -> EvaluationRecord {
    let Some(evaluation) = extract::after_think(raw) else {
        return EvaluationRecord::failed(pair, "No evaluation found");
    };
    let Some(json) = extract::fenced_json_array(evaluation) else {
        return EvaluationRecord::failed(
            pair,
            "No JSON object found enclosed in ```json ... ```",
        );
    };
    match serde_json::from_str::<Vec<EvaluationItem>>(json) {
        Ok(evaluation) => EvaluationRecord::Evaluated {
            prompt: pair.prompt.clone(),
            response: pair.response.clone(),
            evaluation,
        },
        Err(err) => EvaluationRecord::failed(pair, err.to_string()),
    }
}
