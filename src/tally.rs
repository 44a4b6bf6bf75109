//! Score tally over the evaluation artifact.
//!
//! Computes the yes-rate per rubric question across all records and
//! optionally writes a flat per-prompt 0/1 table. Unlike the LLM-facing
//! stages there is no degraded path here: a record without a four-element
//! `evaluation` array is a hard error.

use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

use crate::artifacts::{self, ArtifactError};

/// Number of rubric questions.
pub const QUESTIONS: usize = 4;

/// Per-question yes-rates over the whole artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct TallySummary {
    /// Number of records tallied.
    pub items: usize,
    /// Yes-rate per question, in rubric order.
    pub scores: [f64; QUESTIONS],
}

#[derive(Debug, Error)]
pub enum TallyError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error("malformed evaluation record {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
    #[error("failed to write score table {path}: {message}")]
    Csv { path: PathBuf, message: String },
}

/// Tally the evaluation artifact; optionally write the per-prompt CSV table.
pub fn tally_results(
    input_path: &Path,
    output_csv: Option<&Path>,
) -> Result<TallySummary, TallyError> {
    let records: Vec<Value> = artifacts::read_json(input_path)?;

    let mut rows: Vec<(String, [u8; QUESTIONS])> = Vec::with_capacity(records.len());
    for (index, record) in records.iter().enumerate() {
        rows.push(score_record(index, record)?);
    }

    if let Some(path) = output_csv {
        write_score_table(path, &rows)?;
    }

    let items = rows.len();
    let mut scores = [0.0; QUESTIONS];
    for (_, marks) in &rows {
        for (i, mark) in marks.iter().enumerate() {
            scores[i] += f64::from(*mark);
        }
    }
    for score in &mut scores {
        *score /= items as f64;
    }

    Ok(TallySummary { items, scores })
}

/// Reduce one record to its prompt and four 0/1 marks.
fn score_record(index: usize, record: &Value) -> Result<(String, [u8; QUESTIONS]), TallyError> {
    let malformed = |reason: &str| TallyError::MalformedRecord {
        index,
        reason: reason.to_string(),
    };

    let prompt = record
        .get("prompt")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("missing 'prompt'"))?
        .to_string();
    let evaluation = record
        .get("evaluation")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed("missing 'evaluation' array"))?;
    if evaluation.len() < QUESTIONS {
        return Err(malformed(&format!(
            "evaluation has {} items, expected {QUESTIONS}",
            evaluation.len()
        )));
    }

    let mut marks = [0u8; QUESTIONS];
    for (i, mark) in marks.iter_mut().enumerate() {
        let answer = evaluation[i]
            .get("answer")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed(&format!("evaluation[{i}] missing 'answer'")))?;
        *mark = u8::from(answer.eq_ignore_ascii_case("yes"));
    }
    Ok((prompt, marks))
}

fn write_score_table(path: &Path, rows: &[(String, [u8; QUESTIONS])]) -> Result<(), TallyError> {
    let csv_err = |message: String| TallyError::Csv {
        path: path.to_path_buf(),
        message,
    };
    let mut writer = csv::Writer::from_path(path).map_err(|e| csv_err(e.to_string()))?;
    writer
        .write_record(["prompt", "q1", "q2", "q3", "q4"])
        .map_err(|e| csv_err(e.to_string()))?;
    for (prompt, marks) in rows {
        let record = [
            prompt.clone(),
            marks[0].to_string(),
            marks[1].to_string(),
            marks[2].to_string(),
            marks[3].to_string(),
        ];
        writer.write_record(&record).map_err(|e| csv_err(e.to_string()))?;
    }
    writer.flush().map_err(|e| csv_err(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::write_json_pretty;

    fn record(prompt: &str, answers: [&str; 4]) -> Value {
        serde_json::json!({
            "prompt": prompt,
            "response": "r",
            "evaluation": answers.iter().enumerate().map(|(i, a)| {
                serde_json::json!({"question": (i + 1).to_string(), "answer": a, "justification": ""})
            }).collect::<Vec<_>>(),
        })
    }

    fn tally(records: &[Value], csv: Option<&Path>) -> Result<TallySummary, TallyError> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("evaluation.json");
        write_json_pretty(&path, &records).unwrap();
        tally_results(&path, csv)
    }

    #[test]
    fn all_yes_scores_one_for_every_question() {
        let records = vec![
            record("a", ["yes", "yes", "yes", "yes"]),
            record("b", ["YES", "Yes", "yes", "yes"]),
        ];
        let summary = tally(&records, None).unwrap();
        assert_eq!(summary.items, 2);
        for score in summary.scores {
            assert!((score - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn half_yes_scores_point_five_for_that_question() {
        let records = vec![
            record("a", ["yes", "yes", "no", "yes"]),
            record("b", ["yes", "no", "no", "yes"]),
        ];
        let summary = tally(&records, None).unwrap();
        assert!((summary.scores[0] - 1.0).abs() < 1e-12);
        assert!((summary.scores[1] - 0.5).abs() < 1e-12);
        assert!((summary.scores[2] - 0.0).abs() < 1e-12);
    }

    #[test]
    fn error_record_is_a_hard_failure() {
        let records = vec![
            record("a", ["yes", "yes", "yes", "yes"]),
            serde_json::json!({"prompt": "b", "response": "r", "error": "No evaluation found"}),
        ];
        let err = tally(&records, None).unwrap_err();
        assert!(matches!(
            err,
            TallyError::MalformedRecord { index: 1, .. }
        ));
    }

    #[test]
    fn short_evaluation_array_is_a_hard_failure() {
        let mut bad = record("a", ["yes", "yes", "yes", "yes"]);
        bad["evaluation"].as_array_mut().unwrap().pop();
        let err = tally(&[bad], None).unwrap_err();
        assert!(matches!(err, TallyError::MalformedRecord { .. }));
    }

    #[test]
    fn writes_flat_zero_one_table() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("scores.csv");
        let records = vec![record("EMS data", ["yes", "no", "yes", "yes"])];
        tally(&records, Some(&csv_path)).unwrap();

        let table = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = table.lines();
        assert_eq!(lines.next(), Some("prompt,q1,q2,q3,q4"));
        assert_eq!(lines.next(), Some("EMS data,1,0,1,1"));
    }
}
