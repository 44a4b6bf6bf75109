//! Inter-rater agreement over the review ratings sheet.
//!
//! The sheet has one row per judged prompt and one column per rater and
//! question, named `<RATER>-<question>` (e.g. `DRH-1`, `ADM-3`). Fleiss'
//! kappa runs per question across every rater column with that suffix;
//! Cohen's kappa runs pairwise between two named rater columns.
//!
//! Both coefficients are computed in closed form here. When chance
//! agreement is 1 (every rater uses one category for every item) the
//! result is NaN, passed through rather than special-cased.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Question-column suffixes, in rubric order.
pub const QUESTION_SUFFIXES: [&str; 4] = ["-1", "-2", "-3", "-4"];

/// Rating categories considered for Fleiss' kappa. Items carrying any other
/// value are excluded from the count matrix.
const CATEGORIES: [&str; 2] = ["yes", "no"];

#[derive(Debug, Error)]
pub enum AgreementError {
    #[error("failed to read ratings {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid ratings CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },
}

/// The ratings sheet held as columns of optional cells (blank = missing).
#[derive(Debug, Clone)]
pub struct RatingsTable {
    headers: Vec<String>,
    rows: Vec<Vec<Option<String>>>,
}

impl RatingsTable {
    /// Load from a single-sheet CSV. Blank cells become missing values.
    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, AgreementError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|source| AgreementError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut rdr = csv::Reader::from_reader(file);
        let csv_err = |message: String| AgreementError::Csv {
            path: path.to_path_buf(),
            message,
        };

        let headers = rdr
            .headers()
            .map_err(|e| csv_err(e.to_string()))?
            .iter()
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows = Vec::new();
        for record in rdr.records() {
            let record = record.map_err(|e| csv_err(e.to_string()))?;
            let row = (0..headers.len())
                .map(|i| {
                    record
                        .get(i)
                        .map(str::trim)
                        .filter(|cell| !cell.is_empty())
                        .map(str::to_string)
                })
                .collect();
            rows.push(row);
        }

        Ok(Self { headers, rows })
    }

    #[cfg(test)]
    fn from_parts(headers: Vec<&str>, rows: Vec<Vec<Option<&str>>>) -> Self {
        Self {
            headers: headers.into_iter().map(str::to_string).collect(),
            rows: rows
                .into_iter()
                .map(|r| r.into_iter().map(|c| c.map(str::to_string)).collect())
                .collect(),
        }
    }

    /// Drop non-rater columns (e.g. the prompt text, or a rater under test).
    pub fn drop_columns(&mut self, names: &[String]) {
        let keep: Vec<usize> = (0..self.headers.len())
            .filter(|&i| !names.contains(&self.headers[i]))
            .collect();
        self.headers = keep.iter().map(|&i| self.headers[i].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|&i| row[i].take()).collect();
        }
    }

    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn columns_with_suffix(&self, suffix: &str) -> Vec<usize> {
        (0..self.headers.len())
            .filter(|&i| self.headers[i].ends_with(suffix))
            .collect()
    }
}

/// Fleiss' kappa across every rater column ending in `suffix`.
///
/// Returns `None` (with a logged reason) when fewer than 2 rater columns
/// match or fewer than 2 usable items remain; returns NaN when chance
/// agreement is 1.
pub fn fleiss_kappa(table: &RatingsTable, suffix: &str) -> Option<f64> {
    let cols = table.columns_with_suffix(suffix);
    if cols.is_empty() {
        tracing::info!(suffix, "no rater columns found");
        return None;
    }
    if cols.len() < 2 {
        tracing::info!(suffix, raters = cols.len(), "kappa requires at least 2 raters");
        return None;
    }
    let n_raters = cols.len();

    // Per-item category counts over rows rated by everyone, restricted to
    // items whose ratings all fall in the known categories.
    let mut counts: Vec<[usize; 2]> = Vec::new();
    for row in &table.rows {
        let ratings: Vec<&str> = cols
            .iter()
            .filter_map(|&i| row[i].as_deref())
            .collect();
        if ratings.len() < n_raters {
            continue;
        }
        let mut item = [0usize; 2];
        for rating in &ratings {
            let lower = rating.to_lowercase();
            if let Some(j) = CATEGORIES.iter().position(|&c| c == lower) {
                item[j] += 1;
            }
        }
        if item.iter().sum::<usize>() == n_raters {
            counts.push(item);
        }
    }

    if counts.len() < 2 {
        tracing::info!(
            suffix,
            items = counts.len(),
            "fewer than 2 usable items, kappa skipped"
        );
        return None;
    }

    let n_items = counts.len() as f64;
    let n = n_raters as f64;

    // Chance agreement from the marginal category proportions.
    let mut p_j = [0.0f64; 2];
    for item in &counts {
        for (j, &c) in item.iter().enumerate() {
            p_j[j] += c as f64;
        }
    }
    for p in &mut p_j {
        *p /= n_items * n;
    }
    let p_e: f64 = p_j.iter().map(|p| p * p).sum();

    // Observed agreement averaged over items.
    let p_bar: f64 = counts
        .iter()
        .map(|item| {
            let sq: f64 = item.iter().map(|&c| (c * c) as f64).sum();
            (sq - n) / (n * (n - 1.0))
        })
        .sum::<f64>()
        / n_items;

    Some((p_bar - p_e) / (1.0 - p_e))
}

/// Fleiss' kappa for each rubric question, by column suffix.
pub fn fleiss_kappa_per_question(table: &RatingsTable) -> [Option<f64>; 4] {
    QUESTION_SUFFIXES.map(|suffix| fleiss_kappa(table, suffix))
}

/// Cohen's kappa between two named rater columns.
///
/// Rows missing either rating are dropped; ratings are lowercased. Returns
/// `None` with a warning when a column is absent or fewer than 2 jointly
/// rated rows remain.
pub fn cohens_kappa(table: &RatingsTable, rater1: &str, rater2: &str) -> Option<f64> {
    let (Some(c1), Some(c2)) = (table.column(rater1), table.column(rater2)) else {
        tracing::warn!(rater1, rater2, "one or both rater columns not found");
        return None;
    };

    let pairs: Vec<(String, String)> = table
        .rows
        .iter()
        .filter_map(|row| match (&row[c1], &row[c2]) {
            (Some(a), Some(b)) => Some((a.to_lowercase(), b.to_lowercase())),
            _ => None,
        })
        .collect();

    if pairs.len() < 2 {
        tracing::warn!(
            rater1,
            rater2,
            rows = pairs.len(),
            "fewer than 2 jointly rated rows"
        );
        return None;
    }

    let labels: BTreeSet<&str> = pairs
        .iter()
        .flat_map(|(a, b)| [a.as_str(), b.as_str()])
        .collect();
    let n = pairs.len() as f64;

    let observed = pairs.iter().filter(|(a, b)| a == b).count() as f64 / n;
    let expected: f64 = labels
        .iter()
        .map(|label| {
            let m1 = pairs.iter().filter(|(a, _)| a == label).count() as f64 / n;
            let m2 = pairs.iter().filter(|(_, b)| b == label).count() as f64 / n;
            m1 * m2
        })
        .sum();

    Some((observed - expected) / (1.0 - expected))
}
