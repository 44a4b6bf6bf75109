//! Metadata catalog loading.
//!
//! The catalog is a CSV with one row per data measure and a `newMeasureID`
//! column. It is converted once into a JSON object keyed by that id and then
//! treated as an opaque blob attached to LLM calls; no stage interprets the
//! columns.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

/// Header column holding the measure identifier.
const ID_COLUMN: &str = "newMeasureID";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid metadata CSV {path}: {message}")]
    Csv { path: PathBuf, message: String },
    #[error("metadata {path} has no '{ID_COLUMN}' column")]
    MissingIdColumn { path: PathBuf },
}

/// Load the catalog CSV and render it as a pretty JSON object keyed by
/// measure id. Rows with a blank id are dropped.
pub fn load_metadata_json(path: impl AsRef<Path>) -> Result<String, MetadataError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| MetadataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut rdr = csv::Reader::from_reader(file);

    let headers = rdr
        .headers()
        .map_err(|e| MetadataError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?
        .clone();

    let id_index = headers
        .iter()
        .position(|h| h == ID_COLUMN)
        .ok_or_else(|| MetadataError::MissingIdColumn {
            path: path.to_path_buf(),
        })?;

    let mut catalog = Map::new();
    for record in rdr.records() {
        let record = record.map_err(|e| MetadataError::Csv {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let id = record.get(id_index).unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        let mut row = Map::new();
        for (i, header) in headers.iter().enumerate() {
            if i == id_index {
                continue;
            }
            let cell = record.get(i).unwrap_or("");
            row.insert(header.to_string(), Value::String(cell.to_string()));
        }
        catalog.insert(id.to_string(), Value::Object(row));
    }

    serde_json::to_string_pretty(&Value::Object(catalog)).map_err(|e| MetadataError::Csv {
        path: path.to_path_buf(),
        message: e.to_string(),
    })
}
