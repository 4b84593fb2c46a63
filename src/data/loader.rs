//! Tabular file loading

use crate::error::{Result, SweepError};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Load a CSV, JSON or Parquet file into a frame, dispatching on the extension
pub fn load_frame(path: &Path) -> Result<DataFrame> {
    let start = Instant::now();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    let df = match ext {
        "csv" => CsvReadOptions::default()
            .with_infer_schema_length(Some(1000))
            .with_has_header(true)
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?,
        "json" => JsonReader::new(std::fs::File::open(path)?).finish()?,
        "parquet" => ParquetReader::new(std::fs::File::open(path)?).finish()?,
        _ => {
            return Err(SweepError::DataError(format!(
                "unsupported file format: '{}'",
                ext
            )))
        }
    };

    info!(
        path = %path.display(),
        rows = df.height(),
        cols = df.width(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Loaded data"
    );
    Ok(df)
}

/// Drop rows whose target is null; those rows cannot be used for training or evaluation
pub fn drop_missing_target(df: &DataFrame, target: &str) -> Result<DataFrame> {
    let column = df
        .column(target)
        .map_err(|_| SweepError::FeatureNotFound(target.to_string()))?;
    let series = column.as_materialized_series();
    if series.null_count() == 0 {
        return Ok(df.clone());
    }

    let mask = series.is_not_null();
    let filtered = df.filter(&mask)?;
    debug!(
        dropped = df.height() - filtered.height(),
        target = %target,
        "Dropped rows with missing target"
    );
    Ok(filtered)
}

/// Per-column description used by the `info` command
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub dtype: String,
    pub null_count: usize,
}

/// Shape and column overview of a frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
}

impl FrameSummary {
    pub fn of(df: &DataFrame) -> Self {
        let columns = df
            .get_columns()
            .iter()
            .map(|col| ColumnSummary {
                name: col.name().to_string(),
                dtype: col.dtype().to_string(),
                null_count: col.as_materialized_series().null_count(),
            })
            .collect();

        Self {
            n_rows: df.height(),
            n_cols: df.width(),
            columns,
        }
    }
}
