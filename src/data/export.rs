use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Date32Array, Float64Array, UInt64Array};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::{Datelike, NaiveDate};
use log::info;
use parquet::arrow::ArrowWriter;
use serde::Serialize;

use super::model::{BaselineRecord, TidyModel};
use crate::error::{PipelineError, Result};

/// `NaiveDate::num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// One exported row: the long table joined with its point's attributes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TidyRow {
    pub ps: usize,
    pub date: NaiveDate,
    pub displacement: f64,
    pub lon: f64,
    pub lat: f64,
    pub ave: f64,
}

/// Write the long table of `model`. Dispatch by extension.
///
/// Supported formats:
/// * `.parquet` – one record batch, `date` as Arrow `Date32`
/// * `.csv`     – header row, ISO dates
/// * `.json`    – array of row objects
pub fn write_samples(path: &Path, model: &TidyModel) -> Result<()> {
    let rows = tidy_rows(model);
    match extension(path).as_str() {
        "parquet" | "pq" => write_parquet(path, &rows)?,
        "csv" => write_csv(path, &rows)?,
        "json" => write_json(path, &rows)?,
        other => return Err(PipelineError::UnsupportedFormat(other.to_string())),
    }
    info!("wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write the baseline table as `.csv` or `.json`.
pub fn write_baselines(path: &Path, records: &[BaselineRecord]) -> Result<()> {
    match extension(path).as_str() {
        "csv" => write_csv(path, records),
        "json" => write_json(path, records),
        other => Err(PipelineError::UnsupportedFormat(other.to_string())),
    }
}

/// Rows in table order; samples whose point is missing are skipped.
pub fn tidy_rows(model: &TidyModel) -> Vec<TidyRow> {
    model
        .samples()
        .iter()
        .filter_map(|s| {
            model.point(s.ps).map(|p| TidyRow {
                ps: s.ps,
                date: s.date,
                displacement: s.displacement,
                lon: p.lon,
                lat: p.lat,
                ave: p.average,
            })
        })
        .collect()
}

fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

// ---------------------------------------------------------------------------
// Writers
// ---------------------------------------------------------------------------

fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|e| PipelineError::io(path, e))
}

fn write_json<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, rows)?;
    writer.flush().map_err(|e| PipelineError::io(path, e))
}

fn write_parquet(path: &Path, rows: &[TidyRow]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        Field::new("ps", DataType::UInt64, false),
        Field::new("date", DataType::Date32, false),
        Field::new("displacement", DataType::Float64, false),
        Field::new("lon", DataType::Float64, false),
        Field::new("lat", DataType::Float64, false),
        Field::new("ave", DataType::Float64, false),
    ]));

    let columns: Vec<ArrayRef> = vec![
        Arc::new(UInt64Array::from_iter_values(rows.iter().map(|r| r.ps as u64))),
        Arc::new(Date32Array::from_iter_values(
            rows.iter().map(|r| r.date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE),
        )),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.displacement))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.lon))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.lat))),
        Arc::new(Float64Array::from_iter_values(rows.iter().map(|r| r.ave))),
    ];
    let batch = RecordBatch::try_new(schema.clone(), columns)?;

    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = ArrowWriter::try_new(file, schema, None)?;
    writer.write(&batch)?;
    writer.close()?;
    Ok(())
}
