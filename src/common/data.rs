use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use polars::frame::DataFrame;
use polars::io::{SerReader, SerWriter};
use polars::prelude::{CsvReader, CsvWriter, DataType};

/// Reads a CSV file from `path` into a Polars DataFrame.
pub fn read_from_csv(path: &Path) -> Result<DataFrame> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;
    let df = CsvReader::new(file)
        .finish()
        .with_context(|| format!("Failed to parse CSV file: {}", path.display()))?;
    Ok(df)
}

/// Writes a Polars DataFrame to CSV bytes.
pub fn write_csv_bytes(df: &DataFrame) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    CsvWriter::new(&mut out)
        .finish(&mut df.clone())
        .context("Failed to write CSV to bytes")?;
    Ok(out)
}

/// Extract a column as f64, casting numeric dtypes. Nulls map to NaN so the
/// imputer downstream can see them.
pub fn f64_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let col = df
        .column(name)
        .with_context(|| format!("Missing column: {name}"))?;
    let casted = col
        .cast(&DataType::Float64)
        .with_context(|| format!("Column {name} is not numeric"))?;
    let ca = casted.f64()?;
    Ok(ca.into_iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

/// Extract a column as i64, casting numeric dtypes. Nulls are an error.
pub fn i64_column(df: &DataFrame, name: &str) -> Result<Vec<i64>> {
    let col = df
        .column(name)
        .with_context(|| format!("Missing column: {name}"))?;
    let casted = col
        .cast(&DataType::Int64)
        .with_context(|| format!("Column {name} is not integral"))?;
    let ca = casted.i64()?;
    ca.into_iter()
        .enumerate()
        .map(|(i, v)| v.with_context(|| format!("Null value in column {name} at row {i}")))
        .collect()
}

/// Extract a column as owned strings. Nulls are an error.
pub fn str_column(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let col = df
        .column(name)
        .with_context(|| format!("Missing column: {name}"))?;
    let ca = col
        .str()
        .with_context(|| format!("Column {name} is not a string column"))?;
    ca.into_iter()
        .enumerate()
        .map(|(i, v)| {
            v.map(str::to_string)
                .with_context(|| format!("Null value in column {name} at row {i}"))
        })
        .collect()
}

/// The first present column name out of `candidates`, for schema aliases
/// (`time` vs `timestamp`, `tmax` vs `temp`).
pub fn resolve_alias<'a>(df: &DataFrame, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|name| df.get_column_names().iter().any(|c| c.as_str() == *name))
}
