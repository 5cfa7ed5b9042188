use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

use crate::common::data::{f64_column, i64_column, read_from_csv, resolve_alias, str_column};
use crate::common::time::parse_timestamp;
use crate::types::IncidentRecord;

#[derive(Debug, Deserialize)]
struct RawIncident {
    timestamp: String,
    lat: f64,
    lon: f64,
    #[serde(alias = "type")]
    incident_type: String,
    severity: i64,
}

/// Load incident records from `.csv` or `.json`; anything else fails fast.
pub fn load_incidents(path: &Path) -> Result<Vec<IncidentRecord>> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let records = match ext {
        "csv" => load_csv(path)?,
        "json" => load_json(path)?,
        _ => bail!(
            "Incidents file must be .json or .csv, got: {}",
            path.display()
        ),
    };
    log::info!("Loaded {} incident records from {}", records.len(), path.display());
    Ok(records)
}

fn load_csv(path: &Path) -> Result<Vec<IncidentRecord>> {
    let df = read_from_csv(path)?;
    let type_col = resolve_alias(&df, &["incident_type", "type"])
        .with_context(|| format!("{}: no incident_type/type column", path.display()))?;

    let timestamps = str_column(&df, "timestamp")?
        .iter()
        .map(|s| parse_timestamp(s))
        .collect::<Result<Vec<_>>>()
        .with_context(|| format!("{}: malformed incident timestamp", path.display()))?;
    let lat = f64_column(&df, "lat")?;
    let lon = f64_column(&df, "lon")?;
    let types = str_column(&df, type_col)?;
    let severity = i64_column(&df, "severity")?;

    Ok((0..df.height())
        .map(|i| IncidentRecord {
            timestamp: timestamps[i],
            lat: lat[i],
            lon: lon[i],
            incident_type: types[i].clone(),
            severity: severity[i],
        })
        .collect())
}

fn load_json(path: &Path) -> Result<Vec<IncidentRecord>> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read incidents file: {}", path.display()))?;
    let raw: Vec<RawIncident> = serde_json::from_slice(&bytes)
        .with_context(|| format!("Failed to parse incidents JSON: {}", path.display()))?;

    raw.into_iter()
        .map(|r| {
            Ok(IncidentRecord {
                timestamp: parse_timestamp(&r.timestamp)
                    .with_context(|| format!("{}: malformed incident timestamp", path.display()))?,
                lat: r.lat,
                lon: r.lon,
                incident_type: r.incident_type,
                severity: r.severity,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn loads_json_with_type_alias() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"timestamp":"2022-06-01T14:00","lat":12.97,"lon":77.59,"type":"heat_stroke","severity":4}}]"#
        )
        .unwrap();
        file.flush().unwrap();

        let records = load_incidents(file.path()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].incident_type, "heat_stroke");
        assert_eq!(records[0].severity, 4);
    }

    #[test]
    fn loads_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "timestamp,lat,lon,incident_type,severity").unwrap();
        writeln!(file, "2022-06-01T14:00,12.97,77.59,fire,2").unwrap();
        file.flush().unwrap();

        let records = load_incidents(file.path()).unwrap();
        assert_eq!(records[0].incident_type, "fire");
        assert_eq!(records[0].timestamp, parse_timestamp("2022-06-01T14:00").unwrap());
    }

    #[test]
    fn rejects_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".parquet").tempfile().unwrap();
        let err = load_incidents(file.path()).unwrap_err();
        assert!(err.to_string().contains("must be .json or .csv"));
    }
}
