//! Results table writers.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use csv::Writer;

use crate::sweep::{RunRecord, SweepSummary};
use crate::FaultError;

/// Creates `<root>/<utc timestamp>`, appending a counter on collision.
pub fn create_timestamped_output_dir(root: &Path) -> Result<PathBuf, FaultError> {
    fs::create_dir_all(root)?;

    let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let mut output_dir = root.join(&timestamp);
    let mut counter = 1_u32;

    while output_dir.exists() {
        output_dir = root.join(format!("{timestamp}-{counter:02}"));
        counter += 1;
    }

    fs::create_dir_all(&output_dir)?;
    Ok(output_dir)
}

fn fmt_f64(value: f64) -> String {
    format!("{value:.10}")
}

/// Writes the results table. Parameter and metric keys vary per record,
/// so the header is the sorted union across all records, prefixed
/// `err_`, `model_` and `metric_`; absent entries stay empty.
pub fn write_records_csv(path: &Path, records: &[RunRecord]) -> Result<(), FaultError> {
    let mut error_keys = BTreeSet::new();
    let mut model_keys = BTreeSet::new();
    let mut metric_keys = BTreeSet::new();
    for record in records {
        error_keys.extend(record.error_params.keys().cloned());
        model_keys.extend(record.model_params.keys().cloned());
        metric_keys.extend(record.metrics.keys().cloned());
    }

    let mut header = vec![
        "run_id".to_string(),
        "seed".to_string(),
        "model".to_string(),
        "status".to_string(),
        "failure_reason".to_string(),
    ];
    header.extend(error_keys.iter().map(|key| format!("err_{key}")));
    header.extend(model_keys.iter().map(|key| format!("model_{key}")));
    header.extend(metric_keys.iter().map(|key| format!("metric_{key}")));

    let mut writer = Writer::from_path(path)?;
    writer.write_record(&header)?;

    for record in records {
        let mut row = vec![
            record.run_id.to_string(),
            record.seed.to_string(),
            record.model.clone(),
            record.status.label().to_string(),
            record.status.failure_reason().unwrap_or("").to_string(),
        ];
        for key in &error_keys {
            row.push(record.error_params.get(key).cloned().unwrap_or_default());
        }
        for key in &model_keys {
            row.push(record.model_params.get(key).cloned().unwrap_or_default());
        }
        for key in &metric_keys {
            row.push(
                record
                    .metrics
                    .get(key)
                    .map(|value| fmt_f64(*value))
                    .unwrap_or_default(),
            );
        }
        writer.write_record(&row)?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_records_json(path: &Path, records: &[RunRecord]) -> Result<(), FaultError> {
    let mut file = fs::File::create(path)?;
    serde_json::to_writer_pretty(&mut file, records)?;
    file.write_all(b"\n")?;
    Ok(())
}

pub fn write_summary_json(path: &Path, summary: &SweepSummary) -> Result<(), FaultError> {
    let mut file = fs::File::create(path)?;
    serde_json::to_writer_pretty(&mut file, summary)?;
    file.write_all(b"\n")?;
    Ok(())
}
