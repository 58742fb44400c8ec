// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Result formatting for CLI output

use colored::*;
use comfy_table::{presets::UTF8_FULL, Cell, Color, Table};
use intelproc::storage::QueuedJob;
use intelproc::{ExplanationAlgorithmType, NumericTable, PartialDependenceCache, PendingOperations};

use super::commands::OutputFormat;

/// Result formatter for different output formats
pub struct ResultFormatter;

impl ResultFormatter {
    /// Format a score or influence table
    pub fn format_table(
        table: &NumericTable,
        algorithm: Option<ExplanationAlgorithmType>,
        format: OutputFormat,
    ) -> String {
        let header = Self::table_header(table);
        let rows = Self::table_rows(table);
        match format {
            OutputFormat::Table => {
                let mut output = String::new();
                if let Some(algorithm) = algorithm {
                    output.push_str(&format!("Algorithm: {}\n", algorithm.to_string().cyan()));
                }
                output.push_str(&format!("Rows returned: {}\n\n", table.num_rows()));
                output.push_str(&Self::render(&header, &rows));
                output
            }
            OutputFormat::Json => {
                let records: Vec<serde_json::Value> = rows
                    .iter()
                    .map(|row| {
                        let map: serde_json::Map<String, serde_json::Value> = header
                            .iter()
                            .cloned()
                            .zip(row.iter().map(|v| Self::cell_to_json(v)))
                            .collect();
                        serde_json::Value::Object(map)
                    })
                    .collect();
                let mut json = serde_json::json!({
                    "status": "success",
                    "columns": header,
                    "rows": records,
                });
                if let (Some(algorithm), serde_json::Value::Object(map)) = (algorithm, &mut json) {
                    map.insert("algorithm".to_string(), serde_json::json!(algorithm.to_string()));
                }
                Self::to_pretty_json(&json)
            }
            OutputFormat::Csv => Self::render_csv(&header, &rows),
        }
    }

    /// Format partial dependence curves, one row per sweep point
    pub fn format_pdp(pdp: &PartialDependenceCache, format: OutputFormat) -> String {
        let header = vec!["feature".to_string(), "x".to_string(), "y".to_string()];
        let mut rows = Vec::new();
        for feature in &pdp.features {
            if let Some((xs, ys)) = pdp.curve(feature) {
                for (x, y) in xs.iter().zip(ys) {
                    rows.push(vec![feature.clone(), x.to_string(), y.to_string()]);
                }
            }
        }
        match format {
            OutputFormat::Table => {
                let mut output = format!(
                    "Features: {}  Points per feature: {}\n\n",
                    pdp.features.len(),
                    pdp.num_points
                );
                output.push_str(&Self::render(&header, &rows));
                output
            }
            OutputFormat::Json => Self::to_pretty_json(&serde_json::json!({
                "status": "success",
                "num_points": pdp.num_points,
                "features": pdp.features,
                "xs": pdp.xs,
                "ys": pdp.ys,
            })),
            OutputFormat::Csv => Self::render_csv(&header, &rows),
        }
    }

    pub fn format_jobs(jobs: &[QueuedJob], format: OutputFormat) -> String {
        let header: Vec<String> = [
            "job_id",
            "operation",
            "model",
            "split",
            "score_type",
            "range",
            "queued_at",
        ]
        .iter()
        .map(|h| h.to_string())
        .collect();
        let rows: Vec<Vec<String>> = jobs
            .iter()
            .map(|job| {
                vec![
                    job.job_id.clone(),
                    job.spec.operation.to_string(),
                    job.spec.model_id.clone(),
                    job.spec.split_id.clone(),
                    job.spec.score_type.to_string(),
                    job.spec.range.to_string(),
                    job.queued_at.to_rfc3339(),
                ]
            })
            .collect();
        match format {
            OutputFormat::Table if jobs.is_empty() => format!("{}\n", "No queued jobs".yellow()),
            OutputFormat::Table => Self::render(&header, &rows),
            OutputFormat::Json => serde_json::to_string_pretty(jobs)
                .unwrap_or_else(|_| Self::json_error()),
            OutputFormat::Csv => Self::render_csv(&header, &rows),
        }
    }

    /// Message for a request answered with launched jobs
    pub fn format_pending(operations: &PendingOperations) -> String {
        let mut output = format!(
            "{}\n",
            format!("Queued {} job(s); results are not cached yet", operations.len()).yellow()
        );
        for job_id in operations.job_ids() {
            output.push_str(&format!("  {}\n", job_id.cyan()));
        }
        output.push_str("Re-run the command once the jobs have completed.\n");
        output
    }

    fn table_header(table: &NumericTable) -> Vec<String> {
        let mut header = vec!["index".to_string()];
        header.extend(table.columns.iter().cloned());
        if table.system.is_some() {
            header.push("id".to_string());
            header.push("timestamp".to_string());
        }
        header
    }

    fn table_rows(table: &NumericTable) -> Vec<Vec<String>> {
        table
            .index
            .iter()
            .zip(&table.rows)
            .enumerate()
            .map(|(offset, (index, values))| {
                let mut row = vec![index.to_string()];
                row.extend(values.iter().map(|v| v.to_string()));
                if let Some(system) = &table.system {
                    row.push(system.ids.get(offset).cloned().flatten().unwrap_or_default());
                    row.push(
                        system
                            .timestamps
                            .get(offset)
                            .copied()
                            .flatten()
                            .map(|ts| ts.to_rfc3339())
                            .unwrap_or_default(),
                    );
                }
                row
            })
            .collect()
    }

    fn render(header: &[String], rows: &[Vec<String>]) -> String {
        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_header(header.iter().map(|h| Cell::new(h).fg(Color::Green)));
        for row in rows {
            table.add_row(row);
        }
        format!("{}\n", table)
    }

    fn render_csv(header: &[String], rows: &[Vec<String>]) -> String {
        let mut output = header
            .iter()
            .map(|h| Self::csv_escape(h))
            .collect::<Vec<_>>()
            .join(",");
        output.push('\n');
        for row in rows {
            output.push_str(
                &row.iter()
                    .map(|v| Self::csv_escape(v))
                    .collect::<Vec<_>>()
                    .join(","),
            );
            output.push('\n');
        }
        output
    }

    fn csv_escape(value: &str) -> String {
        if value.contains(',') || value.contains('"') || value.contains('\n') {
            format!("\"{}\"", value.replace('"', "\"\""))
        } else {
            value.to_string()
        }
    }

    fn cell_to_json(value: &str) -> serde_json::Value {
        match value.parse::<f64>() {
            Ok(number) => serde_json::json!(number),
            Err(_) if value.is_empty() => serde_json::Value::Null,
            Err(_) => serde_json::Value::String(value.to_string()),
        }
    }

    fn to_pretty_json(value: &serde_json::Value) -> String {
        serde_json::to_string_pretty(value).unwrap_or_else(|_| Self::json_error())
    }

    fn json_error() -> String {
        "{\"status\": \"error\", \"error\": \"Could not serialize results to JSON\"}".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NumericTable {
        NumericTable::from_rows(
            vec![3, 4],
            vec!["age".to_string(), "income, net".to_string()],
            vec![vec![0.5, -1.0], vec![0.25, 2.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_csv_escapes_headers() {
        let csv = ResultFormatter::format_table(&sample(), None, OutputFormat::Csv);
        let mut lines = csv.lines();
        assert_eq!(lines.next(), Some("index,age,\"income, net\""));
        assert_eq!(lines.next(), Some("3,0.5,-1"));
    }

    #[test]
    fn test_json_includes_algorithm() {
        let json = ResultFormatter::format_table(
            &sample(),
            Some(ExplanationAlgorithmType::Qii),
            OutputFormat::Json,
        );
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["algorithm"], "qii");
        assert_eq!(parsed["rows"][1]["index"], 4.0);
        assert_eq!(parsed["rows"][0]["age"], 0.5);
    }

    #[test]
    fn test_pdp_rows_per_point() {
        let mut pdp = PartialDependenceCache::new(2);
        pdp.insert_feature("age", vec![1.0, 2.0], vec![0.1, 0.2]);
        let csv = ResultFormatter::format_pdp(&pdp, OutputFormat::Csv);
        assert_eq!(csv, "feature,x,y\nage,1,0.1\nage,2,0.2\n");
    }
}
