// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI command handlers

use std::path::PathBuf;
use std::sync::Arc;

use colored::Colorize;

use intelproc::metadata::ModelPredictionCacheMetadata;
use intelproc::storage::{ModelPredictionCacheStore, SledCacheStore};
use intelproc::{
    InfluenceQuery, IntelligenceProcessor, NumericTable, NumericTableCache, PdpQuery,
    PendingOperationsOr, PredictionQuery, ProcessorError, RealizedBackgroundDataSplitInfo,
    RequestContext, ScoreType, PREDICTION_COLUMN,
};

use super::commands::{JobAction, OutputFormat};
use super::manifest::{ManifestServices, ProjectManifest, QueueingRunner};
use super::output::ResultFormatter;

type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Column name some runners use for prediction output
const RUNNER_RESULT_COLUMN: &str = "Result";

/// Paths shared by every command
pub struct Session {
    manifest_path: PathBuf,
    store_path: PathBuf,
}

impl Session {
    pub fn new(manifest_path: PathBuf, store_path: PathBuf) -> Self {
        Self {
            manifest_path,
            store_path,
        }
    }

    fn context(&self) -> RequestContext {
        let user = std::env::var("USER").unwrap_or_else(|_| "cli".to_string());
        RequestContext::new(user, uuid::Uuid::new_v4().to_string())
    }

    fn open_store(&self) -> Result<Arc<SledCacheStore>, Box<dyn std::error::Error>> {
        let store = SledCacheStore::open(&self.store_path).map_err(|e| {
            format!("Failed to open cache store at {:?}: {}", self.store_path, e)
        })?;
        Ok(Arc::new(store))
    }

    /// Build a processor over the manifest, hydrating from and queueing
    /// jobs into the store.
    fn processor(
        &self,
    ) -> Result<(IntelligenceProcessor, Arc<SledCacheStore>), Box<dyn std::error::Error>> {
        let manifest = Arc::new(ProjectManifest::from_file(&self.manifest_path)?);
        let store = self.open_store()?;
        let services = Arc::new(ManifestServices::new(Arc::clone(&manifest)));

        let mut processor = IntelligenceProcessor::new(
            Some(manifest.project_id.clone()),
            manifest.config.clone(),
            services.clone(),
            services,
        )?
        .with_model_prediction_cache_store(store.clone())
        .with_explanation_cache_store(store.clone());

        for dataset in &manifest.datasets {
            processor.add_dataset(dataset.clone());
        }
        for model in &manifest.models {
            processor.add_model(
                model.id.clone(),
                Box::new(QueueingRunner::new(model.clone(), Arc::clone(&store))),
            );
        }
        log::debug!("Loaded {:?}", processor);
        Ok((processor, store))
    }
}

fn finish<T>(
    result: PendingOperationsOr<T>,
    render: impl FnOnce(&T) -> String,
    store: &SledCacheStore,
) -> CliResult {
    match result {
        PendingOperationsOr::Value(value) => println!("{}", render(&value)),
        PendingOperationsOr::Operations(operations) => {
            store.flush()?;
            print!("{}", ResultFormatter::format_pending(&operations));
        }
    }
    Ok(())
}

fn report<T>(result: Result<T, ProcessorError>) -> Result<T, Box<dyn std::error::Error>> {
    result.map_err(|e| {
        eprintln!("{}", format!("Error: {}", e).red());
        e.into()
    })
}

#[allow(clippy::too_many_arguments)]
pub fn handle_scores(
    session: &Session,
    model: String,
    split: Option<String>,
    score_type: Option<ScoreType>,
    start: usize,
    stop: Option<usize>,
    readonly: bool,
    format: OutputFormat,
) -> CliResult {
    let (mut processor, store) = session.processor()?;
    let mut query = PredictionQuery::new(model)
        .with_range(start, stop)
        .readonly(readonly);
    query.split_id = split;
    query.score_type = score_type;

    let result = report(processor.get_prediction_scores(&session.context(), &query))?;
    finish(
        result,
        |table| ResultFormatter::format_table(table, None, format),
        &store,
    )
}

pub fn handle_score(
    session: &Session,
    model: String,
    index: usize,
    split: Option<String>,
    score_type: Option<ScoreType>,
    format: OutputFormat,
) -> CliResult {
    let (mut processor, _store) = session.processor()?;
    let mut query = PredictionQuery::new(model).at_index(index);
    query.split_id = split;
    query.score_type = score_type;

    let table = report(processor.get_prediction_score(&session.context(), &query))?;
    println!("{}", ResultFormatter::format_table(&table, None, format));
    Ok(())
}

pub fn handle_influences(
    session: &Session,
    model: String,
    split: Option<String>,
    count: Option<usize>,
    background: Option<String>,
    score_type: Option<ScoreType>,
    format: OutputFormat,
) -> CliResult {
    let (mut processor, store) = session.processor()?;
    let query = InfluenceQuery {
        model_id: model,
        split_id: split,
        n: count,
        background: background.map(RealizedBackgroundDataSplitInfo::new),
        score_type,
        ..Default::default()
    };

    let result = report(processor.get_infs(&session.context(), &query))?;
    finish(
        result,
        |(table, algorithm)| ResultFormatter::format_table(table, Some(*algorithm), format),
        &store,
    )
}

pub fn handle_influence(
    session: &Session,
    model: String,
    index: usize,
    split: Option<String>,
    background: Option<String>,
    score_type: Option<ScoreType>,
    format: OutputFormat,
) -> CliResult {
    let (mut processor, _store) = session.processor()?;
    let query = InfluenceQuery {
        model_id: model,
        split_id: split,
        index,
        background: background.map(RealizedBackgroundDataSplitInfo::new),
        score_type,
        ..Default::default()
    };

    let (table, algorithm) = report(processor.get_inf(&session.context(), &query))?;
    println!(
        "{}",
        ResultFormatter::format_table(&table, Some(algorithm), format)
    );
    Ok(())
}

pub fn handle_pdp(
    session: &Session,
    model: String,
    background: Option<String>,
    score_type: Option<ScoreType>,
    format: OutputFormat,
) -> CliResult {
    let (mut processor, store) = session.processor()?;
    let query = PdpQuery {
        model_id: model,
        background: background.map(RealizedBackgroundDataSplitInfo::new),
        score_type,
    };

    let result = report(processor.get_pdp(&session.context(), &query))?;
    finish(
        result,
        |pdp| ResultFormatter::format_pdp(pdp, format),
        &store,
    )
}

/// Merge prediction rows from a JSON table into the stored cache.
pub fn handle_import_predictions(
    session: &Session,
    model: String,
    split: String,
    score_type: ScoreType,
    file: PathBuf,
) -> CliResult {
    if score_type == ScoreType::Classification {
        return Err("Classification predictions are derived and cannot be imported".into());
    }
    let (processor, store) = session.processor()?;
    let split_info = report(
        processor
            .get_dataset(&model)
            .and_then(|dataset| {
                dataset.ok_or_else(|| {
                    ProcessorError::NotFound(format!("Model {} has no data collection", model))
                })
            })
            .and_then(|dataset| dataset.get_split(&split).cloned()),
    )?;

    let contents = std::fs::read_to_string(&file)
        .map_err(|e| format!("Cannot read {:?}: {}", file, e))?;
    let mut table: NumericTable = serde_json::from_str(&contents)?;
    table.rename_column(RUNNER_RESULT_COLUMN, PREDICTION_COLUMN);

    let metadata = ModelPredictionCacheMetadata {
        project_id: processor.project_id().to_string(),
        model_id: model,
        split_id: split,
        score_type,
    };
    let mut cache = NumericTableCache::new(
        vec![PREDICTION_COLUMN.to_string()],
        split_info.unique_id_column_name.clone(),
        split_info.timestamp_column_name.clone(),
    );
    report(store.load_cache(&mut cache, &metadata, &session.context()))?;
    report(cache.insert_table(&table))?;
    report(store.save_prediction_cache(&metadata, &cache))?;
    store.flush()?;

    println!(
        "{}",
        format!(
            "Imported {} rows into {} ({} rows cached)",
            table.num_rows(),
            metadata.storage_key(),
            cache.len()
        )
        .green()
    );
    Ok(())
}

pub fn handle_jobs(session: &Session, action: JobAction) -> CliResult {
    let store = session.open_store()?;
    match action {
        JobAction::List { format } => {
            let jobs = report(store.queued_jobs())?;
            print!("{}", ResultFormatter::format_jobs(&jobs, format));
        }
        JobAction::Remove { job_id } => {
            if report(store.remove_job(&job_id))? {
                store.flush()?;
                println!("{}", format!("Removed job {}", job_id).green());
            } else {
                println!("{}", format!("No queued job {}", job_id).yellow());
            }
        }
    }
    Ok(())
}
