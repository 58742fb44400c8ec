// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Prediction score retrieval

use super::IntelligenceProcessor;
use crate::cache::ModelScoreTypeTuple;
use crate::client::RequestContext;
use crate::derivation::ScoreTypeConverter;
use crate::error::{ProcessorError, ProcessorResult};
use crate::pending::{PendingOperations, PendingOperationsOr};
use crate::remote::{IndexRange, JobSpec, OperationType};
use crate::table::{NumericTable, PREDICTION_COLUMN};
use crate::types::ScoreType;

/// Column name used by model runners for synchronous results
const REMOTE_RESULT_COLUMN: &str = "Result";

/// Prediction request. `index` is used by single-record retrieval,
/// `start`/`stop`/`readonly` by range retrieval.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PredictionQuery {
    pub model_id: String,
    /// Defaults to the model's natural score type
    pub score_type: Option<ScoreType>,
    /// Defaults to the model's default split
    pub split_id: Option<String>,
    pub index: usize,
    pub start: usize,
    /// Defaults to, and is clamped to, the split size
    pub stop: Option<usize>,
    /// Never launch jobs; serve from caches only
    pub readonly: bool,
    pub include_system_data: bool,
}

impl PredictionQuery {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn with_score_type(mut self, score_type: ScoreType) -> Self {
        self.score_type = Some(score_type);
        self
    }

    pub fn with_split(mut self, split_id: impl Into<String>) -> Self {
        self.split_id = Some(split_id.into());
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_range(mut self, start: usize, stop: Option<usize>) -> Self {
        self.start = start;
        self.stop = stop;
        self
    }

    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn include_system_data(mut self, include: bool) -> Self {
        self.include_system_data = include;
        self
    }
}

fn convert_predictions(
    converter: ScoreTypeConverter,
    table: &mut NumericTable,
    target: ScoreType,
    source: ScoreType,
) -> ProcessorResult<()> {
    let values = table.column(PREDICTION_COLUMN).ok_or_else(|| {
        ProcessorError::Internal(format!("Prediction table lacks {}", PREDICTION_COLUMN))
    })?;
    let converted = converter.convert(target, source, &values)?;
    table.set_column(PREDICTION_COLUMN, converted)
}

impl IntelligenceProcessor {
    /// Score type classification decisions are thresholded from.
    fn classification_source_score_type(&self, default_score_type: ScoreType) -> ScoreType {
        let source = match default_score_type {
            ScoreType::Classification => ScoreType::Probits,
            other => other,
        };
        if source == ScoreType::Logits
            && self
                .converter
                .is_derivable(ScoreType::Probits, ScoreType::Logits)
        {
            ScoreType::Probits
        } else {
            source
        }
    }

    fn apply_classification(
        &self,
        ctx: &RequestContext,
        model_id: &str,
        source: ScoreType,
        table: &mut NumericTable,
    ) -> ProcessorResult<()> {
        let values = table.column(PREDICTION_COLUMN).ok_or_else(|| {
            ProcessorError::Internal(format!("Prediction table lacks {}", PREDICTION_COLUMN))
        })?;
        let decisions = self.artifact_metadata_client.classification_scores_for_model(
            ctx,
            &self.project_id,
            model_id,
            source,
            &values,
        )?;
        table.set_column(PREDICTION_COLUMN, decisions)
    }

    /// Prediction score of one record.
    ///
    /// Served, in order, by derivation from the project's default score
    /// type, by thresholding for classification, from the cache, or by a
    /// synchronous remote call that is not cached.
    pub fn get_prediction_score(
        &mut self,
        ctx: &RequestContext,
        query: &PredictionQuery,
    ) -> ProcessorResult<NumericTable> {
        let metric_config = self.metric_config_loader.fetch_config(ctx, &self.project_id)?;
        let model_id = query.model_id.as_str();
        let split_id = self.resolve_split_id(ctx, model_id, query.split_id.as_deref())?;
        let score_type = self.resolve_score_type(model_id, query.score_type)?;
        let default_score_type = metric_config.score_type;

        if self.converter.is_derivable(score_type, default_score_type) {
            let source_query = query
                .clone()
                .with_split(split_id)
                .with_score_type(default_score_type);
            let mut table = self.get_prediction_score(ctx, &source_query)?;
            convert_predictions(self.converter, &mut table, score_type, default_score_type)?;
            return Ok(table);
        }

        if score_type == ScoreType::Classification {
            let source = self.classification_source_score_type(default_score_type);
            let source_query = query.clone().with_split(split_id).with_score_type(source);
            let mut table = self.get_prediction_score(ctx, &source_query)?;
            self.apply_classification(ctx, model_id, source, &mut table)?;
            return Ok(table);
        }

        let cache_key = ModelScoreTypeTuple::new(model_id, split_id.as_str(), score_type)?;
        if !self.model_prediction_caches.contains(&cache_key) {
            self.load_model_prediction_cache(ctx, model_id, &split_id, score_type)?;
        }
        if let Some(cache) = self.model_prediction_caches.get_without_modifying(&cache_key) {
            if let Some(row) = cache.get_value(query.index, query.include_system_data) {
                return Ok(row);
            }
        }

        self.artifact_metadata_client
            .validate_mrc_available(ctx, "predictions")?;
        let split = self.split_for_model(model_id, &split_id)?;
        log::debug!(
            "Computing prediction for {} record {} of {} remotely",
            model_id,
            query.index,
            split_id
        );
        let mut table = self.get_model(model_id)?.compute_prediction_score_remote(
            ctx,
            score_type,
            split,
            IndexRange::single(query.index),
            query.include_system_data,
        )?;
        table.rename_column(REMOTE_RESULT_COLUMN, PREDICTION_COLUMN);
        Ok(table.with_index(query.index))
    }

    /// Prediction scores of records `[start, stop)`, or the jobs launched to
    /// compute them.
    pub fn get_prediction_scores(
        &mut self,
        ctx: &RequestContext,
        query: &PredictionQuery,
    ) -> ProcessorResult<PendingOperationsOr<NumericTable>> {
        let model_id = query.model_id.as_str();
        let score_type = self.resolve_score_type(model_id, query.score_type)?;
        let metric_config = self.metric_config_loader.fetch_config(ctx, &self.project_id)?;
        let default_score_type = metric_config.score_type;

        if self.converter.is_derivable(score_type, default_score_type) {
            let source_query = query.clone().with_score_type(default_score_type);
            let converter = self.converter;
            return self
                .get_prediction_scores(ctx, &source_query)?
                .and_then_value(|mut table| {
                    convert_predictions(converter, &mut table, score_type, default_score_type)?;
                    Ok(table)
                });
        }

        if score_type == ScoreType::Classification {
            let source = self.classification_source_score_type(default_score_type);
            let source_query = query.clone().with_score_type(source);
            return match self.get_prediction_scores(ctx, &source_query)? {
                PendingOperationsOr::Value(mut table) => {
                    self.apply_classification(ctx, model_id, source, &mut table)?;
                    Ok(PendingOperationsOr::from_value(table))
                }
                pending => Ok(pending),
            };
        }

        let split_id = self.resolve_split_id(ctx, model_id, query.split_id.as_deref())?;
        let num_inputs = self.split_for_model(model_id, &split_id)?.num_inputs;
        let stop = query.stop.map_or(num_inputs, |stop| stop.min(num_inputs));

        if let Some(operations) = self.build_model_prediction_cache(
            ctx,
            stop,
            model_id,
            &split_id,
            score_type,
            query.readonly,
        )? {
            return Ok(PendingOperationsOr::from_operations(operations));
        }

        let cache_key = ModelScoreTypeTuple::new(model_id, split_id.as_str(), score_type)?;
        if let Some(cache) = self.model_prediction_caches.get_without_modifying(&cache_key) {
            if let Some(table) = cache.get_values(query.start, stop, query.include_system_data) {
                return Ok(PendingOperationsOr::from_value(table));
            }
        }
        self.log_other_prediction_caches(model_id, &split_id, score_type, default_score_type);

        if query.readonly {
            return Err(ProcessorError::PredictionUnavailable(
                "Requested prediction caches not available".to_string(),
            ));
        }
        Err(ProcessorError::Internal(
            "Prediction cache values not available".to_string(),
        ))
    }

    fn log_other_prediction_caches(
        &self,
        model_id: &str,
        split_id: &str,
        requested: ScoreType,
        default_score_type: ScoreType,
    ) {
        for other in ScoreType::CLASSIFICATION_CACHE_TYPES {
            if other == requested {
                continue;
            }
            let Ok(key) = ModelScoreTypeTuple::new(model_id, split_id, other) else {
                continue;
            };
            if self.model_prediction_caches.contains(&key) {
                log::info!(
                    "Found existing cache with type {} for model {} split {} but did not convert it because project uses {}",
                    other,
                    model_id,
                    split_id,
                    default_score_type
                );
            }
        }
    }

    /// Ensure the prediction cache covers `[0, num)`: hydrate it from the
    /// store, else launch one job for the whole range unless `readonly`.
    fn build_model_prediction_cache(
        &mut self,
        ctx: &RequestContext,
        num: usize,
        model_id: &str,
        split_id: &str,
        score_type: ScoreType,
        readonly: bool,
    ) -> ProcessorResult<Option<PendingOperations>> {
        let cache_key = ModelScoreTypeTuple::new(model_id, split_id, score_type)?;
        let covers = |processor: &Self| {
            processor
                .model_prediction_caches
                .get_without_modifying(&cache_key)
                .is_some_and(|cache| cache.contains_index_range(0, num))
        };
        if covers(self) {
            return Ok(None);
        }

        self.load_model_prediction_cache(ctx, model_id, split_id, score_type)?;
        if covers(self) {
            return Ok(None);
        }
        if readonly {
            log::info!("Skipping model prediction cache generation in readonly request");
            return Ok(None);
        }

        self.artifact_metadata_client
            .validate_mrc_available(ctx, "predictions")?;
        log::info!(
            "Building prediction cache: {}, {}, {}",
            model_id,
            split_id,
            score_type
        );
        let dataset = self.dataset_for_model(model_id)?;
        self.validate_score_type(dataset, split_id, model_id, score_type)?;
        let failure_rate = self
            .metric_config_loader
            .fetch_config(ctx, &self.project_id)?
            .maximum_model_runner_failure_rate;
        let job = JobSpec::new(
            OperationType::ModelPrediction,
            self.project_id.as_str(),
            model_id,
            dataset.id.as_str(),
            split_id,
            score_type,
            IndexRange::new(0, num),
        )
        .with_failure_rate(failure_rate)
        .with_ingestion(self.ingestion_mode());
        let job_id = self
            .get_model(model_id)?
            .launch_model_prediction_job(ctx, &job)?;
        log::info!("Launched model prediction job: {}", job_id);
        Ok(Some(PendingOperations::single(job_id)))
    }
}
