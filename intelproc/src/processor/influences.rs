// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Feature influence retrieval

use chrono::{DateTime, Utc};

use super::{CacheBuild, IntelligenceProcessor};
use crate::background::RealizedBackgroundDataSplitInfo;
use crate::cache::CacheKey;
use crate::client::RequestContext;
use crate::error::{ProcessorError, ProcessorResult};
use crate::pending::{PendingOperations, PendingOperationsOr};
use crate::remote::{IndexRange, JobSpec, OperationType};
use crate::table::{NumericTable, NumericTableCache};
use crate::types::{ExplanationAlgorithmType, ExplanationCacheType, ScoreType};

const SHAP_NOT_PRECOMPUTED: &str = "Requested feature influences are not precomputed. New feature influences can only be generated if the project's influence algorithm is set to QII";

/// Feature influence request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InfluenceQuery {
    pub model_id: String,
    /// Defaults to the model's default split
    pub split_id: Option<String>,
    /// Record for single-record retrieval
    pub index: usize,
    /// Records for range retrieval; defaults to the configured count and is
    /// clamped to the split size
    pub n: Option<usize>,
    /// Defaults to the model's background split
    pub background: Option<RealizedBackgroundDataSplitInfo>,
    pub score_type: Option<ScoreType>,
    pub include_system_data: bool,
}

impl InfluenceQuery {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn with_split(mut self, split_id: impl Into<String>) -> Self {
        self.split_id = Some(split_id.into());
        self
    }

    pub fn at_index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn with_count(mut self, n: usize) -> Self {
        self.n = Some(n);
        self
    }

    pub fn with_background(mut self, background: RealizedBackgroundDataSplitInfo) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_score_type(mut self, score_type: ScoreType) -> Self {
        self.score_type = Some(score_type);
        self
    }

    pub fn include_system_data(mut self, include: bool) -> Self {
        self.include_system_data = include;
        self
    }
}

/// Error score influences go stale once the split's labels change.
fn is_stale(cache: &NumericTableCache, score_type: ScoreType, split_updated_on: DateTime<Utc>) -> bool {
    score_type.is_error() && cache.updated_on() < split_updated_on
}

impl IntelligenceProcessor {
    /// Drop the influence cache at `key` if it is stale. Returns whether it was dropped.
    fn evict_if_stale(
        &mut self,
        key: &CacheKey,
        score_type: ScoreType,
        split_updated_on: DateTime<Utc>,
    ) -> bool {
        let stale = self
            .feature_influence_caches
            .get_without_modifying(key)
            .is_some_and(|cache| is_stale(&cache, score_type, split_updated_on));
        if stale {
            log::warn!(
                "Evicting stale feature influence cache {}: split updated on {}",
                key,
                split_updated_on
            );
            self.feature_influence_caches.remove(key);
        }
        stale
    }

    /// Influences of one record and the algorithm that produced them.
    ///
    /// Cached algorithm types are tried in precedence order. On a miss,
    /// SHAP projects fail; QII projects compute the record remotely.
    pub fn get_inf(
        &mut self,
        ctx: &RequestContext,
        query: &InfluenceQuery,
    ) -> ProcessorResult<(NumericTable, ExplanationAlgorithmType)> {
        let model_id = query.model_id.as_str();
        let background = self.resolve_background(ctx, model_id, query.background.as_ref())?;
        let score_type = self.resolve_score_type(model_id, query.score_type)?;
        let split_id = self.resolve_split_id(ctx, model_id, query.split_id.as_deref())?;
        let split_updated_on = self.split_for_model(model_id, &split_id)?.updated_on;
        let use_shap = self
            .artifact_metadata_client
            .is_shap_algorithm_type(ctx, &self.project_id)?;

        for &cache_type in ExplanationCacheType::influence_lookup_order(use_shap) {
            let key = CacheKey::new(
                model_id,
                split_id.as_str(),
                &background,
                score_type,
                Some(cache_type),
            )?;
            let covered = self
                .feature_influence_caches
                .get_without_modifying(&key)
                .map_or(false, |cache| cache.contains_index(query.index));
            if !covered || self.evict_if_stale(&key, score_type, split_updated_on) {
                continue;
            }
            if let Some(cache) = self.feature_influence_caches.get_without_modifying(&key) {
                if let Some(row) = cache.get_value(query.index, query.include_system_data) {
                    return Ok((row, cache_type.algorithm()?));
                }
            }
        }

        if use_shap {
            return Err(ProcessorError::NotFound(SHAP_NOT_PRECOMPUTED.to_string()));
        }
        self.artifact_metadata_client
            .validate_mrc_available(ctx, "influences")?;
        let table = self.compute_feature_influence_remote(
            ctx,
            model_id,
            &split_id,
            score_type,
            IndexRange::single(query.index),
            &background,
            query.include_system_data,
        )?;
        Ok((table, ExplanationAlgorithmType::Qii))
    }

    /// Influences of the first `n` records, or the job launched to compute them.
    pub fn get_infs(
        &mut self,
        ctx: &RequestContext,
        query: &InfluenceQuery,
    ) -> ProcessorResult<PendingOperationsOr<(NumericTable, ExplanationAlgorithmType)>> {
        let model_id = query.model_id.as_str();
        let background = self.resolve_background(ctx, model_id, query.background.as_ref())?;
        let score_type = self.resolve_score_type(model_id, query.score_type)?;
        let split_id = self.resolve_split_id(ctx, model_id, query.split_id.as_deref())?;
        let num_inputs = self.split_for_model(model_id, &split_id)?.num_inputs;
        let n = query
            .n
            .unwrap_or(self.config.default_num_influences)
            .min(num_inputs);

        let key = match self.build_fi_cache(ctx, n, model_id, &split_id, &background, score_type)? {
            CacheBuild::Ready(key) => key,
            CacheBuild::Pending(operations) => {
                return Ok(PendingOperationsOr::from_operations(operations))
            }
        };
        let cache = self
            .feature_influence_caches
            .get_without_modifying(&key)
            .ok_or_else(|| {
                ProcessorError::Internal(format!("Feature influence cache {} disappeared", key))
            })?;
        let table = cache
            .get_values(0, n, query.include_system_data)
            .ok_or_else(|| {
                ProcessorError::Internal(format!(
                    "Feature influence cache {} claims completeness but returned no rows",
                    key
                ))
            })?;
        let algorithm = key.require_algorithm_type()?.algorithm()?;
        Ok(PendingOperationsOr::from_value((table, algorithm)))
    }

    /// Find or hydrate an influence cache covering `[0, num)`, trying
    /// algorithm types in precedence order. Falls back to one native QII
    /// job; SHAP influences are never launched.
    fn build_fi_cache(
        &mut self,
        ctx: &RequestContext,
        num: usize,
        model_id: &str,
        split_id: &str,
        background: &RealizedBackgroundDataSplitInfo,
        score_type: ScoreType,
    ) -> ProcessorResult<CacheBuild<CacheKey>> {
        let use_shap = self
            .artifact_metadata_client
            .is_shap_algorithm_type(ctx, &self.project_id)?;
        let split = self.split_for_model(model_id, split_id)?.clone();
        let covers = |processor: &Self, key: &CacheKey| {
            processor
                .feature_influence_caches
                .get_without_modifying(key)
                .is_some_and(|cache| cache.contains_index_range(0, num))
        };

        for &cache_type in ExplanationCacheType::influence_lookup_order(use_shap) {
            let key = CacheKey::new(model_id, split_id, background, score_type, Some(cache_type))?;

            self.evict_if_stale(&key, score_type, split.updated_on);
            if covers(self, &key) {
                return Ok(CacheBuild::Ready(key));
            }

            self.load_fi_cache(ctx, model_id, &split, background, score_type, &key)?;
            if self.evict_if_stale(&key, score_type, split.updated_on) {
                continue;
            }
            if covers(self, &key) {
                log::info!("Cache loaded {}", num);
                return Ok(CacheBuild::Ready(key));
            }
        }

        log::info!(
            "Building fi cache: {}, {}, {}",
            model_id,
            split_id,
            score_type
        );
        if use_shap {
            return Err(ProcessorError::NotFound(SHAP_NOT_PRECOMPUTED.to_string()));
        }
        self.artifact_metadata_client
            .validate_mrc_available(ctx, "influences")?;

        let dataset = self.dataset_for_model(model_id)?;
        self.validate_score_type(dataset, split_id, model_id, score_type)?;
        self.validate_feature_map(ctx, &split, model_id)?;
        let failure_rate = self
            .metric_config_loader
            .fetch_config(ctx, &self.project_id)?
            .maximum_model_runner_failure_rate;
        let job = JobSpec::new(
            OperationType::FeatureInfluence,
            self.project_id.as_str(),
            model_id,
            dataset.id.as_str(),
            split_id,
            score_type,
            IndexRange::new(0, num),
        )
        .with_background(background.clone())
        .with_failure_rate(failure_rate)
        .with_ingestion(self.ingestion_mode());
        let job_id = self
            .get_model(model_id)?
            .launch_feature_influence_job(ctx, &job)?;
        log::info!("Launched job: {}", job_id);
        Ok(CacheBuild::Pending(PendingOperations::single(job_id)))
    }

    #[allow(clippy::too_many_arguments)]
    fn compute_feature_influence_remote(
        &self,
        ctx: &RequestContext,
        model_id: &str,
        split_id: &str,
        score_type: ScoreType,
        range: IndexRange,
        background: &RealizedBackgroundDataSplitInfo,
        include_system_data: bool,
    ) -> ProcessorResult<NumericTable> {
        let dataset = self.dataset_for_model(model_id)?;
        self.validate_score_type(dataset, split_id, model_id, score_type)?;
        let table = self.get_model(model_id)?.compute_feature_influence_remote(
            ctx,
            score_type,
            dataset,
            split_id,
            range,
            background,
            include_system_data,
        )?;
        Ok(table.with_index(range.start))
    }
}
