// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Intelligence processor
//!
//! Serves prediction scores, feature influences and partial dependence
//! plots for the models of one project. Every request is answered from the
//! in-memory caches when possible, then from the persistent stores, and
//! otherwise by launching a remote job whose id is returned instead of data.
//!
//! Methods that may populate or invalidate caches take `&mut self`; the
//! processor is not meant to be shared between threads without external
//! synchronization.

mod influences;
mod ingest;
mod loading;
mod pdp;
mod predictions;

pub use influences::InfluenceQuery;
pub use pdp::PdpQuery;
pub use predictions::PredictionQuery;

use std::collections::HashMap;
use std::sync::Arc;

use crate::background::RealizedBackgroundDataSplitInfo;
use crate::cache::{CacheKey, IntelligenceProcessorCache, LruStats, ModelScoreTypeTuple};
use crate::client::{
    ArtifactMetadataClient, ExplanationConfigLoader, MetricConfigLoader, RequestContext,
};
use crate::config::ProcessorConfig;
use crate::dataset::{Dataset, SplitInfo};
use crate::derivation::ScoreTypeConverter;
use crate::error::{ProcessorError, ProcessorResult};
use crate::pdp::PartialDependenceCache;
use crate::pending::PendingOperations;
use crate::remote::{IngestionMode, ModelRunner};
use crate::storage::{ExplanationCacheStore, ModelPredictionCacheStore};
use crate::table::NumericTableCache;
use crate::types::ScoreType;

pub const MODEL_PREDICTION_CACHE: &str = "model_prediction_cache";
pub const FEATURE_INFLUENCE_CACHE: &str = "feature_influence_cache";
pub const PARTIAL_DEPENDENCE_CACHE: &str = "partial_dependence_cache";

const DEFAULT_PROJECT_ID: &str = "project";

/// Outcome of a cache build: the key of a complete cache, or launched jobs
enum CacheBuild<K> {
    Ready(K),
    Pending(PendingOperations),
}

/// Entries and memo counters of one cache type
#[derive(Debug, Clone, PartialEq)]
pub struct CacheTypeStats {
    pub cache_type: &'static str,
    pub entries: usize,
    pub memo: LruStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorCacheStats {
    pub model_predictions: CacheTypeStats,
    pub feature_influences: CacheTypeStats,
    pub partial_dependence: CacheTypeStats,
}

impl ProcessorCacheStats {
    pub fn total_entries(&self) -> usize {
        self.model_predictions.entries
            + self.feature_influences.entries
            + self.partial_dependence.entries
    }
}

pub struct IntelligenceProcessor {
    project_id: String,
    config: ProcessorConfig,
    converter: ScoreTypeConverter,

    model_prediction_caches: IntelligenceProcessorCache<ModelScoreTypeTuple, NumericTableCache>,
    feature_influence_caches: IntelligenceProcessorCache<CacheKey, NumericTableCache>,
    partial_dependence_plot_caches: IntelligenceProcessorCache<CacheKey, PartialDependenceCache>,

    datasets: HashMap<String, Dataset>,
    models: HashMap<String, Box<dyn ModelRunner>>,

    artifact_metadata_client: Arc<dyn ArtifactMetadataClient>,
    metric_config_loader: Arc<dyn MetricConfigLoader>,
    explanation_config_loader: Option<Arc<dyn ExplanationConfigLoader>>,
    model_prediction_cache_store: Option<Arc<dyn ModelPredictionCacheStore>>,
    explanation_cache_store: Option<Arc<dyn ExplanationCacheStore>>,
}

impl IntelligenceProcessor {
    pub fn new(
        project_id: Option<String>,
        config: ProcessorConfig,
        artifact_metadata_client: Arc<dyn ArtifactMetadataClient>,
        metric_config_loader: Arc<dyn MetricConfigLoader>,
    ) -> ProcessorResult<Self> {
        config.validate().map_err(ProcessorError::InvalidConfig)?;
        let memo_bytes = config.cache_size_limit_bytes;
        Ok(Self {
            project_id: project_id.unwrap_or_else(|| DEFAULT_PROJECT_ID.to_string()),
            converter: ScoreTypeConverter::new(config.enable_score_type_conversion),
            config,
            model_prediction_caches: IntelligenceProcessorCache::new(
                MODEL_PREDICTION_CACHE,
                memo_bytes,
            ),
            feature_influence_caches: IntelligenceProcessorCache::new(
                FEATURE_INFLUENCE_CACHE,
                memo_bytes,
            ),
            partial_dependence_plot_caches: IntelligenceProcessorCache::new(
                PARTIAL_DEPENDENCE_CACHE,
                memo_bytes,
            ),
            datasets: HashMap::new(),
            models: HashMap::new(),
            artifact_metadata_client,
            metric_config_loader,
            explanation_config_loader: None,
            model_prediction_cache_store: None,
            explanation_cache_store: None,
        })
    }

    pub fn with_explanation_config_loader(mut self, loader: Arc<dyn ExplanationConfigLoader>) -> Self {
        self.explanation_config_loader = Some(loader);
        self
    }

    pub fn with_model_prediction_cache_store(
        mut self,
        store: Arc<dyn ModelPredictionCacheStore>,
    ) -> Self {
        self.model_prediction_cache_store = Some(store);
        self
    }

    pub fn with_explanation_cache_store(mut self, store: Arc<dyn ExplanationCacheStore>) -> Self {
        self.explanation_cache_store = Some(store);
        self
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    // =========================================================================
    // Registry
    // =========================================================================

    pub fn add_dataset(&mut self, dataset: Dataset) {
        self.datasets.insert(dataset.id.clone(), dataset);
    }

    pub fn remove_dataset(&mut self, dataset_id: &str) -> Option<Dataset> {
        self.datasets.remove(dataset_id)
    }

    pub fn add_model(&mut self, model_id: impl Into<String>, model: Box<dyn ModelRunner>) {
        self.models.insert(model_id.into(), model);
    }

    pub fn get_model(&self, model_id: &str) -> ProcessorResult<&dyn ModelRunner> {
        self.models
            .get(model_id)
            .map(|model| model.as_ref())
            .ok_or_else(|| {
                ProcessorError::NotFound(format!(
                    "Model {} does not exist in project {}",
                    model_id, self.project_id
                ))
            })
    }

    pub fn get_model_keys(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn get_dataset_keys(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn get_dataset_by_id(&self, dataset_id: &str) -> ProcessorResult<&Dataset> {
        self.datasets.get(dataset_id).ok_or_else(|| {
            let mut available: Vec<&str> = self.get_dataset_keys().collect();
            available.sort_unstable();
            ProcessorError::NotFound(format!(
                "Data collection {} does not exist in project {}. Available data collections: {:?}",
                dataset_id, self.project_id, available
            ))
        })
    }

    pub fn get_dataset_id(&self, model_id: &str) -> ProcessorResult<Option<&str>> {
        Ok(self.get_model(model_id)?.dataset_id())
    }

    pub fn get_dataset(&self, model_id: &str) -> ProcessorResult<Option<&Dataset>> {
        match self.get_dataset_id(model_id)? {
            Some(dataset_id) => self.get_dataset_by_id(dataset_id).map(Some),
            None => Ok(None),
        }
    }

    fn dataset_for_model(&self, model_id: &str) -> ProcessorResult<&Dataset> {
        self.get_dataset(model_id)?.ok_or_else(|| {
            ProcessorError::NotFound(format!(
                "Model {} is not associated with a data collection",
                model_id
            ))
        })
    }

    fn split_for_model(&self, model_id: &str, split_id: &str) -> ProcessorResult<&SplitInfo> {
        self.dataset_for_model(model_id)?.get_split(split_id)
    }

    pub fn get_default_split_id_for_model(
        &self,
        ctx: &RequestContext,
        model_id: &str,
    ) -> ProcessorResult<String> {
        self.artifact_metadata_client
            .default_base_split_id_for_model(ctx, &self.project_id, model_id, true)?
            .ok_or_else(|| {
                ProcessorError::NotFound(format!("No default split for model {}", model_id))
            })
    }

    pub fn get_default_split_id(
        &self,
        ctx: &RequestContext,
        data_collection_id: &str,
        throw_if_not_found: bool,
    ) -> ProcessorResult<Option<String>> {
        let split_id = self.artifact_metadata_client.default_base_split_id(
            ctx,
            &self.project_id,
            data_collection_id,
            true,
        )?;
        if split_id.is_none() && throw_if_not_found {
            return Err(ProcessorError::NotFound(format!(
                "No default split for data collection {}",
                data_collection_id
            )));
        }
        Ok(split_id)
    }

    fn resolve_split_id(
        &self,
        ctx: &RequestContext,
        model_id: &str,
        split_id: Option<&str>,
    ) -> ProcessorResult<String> {
        match split_id {
            Some(split_id) => Ok(split_id.to_string()),
            None => self.get_default_split_id_for_model(ctx, model_id),
        }
    }

    fn default_score_type(&self, model_id: &str) -> ProcessorResult<ScoreType> {
        Ok(ScoreType::default_for_model(
            self.get_model(model_id)?.is_regression(),
        ))
    }

    fn resolve_score_type(
        &self,
        model_id: &str,
        score_type: Option<ScoreType>,
    ) -> ProcessorResult<ScoreType> {
        match score_type {
            Some(score_type) => Ok(score_type),
            None => self.default_score_type(model_id),
        }
    }

    /// Background split given by the caller, else the model's configured
    /// background split, else its default split.
    fn resolve_background(
        &self,
        ctx: &RequestContext,
        model_id: &str,
        background: Option<&RealizedBackgroundDataSplitInfo>,
    ) -> ProcessorResult<RealizedBackgroundDataSplitInfo> {
        if let Some(background) = background {
            return Ok(background.clone());
        }
        let configured = self.artifact_metadata_client.default_background_split_id(
            ctx,
            &self.project_id,
            model_id,
        )?;
        let split_id = match configured {
            Some(split_id) => split_id,
            None => self.get_default_split_id_for_model(ctx, model_id)?,
        };
        Ok(RealizedBackgroundDataSplitInfo::new(split_id))
    }

    fn ingestion_mode(&self) -> IngestionMode {
        IngestionMode::from_flag(self.config.use_data_service_write)
    }

    // =========================================================================
    // Validation
    // =========================================================================

    /// Check that `score_type` suits the model kind and the split's labels.
    pub fn validate_score_type(
        &self,
        dataset: &Dataset,
        split_id: &str,
        model_id: &str,
        score_type: ScoreType,
    ) -> ProcessorResult<()> {
        let is_regression = self.get_model(model_id)?.is_regression();
        if is_regression != score_type.is_regression() {
            let model_kind = if is_regression {
                "regression"
            } else {
                "classification"
            };
            return Err(ProcessorError::InvalidArgument(format!(
                "Score type {} is not supported for {} models",
                score_type, model_kind
            )));
        }
        if score_type.is_error() && !dataset.get_split(split_id)?.has_labels {
            return Err(ProcessorError::InvalidConfig(format!(
                "Error score types require splits with labels. Provided split: {}",
                split_id
            )));
        }
        Ok(())
    }

    /// Require a feature map when pre- and post-transform features differ.
    pub fn validate_feature_map(
        &self,
        ctx: &RequestContext,
        split: &SplitInfo,
        model_id: &str,
    ) -> ProcessorResult<()> {
        let feature_map = self.get_model(model_id)?.feature_map(ctx)?;
        let has_both_locators =
            split.pre_transform_locator.is_some() && split.post_transform_locator.is_some();
        if has_both_locators && feature_map.is_none() && !split.has_identical_feature_sets() {
            return Err(ProcessorError::InvalidArgument(
                "No feature map provided. A feature map is required when pre- and post-transform columns differ"
                    .to_string(),
            ));
        }
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Drop every cached artifact of `model_id`. Returns the number removed.
    pub fn invalidate_model(&mut self, model_id: &str) -> usize {
        let removed = self
            .model_prediction_caches
            .remove_matching(|key| key.model_id() == model_id)
            + self
                .feature_influence_caches
                .remove_matching(|key| key.model_id() == model_id)
            + self
                .partial_dependence_plot_caches
                .remove_matching(|key| key.model_id() == model_id);
        log::info!("Invalidated {} cache entries of model {}", removed, model_id);
        removed
    }

    /// Replace all caches with empty ones under a new identity. Memos are
    /// carried over; entries memoized for the old caches are never served.
    pub fn clear_caches(&mut self) {
        self.model_prediction_caches = IntelligenceProcessorCache::with_shared_memo(
            MODEL_PREDICTION_CACHE,
            self.model_prediction_caches.shared_memo(),
        );
        self.feature_influence_caches = IntelligenceProcessorCache::with_shared_memo(
            FEATURE_INFLUENCE_CACHE,
            self.feature_influence_caches.shared_memo(),
        );
        self.partial_dependence_plot_caches = IntelligenceProcessorCache::with_shared_memo(
            PARTIAL_DEPENDENCE_CACHE,
            self.partial_dependence_plot_caches.shared_memo(),
        );
        log::info!("Cleared caches of project {}", self.project_id);
    }

    pub fn cache_stats(&self) -> ProcessorCacheStats {
        ProcessorCacheStats {
            model_predictions: CacheTypeStats {
                cache_type: MODEL_PREDICTION_CACHE,
                entries: self.model_prediction_caches.len(),
                memo: self.model_prediction_caches.memo_stats(),
            },
            feature_influences: CacheTypeStats {
                cache_type: FEATURE_INFLUENCE_CACHE,
                entries: self.feature_influence_caches.len(),
                memo: self.feature_influence_caches.memo_stats(),
            },
            partial_dependence: CacheTypeStats {
                cache_type: PARTIAL_DEPENDENCE_CACHE,
                entries: self.partial_dependence_plot_caches.len(),
                memo: self.partial_dependence_plot_caches.memo_stats(),
            },
        }
    }
}

impl std::fmt::Debug for IntelligenceProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntelligenceProcessor")
            .field("project_id", &self.project_id)
            .field("config", &self.config)
            .field("models", &self.models.keys().collect::<Vec<_>>())
            .field("datasets", &self.datasets.keys().collect::<Vec<_>>())
            .finish()
    }
}
