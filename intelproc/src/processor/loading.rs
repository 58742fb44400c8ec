// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Hydration of in-memory caches from the persistent stores

use super::IntelligenceProcessor;
use crate::background::RealizedBackgroundDataSplitInfo;
use crate::cache::{CacheKey, ModelScoreTypeTuple};
use crate::client::RequestContext;
use crate::dataset::SplitInfo;
use crate::error::ProcessorResult;
use crate::metadata::{ExplanationCacheMetadata, ModelPredictionCacheMetadata};
use crate::table::{NumericTableCache, PREDICTION_COLUMN};
use crate::types::{ExplanationCacheType, ScoreType};

fn empty_table_cache(columns: Vec<String>, split: &SplitInfo) -> NumericTableCache {
    NumericTableCache::new(
        columns,
        split.unique_id_column_name.clone(),
        split.timestamp_column_name.clone(),
    )
}

impl IntelligenceProcessor {
    pub(super) fn model_prediction_cache_metadata(
        &self,
        model_id: &str,
        split_id: &str,
        score_type: ScoreType,
    ) -> ModelPredictionCacheMetadata {
        ModelPredictionCacheMetadata {
            project_id: self.project_id.clone(),
            model_id: model_id.to_string(),
            split_id: split_id.to_string(),
            score_type,
        }
    }

    /// Describe an explanation cache, recording the explanation settings in
    /// effect when a loader is configured.
    pub(super) fn explanation_cache_metadata(
        &self,
        ctx: &RequestContext,
        model_id: &str,
        split_id: &str,
        background_data_split_id: Option<&str>,
        score_type: ScoreType,
        explanation_cache_type: ExplanationCacheType,
    ) -> ProcessorResult<ExplanationCacheMetadata> {
        let config = match &self.explanation_config_loader {
            Some(loader) => Some(loader.fetch_config(ctx, &self.project_id)?),
            None => None,
        };
        Ok(ExplanationCacheMetadata {
            project_id: self.project_id.clone(),
            model_id: model_id.to_string(),
            split_id: split_id.to_string(),
            score_type,
            explanation_cache_type,
            background_data_split_id: background_data_split_id.map(str::to_string),
            config,
        })
    }

    /// Merge persisted predictions into the prediction cache, creating it
    /// if absent. Without a store this is a no-op.
    pub(super) fn load_model_prediction_cache(
        &mut self,
        ctx: &RequestContext,
        model_id: &str,
        split_id: &str,
        score_type: ScoreType,
    ) -> ProcessorResult<()> {
        let Some(store) = self.model_prediction_cache_store.clone() else {
            return Ok(());
        };
        let split = self.split_for_model(model_id, split_id)?.clone();
        let metadata = self.model_prediction_cache_metadata(model_id, split_id, score_type);
        let key = ModelScoreTypeTuple::new(model_id, split_id, score_type)?;
        log::debug!("Loading prediction cache {}", key);
        self.model_prediction_caches.with_checked_out(
            &key,
            || empty_table_cache(vec![PREDICTION_COLUMN.to_string()], &split),
            |cache| store.load_cache(cache, &metadata, ctx),
        )
    }

    /// Merge persisted influences into the influence cache at `key`.
    pub(super) fn load_fi_cache(
        &mut self,
        ctx: &RequestContext,
        model_id: &str,
        split: &SplitInfo,
        background: &RealizedBackgroundDataSplitInfo,
        score_type: ScoreType,
        key: &CacheKey,
    ) -> ProcessorResult<()> {
        let Some(store) = self.explanation_cache_store.clone() else {
            return Ok(());
        };
        let cache_type = key.require_algorithm_type()?;
        let background_is_default_split = self
            .artifact_metadata_client
            .default_base_split_id_for_model(ctx, &self.project_id, model_id, false)?
            .is_none();
        let metadata = self.explanation_cache_metadata(
            ctx,
            model_id,
            &split.id,
            Some(&background.id),
            score_type,
            cache_type,
        )?;
        log::debug!("Loading feature influence cache {}", key);
        self.feature_influence_caches.with_checked_out(
            key,
            || empty_table_cache(split.feature_names.clone(), split),
            |cache| {
                store.load_feature_influence_cache(
                    ctx,
                    cache,
                    &metadata,
                    background_is_default_split,
                    split.updated_on,
                )
            },
        )
    }

    /// Load the persisted partial dependence cache at `key`. Returns whether
    /// one was found.
    pub(super) fn load_pdp_cache(
        &mut self,
        ctx: &RequestContext,
        key: &CacheKey,
    ) -> ProcessorResult<bool> {
        let Some(store) = self.explanation_cache_store.clone() else {
            return Ok(false);
        };
        let metadata = self.explanation_cache_metadata(
            ctx,
            key.model_id(),
            key.background_data_split_id(),
            Some(key.background_data_split_id()),
            key.score_type(),
            ExplanationCacheType::PartialDependence,
        )?;
        match store.load_partial_dependence_plot_cache(ctx, &metadata)? {
            Some(pdp) => {
                log::debug!("Loaded partial dependence cache {}", key);
                self.partial_dependence_plot_caches.add(key.clone(), pdp);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
