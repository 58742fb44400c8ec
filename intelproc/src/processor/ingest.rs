// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Ingestion of job results into the in-memory caches

use super::IntelligenceProcessor;
use crate::cache::{CacheKey, ModelScoreTypeTuple};
use crate::error::{ProcessorError, ProcessorResult};
use crate::pdp::PartialDependenceCache;
use crate::table::{NumericTable, NumericTableCache, PREDICTION_COLUMN};
use crate::types::ScoreType;

impl IntelligenceProcessor {
    /// Cache prediction rows produced by a finished job. Classification
    /// decisions are derived on read and never cached.
    pub fn add_prediction_results(
        &mut self,
        model_id: &str,
        split_id: &str,
        score_type: ScoreType,
        table: &NumericTable,
    ) -> ProcessorResult<()> {
        if score_type == ScoreType::Classification {
            return Err(ProcessorError::InvalidArgument(
                "Classification predictions are derived and cannot be cached".to_string(),
            ));
        }
        let split = self.split_for_model(model_id, split_id)?.clone();
        let key = ModelScoreTypeTuple::new(model_id, split_id, score_type)?;
        log::debug!("Adding {} prediction rows to {}", table.num_rows(), key);
        self.model_prediction_caches.with_checked_out(
            &key,
            || {
                NumericTableCache::new(
                    vec![PREDICTION_COLUMN.to_string()],
                    split.unique_id_column_name.clone(),
                    split.timestamp_column_name.clone(),
                )
            },
            |cache| cache.insert_table(table),
        )
    }

    /// Cache influence rows produced by a finished job.
    pub fn add_feature_influences(
        &mut self,
        key: &CacheKey,
        table: &NumericTable,
    ) -> ProcessorResult<()> {
        key.require_algorithm_type()?;
        let split = self.split_for_model(key.model_id(), key.split_id())?.clone();
        log::debug!("Adding {} influence rows to {}", table.num_rows(), key);
        self.feature_influence_caches.with_checked_out(
            key,
            || {
                NumericTableCache::new(
                    split.feature_names.clone(),
                    split.unique_id_column_name.clone(),
                    split.timestamp_column_name.clone(),
                )
            },
            |cache| cache.insert_table(table),
        )
    }

    /// Cache partial dependence curves, merging them into any curves
    /// already cached under `key`.
    pub fn add_partial_dependence(&mut self, key: CacheKey, pdp: PartialDependenceCache) {
        let num_points = pdp.num_points;
        self.partial_dependence_plot_caches.with_checked_out(
            &key,
            || PartialDependenceCache::new(num_points),
            |cached| {
                for feature in &pdp.features {
                    if let (Some(xs), Some(ys)) = (pdp.xs.get(feature), pdp.ys.get(feature)) {
                        cached.insert_feature(feature.clone(), xs.clone(), ys.clone());
                    }
                }
                cached.num_points = num_points;
            },
        );
    }
}
