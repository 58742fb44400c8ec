// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Partial dependence plot retrieval

use std::sync::Arc;

use super::{CacheBuild, IntelligenceProcessor};
use crate::background::RealizedBackgroundDataSplitInfo;
use crate::cache::CacheKey;
use crate::client::RequestContext;
use crate::error::{ProcessorError, ProcessorResult};
use crate::pdp::PartialDependenceCache;
use crate::pending::{PendingOperations, PendingOperationsOr};
use crate::remote::{IndexRange, JobSpec, OperationType};
use crate::types::ScoreType;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PdpQuery {
    pub model_id: String,
    /// Defaults to the model's background split
    pub background: Option<RealizedBackgroundDataSplitInfo>,
    pub score_type: Option<ScoreType>,
}

impl PdpQuery {
    pub fn new(model_id: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            ..Default::default()
        }
    }

    pub fn with_background(mut self, background: RealizedBackgroundDataSplitInfo) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_score_type(mut self, score_type: ScoreType) -> Self {
        self.score_type = Some(score_type);
        self
    }
}

impl IntelligenceProcessor {
    /// Partial dependence plots of a model over its background split, or
    /// the job launched to compute them.
    pub fn get_pdp(
        &mut self,
        ctx: &RequestContext,
        query: &PdpQuery,
    ) -> ProcessorResult<PendingOperationsOr<Arc<PartialDependenceCache>>> {
        let model_id = query.model_id.as_str();
        let score_type = self.resolve_score_type(model_id, query.score_type)?;
        if score_type.is_error() {
            return Err(ProcessorError::InvalidArgument(format!(
                "Partial dependence plots are not available for error score type {}",
                score_type
            )));
        }
        let background = self.resolve_background(ctx, model_id, query.background.as_ref())?;

        let key = match self.build_pdp_cache(ctx, model_id, &background, score_type)? {
            CacheBuild::Ready(key) => key,
            CacheBuild::Pending(operations) => {
                return Ok(PendingOperationsOr::from_operations(operations))
            }
        };
        self.partial_dependence_plot_caches
            .get_without_modifying(&key)
            .map(PendingOperationsOr::from_value)
            .ok_or_else(|| {
                ProcessorError::Internal(format!("Partial dependence cache {} disappeared", key))
            })
    }

    fn build_pdp_cache(
        &mut self,
        ctx: &RequestContext,
        model_id: &str,
        background: &RealizedBackgroundDataSplitInfo,
        score_type: ScoreType,
    ) -> ProcessorResult<CacheBuild<CacheKey>> {
        let key = CacheKey::partial_dependence(model_id, background, score_type)?;
        if self.partial_dependence_plot_caches.contains(&key) {
            return Ok(CacheBuild::Ready(key));
        }
        if self.load_pdp_cache(ctx, &key)? {
            return Ok(CacheBuild::Ready(key));
        }

        self.artifact_metadata_client
            .validate_mrc_available(ctx, "partial dependence plots")?;
        log::info!(
            "Building pdp cache: {}, {}, {}",
            model_id,
            background,
            score_type
        );
        let dataset = self.dataset_for_model(model_id)?;
        let num_inputs = dataset.get_split(&background.id)?.num_inputs;
        let failure_rate = self
            .metric_config_loader
            .fetch_config(ctx, &self.project_id)?
            .maximum_model_runner_failure_rate;
        let job = JobSpec::new(
            OperationType::PartialDependencePlot,
            self.project_id.as_str(),
            model_id,
            dataset.id.as_str(),
            background.id.as_str(),
            score_type,
            IndexRange::new(0, num_inputs),
        )
        .with_background(background.clone())
        .with_failure_rate(failure_rate)
        .with_ingestion(self.ingestion_mode())
        .with_num_xs(self.config.pdp_num_xs);
        let job_id = self
            .get_model(model_id)?
            .launch_partial_dependence_plot_job(ctx, &job)?;
        log::info!("Launched partial dependence job: {}", job_id);
        Ok(CacheBuild::Pending(PendingOperations::single(job_id)))
    }
}
