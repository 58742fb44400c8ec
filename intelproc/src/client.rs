// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Project metadata collaborators
//!
//! The processor does not own project settings. Default splits, the
//! influence algorithm family, metric configuration and classification
//! thresholds are looked up through these traits on every request.

use serde::{Deserialize, Serialize};

use crate::error::ProcessorResult;
use crate::types::{ExplanationAlgorithmType, ScoreType};

/// Caller identity threaded through every collaborator call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    pub user_id: String,
    pub request_id: String,
}

impl RequestContext {
    pub fn new(user_id: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            request_id: request_id.into(),
        }
    }
}

/// Project-wide metric settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricConfig {
    /// Default score type; the source for derived score types
    pub score_type: ScoreType,
    /// Passed to launched jobs
    pub maximum_model_runner_failure_rate: f64,
}

impl Default for MetricConfig {
    fn default() -> Self {
        Self {
            score_type: ScoreType::Logits,
            maximum_model_runner_failure_rate: 0.0,
        }
    }
}

/// Explanation settings recorded alongside persisted influence caches
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationConfig {
    pub algorithm: ExplanationAlgorithmType,
    pub num_samples: usize,
    pub num_default_influences: usize,
}

impl Default for ExplanationConfig {
    fn default() -> Self {
        Self {
            algorithm: ExplanationAlgorithmType::Qii,
            num_samples: 100,
            num_default_influences: 1000,
        }
    }
}

pub trait MetricConfigLoader: Send + Sync {
    fn fetch_config(&self, ctx: &RequestContext, project_id: &str) -> ProcessorResult<MetricConfig>;
}

pub trait ExplanationConfigLoader: Send + Sync {
    fn fetch_config(
        &self,
        ctx: &RequestContext,
        project_id: &str,
    ) -> ProcessorResult<ExplanationConfig>;
}

/// Artifact metadata service
pub trait ArtifactMetadataClient: Send + Sync {
    /// Default base split of a model. With `infer` set, a split is inferred
    /// when none was configured explicitly.
    fn default_base_split_id_for_model(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        model_id: &str,
        infer: bool,
    ) -> ProcessorResult<Option<String>>;

    /// Default base split of a data collection.
    fn default_base_split_id(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        data_collection_id: &str,
        infer: bool,
    ) -> ProcessorResult<Option<String>>;

    /// True when the project's influence algorithm is in the SHAP family.
    fn is_shap_algorithm_type(&self, ctx: &RequestContext, project_id: &str)
        -> ProcessorResult<bool>;

    /// Threshold scores of `score_type` into classification decisions.
    fn classification_scores_for_model(
        &self,
        ctx: &RequestContext,
        project_id: &str,
        model_id: &str,
        score_type: ScoreType,
        values: &[f64],
    ) -> ProcessorResult<Vec<f64>>;

    /// Fail unless a model runner can accept work for `purpose`.
    fn validate_mrc_available(&self, ctx: &RequestContext, purpose: &str) -> ProcessorResult<()>;

    /// Background split configured for a model, if any.
    fn default_background_split_id(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        _model_id: &str,
    ) -> ProcessorResult<Option<String>> {
        Ok(None)
    }
}
