// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Out-of-process model runner interface and job requests

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::background::RealizedBackgroundDataSplitInfo;
use crate::client::RequestContext;
use crate::dataset::{Dataset, SplitInfo};
use crate::error::ProcessorResult;
use crate::table::NumericTable;
use crate::types::ScoreType;

/// Raw feature name -> processed feature names derived from it
pub type FeatureMap = HashMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    ModelPrediction,
    FeatureInfluence,
    PartialDependencePlot,
}

impl std::fmt::Display for OperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            OperationType::ModelPrediction => "model_prediction",
            OperationType::FeatureInfluence => "feature_influence",
            OperationType::PartialDependencePlot => "partial_dependence_plot",
        };
        write!(f, "{}", name)
    }
}

/// Half-open record range `[start, stop)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexRange {
    pub start: usize,
    pub stop: usize,
}

impl IndexRange {
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    pub fn single(index: usize) -> Self {
        Self::new(index, index + 1)
    }

    pub fn len(&self) -> usize {
        self.stop.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Display for IndexRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.stop)
    }
}

/// Where a job writes its results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestionMode {
    /// Runner writes cache files that the processor loads later
    CacheFiles,
    /// Runner writes through the data service
    DataServiceWrite,
}

impl IngestionMode {
    pub fn from_flag(use_data_service_write: bool) -> Self {
        if use_data_service_write {
            IngestionMode::DataServiceWrite
        } else {
            IngestionMode::CacheFiles
        }
    }
}

/// Request for an asynchronous remote computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub operation: OperationType,
    pub project_id: String,
    pub model_id: String,
    pub data_collection_id: String,
    pub split_id: String,
    pub score_type: ScoreType,
    pub range: IndexRange,
    pub background: Option<RealizedBackgroundDataSplitInfo>,
    pub maximum_model_runner_failure_rate: f64,
    pub ingestion: IngestionMode,
    /// Sweep points per feature; partial dependence jobs only
    pub num_xs: Option<usize>,
}

impl JobSpec {
    pub fn new(
        operation: OperationType,
        project_id: impl Into<String>,
        model_id: impl Into<String>,
        data_collection_id: impl Into<String>,
        split_id: impl Into<String>,
        score_type: ScoreType,
        range: IndexRange,
    ) -> Self {
        Self {
            operation,
            project_id: project_id.into(),
            model_id: model_id.into(),
            data_collection_id: data_collection_id.into(),
            split_id: split_id.into(),
            score_type,
            range,
            background: None,
            maximum_model_runner_failure_rate: 0.0,
            ingestion: IngestionMode::CacheFiles,
            num_xs: None,
        }
    }

    pub fn with_background(mut self, background: RealizedBackgroundDataSplitInfo) -> Self {
        self.background = Some(background);
        self
    }

    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        self.maximum_model_runner_failure_rate = rate;
        self
    }

    pub fn with_ingestion(mut self, ingestion: IngestionMode) -> Self {
        self.ingestion = ingestion;
        self
    }

    pub fn with_num_xs(mut self, num_xs: usize) -> Self {
        self.num_xs = Some(num_xs);
        self
    }
}

/// Handle to a registered model and the runner that can execute it.
///
/// Launch methods return an opaque job id immediately; completion is
/// observed elsewhere and its output is added back through the processor's
/// ingestion methods.
pub trait ModelRunner: Send + Sync {
    /// Data collection the model was registered against, if any
    fn dataset_id(&self) -> Option<&str>;

    fn is_regression(&self) -> bool;

    fn feature_map(&self, ctx: &RequestContext) -> ProcessorResult<Option<FeatureMap>>;

    fn launch_model_prediction_job(&self, ctx: &RequestContext, job: &JobSpec)
        -> ProcessorResult<String>;

    fn launch_feature_influence_job(
        &self,
        ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String>;

    fn launch_partial_dependence_plot_job(
        &self,
        ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String>;

    /// Score `range` of `split` synchronously. The returned table has one
    /// column, named `Result` or [`crate::PREDICTION_COLUMN`].
    fn compute_prediction_score_remote(
        &self,
        ctx: &RequestContext,
        score_type: ScoreType,
        split: &SplitInfo,
        range: IndexRange,
        include_system_data: bool,
    ) -> ProcessorResult<NumericTable>;

    /// Compute influences for `range` synchronously; one column per feature.
    #[allow(clippy::too_many_arguments)]
    fn compute_feature_influence_remote(
        &self,
        ctx: &RequestContext,
        score_type: ScoreType,
        dataset: &Dataset,
        split_id: &str,
        range: IndexRange,
        background: &RealizedBackgroundDataSplitInfo,
        include_system_data: bool,
    ) -> ProcessorResult<NumericTable>;
}
