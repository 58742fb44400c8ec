// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Project manifest and the offline services built from it
//!
//! The manifest stands in for the artifact metadata service and the metric
//! configuration store. Jobs are never executed here; they are queued in the
//! cache store for an external runner.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use intelproc::storage::SledCacheStore;
use intelproc::{
    ArtifactMetadataClient, Dataset, FeatureMap, IndexRange, JobSpec, MetricConfig,
    MetricConfigLoader, ModelRunner, NumericTable, ProcessorConfig, ProcessorError,
    ProcessorResult, RealizedBackgroundDataSplitInfo, RequestContext, ScoreType, SplitInfo,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub id: String,
    pub dataset_id: Option<String>,
    #[serde(default)]
    pub regression: bool,
    /// Explicitly configured default split
    #[serde(default)]
    pub default_split: Option<String>,
    #[serde(default)]
    pub background_split: Option<String>,
    #[serde(default)]
    pub feature_map: Option<FeatureMap>,
    /// Probit threshold for classification decisions
    #[serde(default = "default_threshold")]
    pub classification_threshold: f64,
}

fn default_threshold() -> f64 {
    0.5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectManifest {
    pub project_id: String,
    #[serde(default)]
    pub config: ProcessorConfig,
    #[serde(default)]
    pub metric: MetricConfig,
    /// Project influence algorithm is in the SHAP family
    #[serde(default)]
    pub shap: bool,
    /// A model runner can accept work
    #[serde(default = "default_true")]
    pub model_runner_available: bool,
    #[serde(default)]
    pub datasets: Vec<Dataset>,
    #[serde(default)]
    pub models: Vec<ModelManifest>,
}

fn default_true() -> bool {
    true
}

impl ProjectManifest {
    pub fn from_file<P: AsRef<Path>>(path: P) -> ProcessorResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ProcessorError::InvalidConfig(format!("Cannot read manifest {:?}: {}", path, e))
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    fn model(&self, model_id: &str) -> ProcessorResult<&ModelManifest> {
        self.models
            .iter()
            .find(|model| model.id == model_id)
            .ok_or_else(|| ProcessorError::NotFound(format!("Model {} not in manifest", model_id)))
    }

    /// First split of the model's dataset, used when no default is configured.
    fn inferred_split(&self, model: &ModelManifest) -> Option<String> {
        let dataset_id = model.dataset_id.as_deref()?;
        self.datasets
            .iter()
            .find(|dataset| dataset.id == dataset_id)?
            .split_ids()
            .next()
            .map(str::to_string)
    }
}

/// Metadata and metric services answered from the manifest
pub struct ManifestServices {
    manifest: Arc<ProjectManifest>,
}

impl ManifestServices {
    pub fn new(manifest: Arc<ProjectManifest>) -> Self {
        Self { manifest }
    }
}

impl ArtifactMetadataClient for ManifestServices {
    fn default_base_split_id_for_model(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        model_id: &str,
        infer: bool,
    ) -> ProcessorResult<Option<String>> {
        let model = self.manifest.model(model_id)?;
        match &model.default_split {
            Some(split_id) => Ok(Some(split_id.clone())),
            None if infer => Ok(self.manifest.inferred_split(model)),
            None => Ok(None),
        }
    }

    fn default_base_split_id(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        data_collection_id: &str,
        _infer: bool,
    ) -> ProcessorResult<Option<String>> {
        Ok(self
            .manifest
            .datasets
            .iter()
            .find(|dataset| dataset.id == data_collection_id)
            .and_then(|dataset| dataset.split_ids().next().map(str::to_string)))
    }

    fn is_shap_algorithm_type(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
    ) -> ProcessorResult<bool> {
        Ok(self.manifest.shap)
    }

    fn classification_scores_for_model(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        model_id: &str,
        score_type: ScoreType,
        values: &[f64],
    ) -> ProcessorResult<Vec<f64>> {
        let probit_threshold = self.manifest.model(model_id)?.classification_threshold;
        let threshold = match score_type {
            ScoreType::Probits => probit_threshold,
            ScoreType::Logits => intelproc::derivation::logit(probit_threshold),
            other => {
                return Err(ProcessorError::InvalidArgument(format!(
                    "Cannot threshold {} scores",
                    other
                )))
            }
        };
        Ok(values
            .iter()
            .map(|&value| if value >= threshold { 1.0 } else { 0.0 })
            .collect())
    }

    fn validate_mrc_available(&self, _ctx: &RequestContext, purpose: &str) -> ProcessorResult<()> {
        if self.manifest.model_runner_available {
            Ok(())
        } else {
            Err(ProcessorError::InvalidConfig(format!(
                "No model runner is configured; cannot compute {}",
                purpose
            )))
        }
    }

    fn default_background_split_id(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        model_id: &str,
    ) -> ProcessorResult<Option<String>> {
        Ok(self.manifest.model(model_id)?.background_split.clone())
    }
}

impl MetricConfigLoader for ManifestServices {
    fn fetch_config(&self, _ctx: &RequestContext, _project_id: &str) -> ProcessorResult<MetricConfig> {
        Ok(self.manifest.metric.clone())
    }
}

/// Runner that queues jobs in the cache store instead of executing them
pub struct QueueingRunner {
    model: ModelManifest,
    store: Arc<SledCacheStore>,
}

impl QueueingRunner {
    pub fn new(model: ModelManifest, store: Arc<SledCacheStore>) -> Self {
        Self { model, store }
    }

    fn queue(&self, job: &JobSpec) -> ProcessorResult<String> {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.store.queue_job(&job_id, job)?;
        log::info!("Queued {} job {} for model {}", job.operation, job_id, job.model_id);
        Ok(job_id)
    }

    fn offline(&self) -> ProcessorError {
        ProcessorError::RemoteModel(format!(
            "Model {} has no live runner; only queued jobs are supported",
            self.model.id
        ))
    }
}

impl ModelRunner for QueueingRunner {
    fn dataset_id(&self) -> Option<&str> {
        self.model.dataset_id.as_deref()
    }

    fn is_regression(&self) -> bool {
        self.model.regression
    }

    fn feature_map(&self, _ctx: &RequestContext) -> ProcessorResult<Option<FeatureMap>> {
        Ok(self.model.feature_map.clone())
    }

    fn launch_model_prediction_job(
        &self,
        _ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String> {
        self.queue(job)
    }

    fn launch_feature_influence_job(
        &self,
        _ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String> {
        self.queue(job)
    }

    fn launch_partial_dependence_plot_job(
        &self,
        _ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String> {
        self.queue(job)
    }

    fn compute_prediction_score_remote(
        &self,
        _ctx: &RequestContext,
        _score_type: ScoreType,
        _split: &SplitInfo,
        _range: IndexRange,
        _include_system_data: bool,
    ) -> ProcessorResult<NumericTable> {
        Err(self.offline())
    }

    fn compute_feature_influence_remote(
        &self,
        _ctx: &RequestContext,
        _score_type: ScoreType,
        _dataset: &Dataset,
        _split_id: &str,
        _range: IndexRange,
        _background: &RealizedBackgroundDataSplitInfo,
        _include_system_data: bool,
    ) -> ProcessorResult<NumericTable> {
        Err(self.offline())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MANIFEST: &str = r#"{
        "project_id": "credit",
        "metric": { "score_type": "probits", "maximum_model_runner_failure_rate": 0.05 },
        "datasets": [
            { "id": "loans", "splits": {
                "train": { "id": "train", "feature_names": ["age"], "processed_feature_names": ["age"], "num_inputs": 3 }
            } }
        ],
        "models": [ { "id": "gbm", "dataset_id": "loans" } ]
    }"#;

    fn services() -> ManifestServices {
        let manifest: ProjectManifest = serde_json::from_str(MANIFEST).unwrap();
        ManifestServices::new(Arc::new(manifest))
    }

    #[test]
    fn test_manifest_defaults() {
        let manifest: ProjectManifest = serde_json::from_str(MANIFEST).unwrap();
        assert!(manifest.model_runner_available);
        assert!(!manifest.shap);
        assert_eq!(manifest.config, ProcessorConfig::default());
        assert_eq!(manifest.models[0].classification_threshold, 0.5);
    }

    #[test]
    fn test_default_split_inferred_only_on_request() {
        let services = services();
        let ctx = RequestContext::new("cli", "test");
        assert_eq!(
            services
                .default_base_split_id_for_model(&ctx, "credit", "gbm", true)
                .unwrap(),
            Some("train".to_string())
        );
        assert_eq!(
            services
                .default_base_split_id_for_model(&ctx, "credit", "gbm", false)
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_logit_threshold_matches_probit_threshold() {
        let services = services();
        let ctx = RequestContext::new("cli", "test");
        let decisions = services
            .classification_scores_for_model(&ctx, "credit", "gbm", ScoreType::Logits, &[-0.1, 0.1])
            .unwrap();
        assert_eq!(decisions, vec![0.0, 1.0]);
    }

    #[test]
    fn test_queueing_runner_records_jobs() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = Arc::new(SledCacheStore::open(dir.path()).unwrap());
        let manifest: ProjectManifest = serde_json::from_str(MANIFEST).unwrap();
        let runner = QueueingRunner::new(manifest.models[0].clone(), Arc::clone(&store));
        let ctx = RequestContext::new("cli", "test");
        let job = JobSpec::new(
            intelproc::OperationType::ModelPrediction,
            "credit",
            "gbm",
            "loans",
            "train",
            ScoreType::Probits,
            IndexRange::new(0, 3),
        );

        let job_id = runner.launch_model_prediction_job(&ctx, &job).unwrap();

        let queued = store.queued_jobs().unwrap();
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].job_id, job_id);
        assert_eq!(queued[0].spec, job);
    }
}
