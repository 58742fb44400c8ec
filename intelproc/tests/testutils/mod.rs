//! Test utilities for intelproc integration tests
//!
//! Provides in-process fakes for the model runner, the artifact metadata
//! service and the metric config loader, plus a fixture that wires them
//! into an `IntelligenceProcessor` over a small classification dataset.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use intelproc::storage::SledCacheStore;
use intelproc::{
    ArtifactMetadataClient, Dataset, FeatureMap, IndexRange, IntelligenceProcessor, JobSpec,
    MetricConfig, MetricConfigLoader, ModelRunner, NumericTable, ProcessorConfig, ProcessorError,
    ProcessorResult, RealizedBackgroundDataSplitInfo, RequestContext, ScoreType, SplitInfo,
};

pub const PROJECT: &str = "project";
pub const DATASET: &str = "dc";
pub const MODEL: &str = "model";
pub const BASE_SPLIT: &str = "base";
pub const NUM_ROWS: usize = 10;

pub fn ctx() -> RequestContext {
    let _ = env_logger::builder().is_test(true).try_init();
    RequestContext::new("tester", "request-1")
}

pub fn features() -> Vec<String> {
    vec!["age".to_string(), "income".to_string()]
}

pub fn base_split() -> SplitInfo {
    SplitInfo::new(BASE_SPLIT, features(), NUM_ROWS).with_labels(true)
}

pub fn dataset_with(split: SplitInfo) -> Dataset {
    Dataset::new(DATASET).with_split(split)
}

// =========================================================================
// Fakes
// =========================================================================

/// Model runner that records launched jobs and synchronous calls
pub struct FakeRunner {
    pub dataset_id: Option<String>,
    pub regression: bool,
    pub feature_map: Option<FeatureMap>,
    pub launched: Arc<Mutex<Vec<JobSpec>>>,
    pub remote_calls: Arc<AtomicUsize>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self {
            dataset_id: Some(DATASET.to_string()),
            regression: false,
            feature_map: None,
            launched: Arc::new(Mutex::new(Vec::new())),
            remote_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn launch(&self, job: &JobSpec) -> ProcessorResult<String> {
        let mut launched = self.launched.lock();
        launched.push(job.clone());
        Ok(format!("job-{}", launched.len()))
    }
}

impl ModelRunner for FakeRunner {
    fn dataset_id(&self) -> Option<&str> {
        self.dataset_id.as_deref()
    }

    fn is_regression(&self) -> bool {
        self.regression
    }

    fn feature_map(&self, _ctx: &RequestContext) -> ProcessorResult<Option<FeatureMap>> {
        Ok(self.feature_map.clone())
    }

    fn launch_model_prediction_job(
        &self,
        _ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String> {
        self.launch(job)
    }

    fn launch_feature_influence_job(
        &self,
        _ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String> {
        self.launch(job)
    }

    fn launch_partial_dependence_plot_job(
        &self,
        _ctx: &RequestContext,
        job: &JobSpec,
    ) -> ProcessorResult<String> {
        self.launch(job)
    }

    fn compute_prediction_score_remote(
        &self,
        _ctx: &RequestContext,
        _score_type: ScoreType,
        _split: &SplitInfo,
        range: IndexRange,
        _include_system_data: bool,
    ) -> ProcessorResult<NumericTable> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        let values = (range.start..range.stop).map(|i| i as f64 / 10.0).collect();
        // Runners index their results from zero
        Ok(NumericTable::single_column("Result", 0, values))
    }

    fn compute_feature_influence_remote(
        &self,
        _ctx: &RequestContext,
        _score_type: ScoreType,
        dataset: &Dataset,
        split_id: &str,
        range: IndexRange,
        _background: &RealizedBackgroundDataSplitInfo,
        _include_system_data: bool,
    ) -> ProcessorResult<NumericTable> {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        let columns = dataset.get_split(split_id)?.feature_names.clone();
        let rows = (0..range.len()).map(|_| vec![0.25; columns.len()]).collect();
        NumericTable::from_rows((0..range.len()).collect(), columns, rows)
    }
}

/// Artifact metadata service with fixed answers
pub struct FakeMetadataClient {
    pub default_split: Option<String>,
    /// Answer to non-inferred default split lookups
    pub explicit_default_split: Option<String>,
    pub background_split: Option<String>,
    pub use_shap: bool,
    pub mrc_available: bool,
}

impl FakeMetadataClient {
    pub fn new() -> Self {
        Self {
            default_split: Some(BASE_SPLIT.to_string()),
            explicit_default_split: None,
            background_split: None,
            use_shap: false,
            mrc_available: true,
        }
    }
}

impl ArtifactMetadataClient for FakeMetadataClient {
    fn default_base_split_id_for_model(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        _model_id: &str,
        infer: bool,
    ) -> ProcessorResult<Option<String>> {
        if infer {
            Ok(self.default_split.clone())
        } else {
            Ok(self.explicit_default_split.clone())
        }
    }

    fn default_base_split_id(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        _data_collection_id: &str,
        _infer: bool,
    ) -> ProcessorResult<Option<String>> {
        Ok(self.default_split.clone())
    }

    fn is_shap_algorithm_type(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
    ) -> ProcessorResult<bool> {
        Ok(self.use_shap)
    }

    fn classification_scores_for_model(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        _model_id: &str,
        score_type: ScoreType,
        values: &[f64],
    ) -> ProcessorResult<Vec<f64>> {
        let threshold = match score_type {
            ScoreType::Probits => 0.5,
            _ => 0.0,
        };
        Ok(values
            .iter()
            .map(|&v| if v >= threshold { 1.0 } else { 0.0 })
            .collect())
    }

    fn validate_mrc_available(&self, _ctx: &RequestContext, purpose: &str) -> ProcessorResult<()> {
        if self.mrc_available {
            Ok(())
        } else {
            Err(ProcessorError::InvalidConfig(format!(
                "No model runner available for {}",
                purpose
            )))
        }
    }

    fn default_background_split_id(
        &self,
        _ctx: &RequestContext,
        _project_id: &str,
        _model_id: &str,
    ) -> ProcessorResult<Option<String>> {
        Ok(self.background_split.clone())
    }
}

pub struct FakeMetricLoader {
    pub score_type: ScoreType,
}

impl MetricConfigLoader for FakeMetricLoader {
    fn fetch_config(&self, _ctx: &RequestContext, _project_id: &str) -> ProcessorResult<MetricConfig> {
        Ok(MetricConfig {
            score_type: self.score_type,
            maximum_model_runner_failure_rate: 0.1,
        })
    }
}

// =========================================================================
// Fixture
// =========================================================================

/// Processor wired to fakes, with handles to inspect what they recorded
pub struct Fixture {
    pub processor: IntelligenceProcessor,
    pub launched: Arc<Mutex<Vec<JobSpec>>>,
    pub remote_calls: Arc<AtomicUsize>,
}

pub struct FixtureBuilder {
    pub config: ProcessorConfig,
    pub client: FakeMetadataClient,
    pub runner: FakeRunner,
    pub default_score_type: ScoreType,
    pub split: SplitInfo,
}

impl FixtureBuilder {
    pub fn new() -> Self {
        Self {
            config: ProcessorConfig::default(),
            client: FakeMetadataClient::new(),
            runner: FakeRunner::new(),
            default_score_type: ScoreType::Logits,
            split: base_split(),
        }
    }

    pub fn build(self) -> Fixture {
        let launched = Arc::clone(&self.runner.launched);
        let remote_calls = Arc::clone(&self.runner.remote_calls);
        let mut processor = IntelligenceProcessor::new(
            Some(PROJECT.to_string()),
            self.config,
            Arc::new(self.client),
            Arc::new(FakeMetricLoader {
                score_type: self.default_score_type,
            }),
        )
        .expect("valid processor config");
        processor.add_dataset(dataset_with(self.split));
        processor.add_model(MODEL, Box::new(self.runner));
        Fixture {
            processor,
            launched,
            remote_calls,
        }
    }
}

impl Fixture {
    pub fn new() -> Self {
        FixtureBuilder::new().build()
    }

    /// Attach `store` as both the prediction and the explanation store.
    pub fn with_store(mut self, store: Arc<SledCacheStore>) -> Self {
        self.processor = self
            .processor
            .with_model_prediction_cache_store(store.clone())
            .with_explanation_cache_store(store);
        self
    }

    pub fn launched_jobs(&self) -> Vec<JobSpec> {
        self.launched.lock().clone()
    }

    pub fn remote_call_count(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }
}
