// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! intelproc - prediction and explanation caching for model intelligence
//!
//! The [`IntelligenceProcessor`] answers requests for model prediction
//! scores, feature influences and partial dependence plots.
//!
//! # Features
//!
//! - **Keyed caches**: Per-artifact caches keyed by model, split, score type
//!   and background split
//! - **Bounded memoization**: Repeated reads are served from a byte-bounded
//!   LRU memo that never outlives the cache it was built for
//! - **Score derivation**: Probits are derived from logits (and back) without
//!   launching jobs, when enabled
//! - **Persistent hydration**: Caches are loaded from a store before any
//!   remote work is requested
//! - **Deferred results**: Misses launch remote jobs and report their ids
//!   through [`PendingOperationsOr`]
//!
//! # Usage
//!
//! ```ignore
//! let mut processor = IntelligenceProcessor::new(
//!     Some("project".to_string()),
//!     ProcessorConfig::default(),
//!     metadata_client,
//!     metric_config_loader,
//! )?;
//! processor.add_dataset(dataset);
//! processor.add_model("model", Box::new(runner));
//!
//! match processor.get_prediction_scores(&ctx, &PredictionQuery::new("model"))? {
//!     PendingOperationsOr::Value(table) => println!("{} rows", table.num_rows()),
//!     PendingOperationsOr::Operations(jobs) => println!("waiting on {:?}", jobs.job_ids()),
//! }
//! ```

pub mod background;
pub mod cache;
pub mod client;
pub mod config;
pub mod dataset;
pub mod derivation;
pub mod error;
pub mod metadata;
pub mod pdp;
pub mod pending;
pub mod processor;
pub mod remote;
pub mod storage;
pub mod table;
pub mod types;

pub use background::RealizedBackgroundDataSplitInfo;
pub use cache::{CacheKey, ModelScoreTypeTuple};
pub use client::{
    ArtifactMetadataClient, ExplanationConfig, ExplanationConfigLoader, MetricConfig,
    MetricConfigLoader, RequestContext,
};
pub use config::ProcessorConfig;
pub use dataset::{Dataset, SplitInfo};
pub use derivation::ScoreTypeConverter;
pub use error::{ProcessorError, ProcessorResult};
pub use pdp::PartialDependenceCache;
pub use pending::{PendingOperations, PendingOperationsOr};
pub use processor::{
    InfluenceQuery, IntelligenceProcessor, PdpQuery, PredictionQuery, ProcessorCacheStats,
};
pub use remote::{FeatureMap, IndexRange, IngestionMode, JobSpec, ModelRunner, OperationType};
pub use table::{NumericTable, NumericTableCache, SystemData, PREDICTION_COLUMN};
pub use types::{ExplanationAlgorithmType, ExplanationCacheType, ScoreType};

/// intelproc version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// intelproc crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
