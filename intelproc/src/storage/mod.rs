// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Persistent cache stores
//!
//! The processor hydrates empty or partial in-memory caches from these
//! stores before launching remote jobs.

#[cfg(feature = "sled-backend")]
pub mod sled_store;

#[cfg(feature = "sled-backend")]
pub use sled_store::{QueuedJob, SledCacheStore};

use chrono::{DateTime, Utc};

use crate::client::RequestContext;
use crate::error::ProcessorResult;
use crate::metadata::{ExplanationCacheMetadata, ModelPredictionCacheMetadata};
use crate::pdp::PartialDependenceCache;
use crate::table::NumericTableCache;

pub trait ModelPredictionCacheStore: Send + Sync {
    /// Merge persisted predictions described by `metadata` into `cache`.
    fn load_cache(
        &self,
        cache: &mut NumericTableCache,
        metadata: &ModelPredictionCacheMetadata,
        ctx: &RequestContext,
    ) -> ProcessorResult<()>;
}

pub trait ExplanationCacheStore: Send + Sync {
    /// Merge persisted influences into `cache`.
    ///
    /// When `background_is_default_split` is set, influences saved without
    /// a background split are acceptable. Influences of error score types
    /// older than `split_updated_on` are skipped.
    fn load_feature_influence_cache(
        &self,
        ctx: &RequestContext,
        cache: &mut NumericTableCache,
        metadata: &ExplanationCacheMetadata,
        background_is_default_split: bool,
        split_updated_on: DateTime<Utc>,
    ) -> ProcessorResult<()>;

    fn load_partial_dependence_plot_cache(
        &self,
        ctx: &RequestContext,
        metadata: &ExplanationCacheMetadata,
    ) -> ProcessorResult<Option<PartialDependenceCache>>;
}
