// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Caching layer
//!
//! This module provides:
//! - A byte-bounded LRU used to memoize non-destructive reads
//! - The generic keyed cache owned by the processor for predictions,
//!   feature influences and partial dependence plots
//! - The composite keys identifying cached artifacts

pub mod keys;
pub mod lru;
pub mod processor_cache;

pub use keys::{CacheKey, ModelScoreTypeTuple, PDP_SPLIT_PLACEHOLDER};
pub use lru::{ByteBoundedLru, LruStats};
pub use processor_cache::{
    new_shared_memo, CacheIdentity, IntelligenceProcessorCache, MemoKey, SharedMemo,
};

/// Default memo budget: 5e8 bytes
pub const DEFAULT_CACHE_SIZE_LIMIT_BYTES: usize = 500_000_000;

/// Values stored in a processor cache
pub trait CacheValue: std::fmt::Debug + Clone + Send + Sync {
    /// Approximate heap footprint. Evaluated once, when a value is memoized.
    fn size_bytes(&self) -> usize;
}
