// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Sled-backed cache store
//!
//! Records are bincode-encoded with a trailing little-endian CRC32 of the
//! encoded bytes.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{ExplanationCacheStore, ModelPredictionCacheStore};
use crate::client::RequestContext;
use crate::error::{ProcessorError, ProcessorResult};
use crate::metadata::{ExplanationCacheMetadata, ModelPredictionCacheMetadata};
use crate::pdp::PartialDependenceCache;
use crate::remote::JobSpec;
use crate::table::NumericTableCache;

const PREDICTIONS_TREE: &str = "predictions";
const EXPLANATIONS_TREE: &str = "explanations";
const PARTIAL_DEPENDENCE_TREE: &str = "partial_dependence";
const JOBS_TREE: &str = "jobs";

const CHECKSUM_LEN: usize = 4;

/// Job waiting for a runner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: String,
    pub spec: JobSpec,
    pub queued_at: DateTime<Utc>,
}

fn encode_record<T: Serialize>(value: &T) -> ProcessorResult<Vec<u8>> {
    let mut buffer = bincode::serialize(value)?;
    let checksum = crc32fast::hash(&buffer);
    buffer.extend_from_slice(&checksum.to_le_bytes());
    Ok(buffer)
}

fn decode_record<T: DeserializeOwned>(key: &str, data: &[u8]) -> ProcessorResult<T> {
    if data.len() < CHECKSUM_LEN {
        return Err(ProcessorError::Storage(format!(
            "Record {} is truncated",
            key
        )));
    }
    let (payload, trailer) = data.split_at(data.len() - CHECKSUM_LEN);
    let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    if crc32fast::hash(payload) != expected {
        log::warn!("Checksum mismatch for cache record {}", key);
        return Err(ProcessorError::Storage(format!(
            "Checksum mismatch for record {}",
            key
        )));
    }
    Ok(bincode::deserialize(payload)?)
}

/// Cache store over an embedded sled database
pub struct SledCacheStore {
    db: sled::Db,
    predictions: sled::Tree,
    explanations: sled::Tree,
    partial_dependence: sled::Tree,
    jobs: sled::Tree,
}

impl SledCacheStore {
    pub fn open<P: AsRef<Path>>(path: P) -> ProcessorResult<Self> {
        let db = sled::open(path)?;
        Ok(Self {
            predictions: db.open_tree(PREDICTIONS_TREE)?,
            explanations: db.open_tree(EXPLANATIONS_TREE)?,
            partial_dependence: db.open_tree(PARTIAL_DEPENDENCE_TREE)?,
            jobs: db.open_tree(JOBS_TREE)?,
            db,
        })
    }

    fn get_record<T: DeserializeOwned>(
        tree: &sled::Tree,
        key: &str,
    ) -> ProcessorResult<Option<T>> {
        match tree.get(key.as_bytes())? {
            Some(data) => Ok(Some(decode_record(key, &data)?)),
            None => Ok(None),
        }
    }

    fn put_record<T: Serialize>(tree: &sled::Tree, key: &str, value: &T) -> ProcessorResult<()> {
        tree.insert(key.as_bytes(), encode_record(value)?)?;
        Ok(())
    }

    pub fn save_prediction_cache(
        &self,
        metadata: &ModelPredictionCacheMetadata,
        cache: &NumericTableCache,
    ) -> ProcessorResult<()> {
        let key = metadata.storage_key();
        log::debug!("Saving prediction cache {} ({} rows)", key, cache.len());
        Self::put_record(&self.predictions, &key, cache)
    }

    pub fn save_feature_influence_cache(
        &self,
        metadata: &ExplanationCacheMetadata,
        cache: &NumericTableCache,
    ) -> ProcessorResult<()> {
        let key = metadata.storage_key();
        log::debug!("Saving feature influence cache {} ({} rows)", key, cache.len());
        Self::put_record(&self.explanations, &key, cache)
    }

    pub fn save_partial_dependence_cache(
        &self,
        metadata: &ExplanationCacheMetadata,
        pdp: &PartialDependenceCache,
    ) -> ProcessorResult<()> {
        Self::put_record(&self.partial_dependence, &metadata.storage_key(), pdp)
    }

    pub fn queue_job(&self, job_id: &str, spec: &JobSpec) -> ProcessorResult<()> {
        let job = QueuedJob {
            job_id: job_id.to_string(),
            spec: spec.clone(),
            queued_at: Utc::now(),
        };
        Self::put_record(&self.jobs, job_id, &job)
    }

    /// Queued jobs, oldest first.
    pub fn queued_jobs(&self) -> ProcessorResult<Vec<QueuedJob>> {
        let mut jobs = Vec::new();
        for entry in self.jobs.iter() {
            let (key, value) = entry?;
            let key = String::from_utf8_lossy(&key).to_string();
            jobs.push(decode_record::<QueuedJob>(&key, &value)?);
        }
        jobs.sort_by_key(|job| job.queued_at);
        Ok(jobs)
    }

    pub fn remove_job(&self, job_id: &str) -> ProcessorResult<bool> {
        Ok(self.jobs.remove(job_id.as_bytes())?.is_some())
    }

    pub fn flush(&self) -> ProcessorResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl ModelPredictionCacheStore for SledCacheStore {
    fn load_cache(
        &self,
        cache: &mut NumericTableCache,
        metadata: &ModelPredictionCacheMetadata,
        _ctx: &RequestContext,
    ) -> ProcessorResult<()> {
        let key = metadata.storage_key();
        if let Some(stored) = Self::get_record::<NumericTableCache>(&self.predictions, &key)? {
            log::debug!("Loaded {} prediction rows from {}", stored.len(), key);
            cache.merge_from(stored);
        }
        Ok(())
    }
}

impl ExplanationCacheStore for SledCacheStore {
    fn load_feature_influence_cache(
        &self,
        _ctx: &RequestContext,
        cache: &mut NumericTableCache,
        metadata: &ExplanationCacheMetadata,
        background_is_default_split: bool,
        split_updated_on: DateTime<Utc>,
    ) -> ProcessorResult<()> {
        let key = metadata.storage_key();
        let mut stored = Self::get_record::<NumericTableCache>(&self.explanations, &key)?;
        if stored.is_none() && background_is_default_split {
            let fallback = metadata.storage_key_without_background();
            stored = Self::get_record(&self.explanations, &fallback)?;
        }
        let Some(stored) = stored else {
            return Ok(());
        };

        if metadata.score_type.is_error() && stored.updated_on() < split_updated_on {
            log::warn!(
                "Skipping stale influences {}: built {} before split update {}",
                key,
                stored.updated_on(),
                split_updated_on
            );
            return Ok(());
        }
        log::debug!("Loaded {} influence rows from {}", stored.len(), key);
        cache.merge_from(stored);
        Ok(())
    }

    fn load_partial_dependence_plot_cache(
        &self,
        _ctx: &RequestContext,
        metadata: &ExplanationCacheMetadata,
    ) -> ProcessorResult<Option<PartialDependenceCache>> {
        Self::get_record(&self.partial_dependence, &metadata.storage_key())
    }
}
