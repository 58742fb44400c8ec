// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Descriptors of persisted caches

use serde::{Deserialize, Serialize};

use crate::client::ExplanationConfig;
use crate::types::{ExplanationCacheType, ScoreType};

/// Identifies a persisted prediction cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelPredictionCacheMetadata {
    pub project_id: String,
    pub model_id: String,
    pub split_id: String,
    pub score_type: ScoreType,
}

impl ModelPredictionCacheMetadata {
    pub fn storage_key(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.project_id, self.model_id, self.split_id, self.score_type
        )
    }
}

/// Identifies a persisted influence or partial dependence cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExplanationCacheMetadata {
    pub project_id: String,
    pub model_id: String,
    pub split_id: String,
    pub score_type: ScoreType,
    pub explanation_cache_type: ExplanationCacheType,
    pub background_data_split_id: Option<String>,
    /// Explanation settings in effect; recorded, not part of the key
    pub config: Option<ExplanationConfig>,
}

impl ExplanationCacheMetadata {
    pub fn storage_key(&self) -> String {
        self.key_for(self.background_data_split_id.as_deref())
    }

    /// Key of the same cache saved without a background split id.
    pub fn storage_key_without_background(&self) -> String {
        self.key_for(None)
    }

    fn key_for(&self, background: Option<&str>) -> String {
        format!(
            "{}/{}/{}/{}/{}/bg={}",
            self.project_id,
            self.model_id,
            self.split_id,
            self.score_type,
            self.explanation_cache_type,
            background.unwrap_or("-")
        )
    }
}
