// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Composite keys identifying cached artifacts

use serde::{Deserialize, Serialize};

use crate::background::RealizedBackgroundDataSplitInfo;
use crate::error::{ProcessorError, ProcessorResult};
use crate::types::{ExplanationCacheType, ScoreType};

/// Split id used in partial dependence keys, which are not tied to a split
pub const PDP_SPLIT_PLACEHOLDER: &str = "NA";

fn require_non_empty(field: &str, value: &str) -> ProcessorResult<()> {
    if value.is_empty() {
        return Err(ProcessorError::Internal(format!(
            "{} cannot be empty",
            field
        )));
    }
    Ok(())
}

/// Key of a prediction cache
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelScoreTypeTuple {
    model_id: String,
    split_id: String,
    score_type: ScoreType,
}

impl ModelScoreTypeTuple {
    pub fn new(
        model_id: impl Into<String>,
        split_id: impl Into<String>,
        score_type: ScoreType,
    ) -> ProcessorResult<Self> {
        let model_id = model_id.into();
        let split_id = split_id.into();
        require_non_empty("model_id", &model_id)?;
        require_non_empty("split_id", &split_id)?;
        Ok(Self {
            model_id,
            split_id,
            score_type,
        })
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn split_id(&self) -> &str {
        &self.split_id
    }

    pub fn score_type(&self) -> ScoreType {
        self.score_type
    }
}

impl std::fmt::Display for ModelScoreTypeTuple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.model_id, self.split_id, self.score_type)
    }
}

/// Key of a feature influence or partial dependence cache.
///
/// Carries the full background descriptor so that influences computed
/// against different reference data never collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    model_id: String,
    split_id: String,
    background_data_split_id: String,
    background_data_split_index: Option<i64>,
    background_data_split_filter_expression: Option<String>,
    score_type: ScoreType,
    explanation_algorithm_type: Option<ExplanationCacheType>,
}

impl CacheKey {
    pub fn new(
        model_id: impl Into<String>,
        split_id: impl Into<String>,
        background: &RealizedBackgroundDataSplitInfo,
        score_type: ScoreType,
        explanation_algorithm_type: Option<ExplanationCacheType>,
    ) -> ProcessorResult<Self> {
        let model_id = model_id.into();
        let split_id = split_id.into();
        require_non_empty("model_id", &model_id)?;
        require_non_empty("split_id", &split_id)?;
        require_non_empty("background_data_split_id", &background.id)?;
        Ok(Self {
            model_id,
            split_id,
            background_data_split_id: background.id.clone(),
            background_data_split_index: background.index,
            background_data_split_filter_expression: background.filter_expression.clone(),
            score_type,
            explanation_algorithm_type,
        })
    }

    /// Key of the partial dependence cache for a model and background split
    pub fn partial_dependence(
        model_id: impl Into<String>,
        background: &RealizedBackgroundDataSplitInfo,
        score_type: ScoreType,
    ) -> ProcessorResult<Self> {
        Self::new(model_id, PDP_SPLIT_PLACEHOLDER, background, score_type, None)
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn split_id(&self) -> &str {
        &self.split_id
    }

    pub fn background_data_split_id(&self) -> &str {
        &self.background_data_split_id
    }

    pub fn background_data_split_index(&self) -> Option<i64> {
        self.background_data_split_index
    }

    pub fn background_data_split_filter_expression(&self) -> Option<&str> {
        self.background_data_split_filter_expression.as_deref()
    }

    pub fn score_type(&self) -> ScoreType {
        self.score_type
    }

    pub fn explanation_algorithm_type(&self) -> Option<ExplanationCacheType> {
        self.explanation_algorithm_type
    }

    /// Explanation cache type, failing for keys that carry none.
    pub fn require_algorithm_type(&self) -> ProcessorResult<ExplanationCacheType> {
        self.explanation_algorithm_type.ok_or_else(|| {
            ProcessorError::Internal(
                "Cannot retrieve feature influences for algorithm type `None`".to_string(),
            )
        })
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}/bg={}/{}",
            self.model_id, self.split_id, self.background_data_split_id, self.score_type
        )?;
        if let Some(algorithm) = self.explanation_algorithm_type {
            write!(f, "/{}", algorithm)?;
        }
        Ok(())
    }
}
