// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Data collections and their splits

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ProcessorError, ProcessorResult};

/// Metadata of one data split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitInfo {
    pub id: String,
    pub feature_names: Vec<String>,
    /// Post-transform feature names; equal to `feature_names` without a transform
    #[serde(default)]
    pub processed_feature_names: Vec<String>,
    pub num_inputs: usize,
    #[serde(default)]
    pub has_labels: bool,
    /// Last change to the split's data or labels
    #[serde(default = "Utc::now")]
    pub updated_on: DateTime<Utc>,
    #[serde(default)]
    pub unique_id_column_name: Option<String>,
    #[serde(default)]
    pub timestamp_column_name: Option<String>,
    #[serde(default)]
    pub pre_transform_locator: Option<String>,
    #[serde(default)]
    pub post_transform_locator: Option<String>,
}

impl SplitInfo {
    pub fn new(id: impl Into<String>, feature_names: Vec<String>, num_inputs: usize) -> Self {
        Self {
            id: id.into(),
            processed_feature_names: feature_names.clone(),
            feature_names,
            num_inputs,
            has_labels: false,
            updated_on: Utc::now(),
            unique_id_column_name: None,
            timestamp_column_name: None,
            pre_transform_locator: None,
            post_transform_locator: None,
        }
    }

    pub fn with_labels(mut self, has_labels: bool) -> Self {
        self.has_labels = has_labels;
        self
    }

    pub fn with_updated_on(mut self, updated_on: DateTime<Utc>) -> Self {
        self.updated_on = updated_on;
        self
    }

    pub fn with_processed_feature_names(mut self, names: Vec<String>) -> Self {
        self.processed_feature_names = names;
        self
    }

    pub fn with_system_columns(
        mut self,
        unique_id_column_name: Option<String>,
        timestamp_column_name: Option<String>,
    ) -> Self {
        self.unique_id_column_name = unique_id_column_name;
        self.timestamp_column_name = timestamp_column_name;
        self
    }

    pub fn with_transform_locators(
        mut self,
        pre_transform_locator: impl Into<String>,
        post_transform_locator: impl Into<String>,
    ) -> Self {
        self.pre_transform_locator = Some(pre_transform_locator.into());
        self.post_transform_locator = Some(post_transform_locator.into());
        self
    }

    /// Names of the configured system columns, id first.
    pub fn system_column_names(&self) -> Vec<&str> {
        self.unique_id_column_name
            .iter()
            .chain(self.timestamp_column_name.iter())
            .map(String::as_str)
            .collect()
    }

    /// True when the raw and processed feature sets are the same set.
    pub fn has_identical_feature_sets(&self) -> bool {
        let raw: HashSet<&str> = self.feature_names.iter().map(String::as_str).collect();
        let processed: HashSet<&str> = self
            .processed_feature_names
            .iter()
            .map(String::as_str)
            .collect();
        raw == processed
    }
}

/// Data collection: a set of splits sharing one schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: String,
    pub splits: BTreeMap<String, SplitInfo>,
}

impl Dataset {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            splits: BTreeMap::new(),
        }
    }

    pub fn with_split(mut self, split: SplitInfo) -> Self {
        self.add_split(split);
        self
    }

    pub fn add_split(&mut self, split: SplitInfo) {
        self.splits.insert(split.id.clone(), split);
    }

    pub fn get_split(&self, split_id: &str) -> ProcessorResult<&SplitInfo> {
        self.splits.get(split_id).ok_or_else(|| {
            ProcessorError::NotFound(format!(
                "Split {} does not exist in data collection {}",
                split_id, self.id
            ))
        })
    }

    pub fn split_ids(&self) -> impl Iterator<Item = &str> {
        self.splits.keys().map(String::as_str)
    }
}
