// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Background (reference) data split descriptors

use serde::{Deserialize, Serialize};

/// Background split used as the baseline for influence and PDP computations
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RealizedBackgroundDataSplitInfo {
    pub id: String,
    /// Optional sample index within the background split
    pub index: Option<i64>,
    pub filter_expression: Option<String>,
}

impl RealizedBackgroundDataSplitInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            index: None,
            filter_expression: None,
        }
    }

    pub fn with_index(mut self, index: i64) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_filter_expression(mut self, expression: impl Into<String>) -> Self {
        self.filter_expression = Some(expression.into());
        self
    }
}

impl std::fmt::Display for RealizedBackgroundDataSplitInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)?;
        if let Some(index) = self.index {
            write!(f, "[{}]", index)?;
        }
        if let Some(expression) = &self.filter_expression {
            write!(f, " where {}", expression)?;
        }
        Ok(())
    }
}
