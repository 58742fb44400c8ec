// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Partial dependence plot data

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::cache::CacheValue;

/// Sweep of each feature across its range with the model output at each point.
/// One per (model, background split, score type).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialDependenceCache {
    pub features: Vec<String>,
    pub xs: HashMap<String, Vec<f64>>,
    pub ys: HashMap<String, Vec<f64>>,
    pub num_points: usize,
}

impl PartialDependenceCache {
    pub fn new(num_points: usize) -> Self {
        Self {
            num_points,
            ..Default::default()
        }
    }

    /// Add the curve for one feature. Replaces an existing curve.
    pub fn insert_feature(&mut self, feature: impl Into<String>, xs: Vec<f64>, ys: Vec<f64>) {
        let feature = feature.into();
        if !self.features.contains(&feature) {
            self.features.push(feature.clone());
        }
        self.xs.insert(feature.clone(), xs);
        self.ys.insert(feature, ys);
    }

    /// Sweep points and outputs for `feature`, if present.
    pub fn curve(&self, feature: &str) -> Option<(&[f64], &[f64])> {
        Some((self.xs.get(feature)?, self.ys.get(feature)?))
    }
}

impl CacheValue for PartialDependenceCache {
    fn size_bytes(&self) -> usize {
        let curves = self
            .xs
            .values()
            .chain(self.ys.values())
            .map(|values| values.len() * std::mem::size_of::<f64>())
            .sum::<usize>();
        let names = self.features.iter().map(|f| f.len() * 3).sum::<usize>();
        std::mem::size_of::<Self>() + curves + names
    }
}
