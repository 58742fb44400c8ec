// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Score type derivation rules
//!
//! A requested score type may be computed from a cached score of another
//! type through a pure elementwise transform. Rules are keyed by
//! `(target, source)`.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{ProcessorError, ProcessorResult};
use crate::types::ScoreType;

type Transform = fn(f64) -> f64;

/// Logistic sigmoid
pub fn expit(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Inverse of [`expit`]; infinite at 0 and 1, NaN outside `[0, 1]`
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

static DERIVATION_RULES: Lazy<HashMap<(ScoreType, ScoreType), Transform>> = Lazy::new(|| {
    let mut rules: HashMap<(ScoreType, ScoreType), Transform> = HashMap::new();
    rules.insert((ScoreType::Logits, ScoreType::Probits), logit);
    rules.insert((ScoreType::Probits, ScoreType::Logits), expit);
    rules
});

/// Applies the derivation rules when conversion is enabled.
#[derive(Debug, Clone, Copy)]
pub struct ScoreTypeConverter {
    enabled: bool,
}

impl ScoreTypeConverter {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_derivable(&self, target: ScoreType, source: ScoreType) -> bool {
        self.enabled && DERIVATION_RULES.contains_key(&(target, source))
    }

    fn transform(&self, target: ScoreType, source: ScoreType) -> ProcessorResult<Transform> {
        if !self.enabled {
            return Err(ProcessorError::InvalidArgument(format!(
                "Source score type {} cannot be safely converted into target score type {}: conversion is disabled",
                source, target
            )));
        }
        DERIVATION_RULES
            .get(&(target, source))
            .copied()
            .ok_or_else(|| {
                ProcessorError::InvalidArgument(format!(
                    "Source score type {} cannot be safely converted into target score type {}",
                    source, target
                ))
            })
    }

    /// Convert a single score.
    pub fn convert_value(
        &self,
        target: ScoreType,
        source: ScoreType,
        value: f64,
    ) -> ProcessorResult<f64> {
        let transform = self.transform(target, source)?;
        Ok(transform(value))
    }

    /// Convert scores elementwise.
    pub fn convert(
        &self,
        target: ScoreType,
        source: ScoreType,
        values: &[f64],
    ) -> ProcessorResult<Vec<f64>> {
        let transform = self.transform(target, source)?;
        Ok(values.iter().map(|&v| transform(v)).collect())
    }
}
