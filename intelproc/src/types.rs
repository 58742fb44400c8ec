// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Score types and explanation algorithm tags

use crate::error::ProcessorError;
use serde::{Deserialize, Serialize};

/// Numeric representation of a model output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreType {
    Logits,
    LogitsUnnormalized,
    Probits,
    Regression,
    /// Thresholded decision; always derived, never cached
    Classification,
    LogLoss,
    MeanAbsoluteErrorClassification,
    MeanAbsoluteErrorRegression,
}

impl ScoreType {
    pub const ALL: [ScoreType; 8] = [
        ScoreType::Logits,
        ScoreType::LogitsUnnormalized,
        ScoreType::Probits,
        ScoreType::Regression,
        ScoreType::Classification,
        ScoreType::LogLoss,
        ScoreType::MeanAbsoluteErrorClassification,
        ScoreType::MeanAbsoluteErrorRegression,
    ];

    /// Score types whose prediction caches may exist alongside a classification
    /// model's requested type. Used only for diagnostics.
    pub const CLASSIFICATION_CACHE_TYPES: [ScoreType; 6] = [
        ScoreType::Logits,
        ScoreType::LogitsUnnormalized,
        ScoreType::Probits,
        ScoreType::Classification,
        ScoreType::LogLoss,
        ScoreType::MeanAbsoluteErrorClassification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScoreType::Logits => "logits",
            ScoreType::LogitsUnnormalized => "logits_unnormalized",
            ScoreType::Probits => "probits",
            ScoreType::Regression => "regression",
            ScoreType::Classification => "classification",
            ScoreType::LogLoss => "log_loss",
            ScoreType::MeanAbsoluteErrorClassification => "mean_absolute_error_for_classification",
            ScoreType::MeanAbsoluteErrorRegression => "mean_absolute_error_for_regression",
        }
    }

    pub fn is_regression(&self) -> bool {
        matches!(
            self,
            ScoreType::Regression | ScoreType::MeanAbsoluteErrorRegression
        )
    }

    /// Label-dependent score types; their caches go stale when labels change.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ScoreType::LogLoss
                | ScoreType::MeanAbsoluteErrorClassification
                | ScoreType::MeanAbsoluteErrorRegression
        )
    }

    /// Natural default for a model of the given kind.
    pub fn default_for_model(is_regression: bool) -> Self {
        if is_regression {
            ScoreType::Regression
        } else {
            ScoreType::Logits
        }
    }
}

impl std::str::FromStr for ScoreType {
    type Err = ProcessorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.to_lowercase();
        ScoreType::ALL
            .iter()
            .copied()
            .find(|score_type| score_type.as_str() == lowered)
            .ok_or_else(|| {
                ProcessorError::InvalidArgument(format!(
                    "Unknown score type: {}. Valid options: {}",
                    s,
                    ScoreType::ALL
                        .iter()
                        .map(|t| t.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })
    }
}

impl std::fmt::Display for ScoreType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of explanation artifact stored in an explanation cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplanationCacheType {
    /// Native QII influences
    FeatureInfluence,
    FeatureInfluenceKernelShap,
    FeatureInfluenceTreeShapInterventional,
    FeatureInfluenceTreeShapPathDependent,
    FeatureInfluenceIntegratedGradients,
    PartialDependence,
}

impl ExplanationCacheType {
    /// Influence cache types to consult, in lookup order. The first complete
    /// cache wins.
    pub fn influence_lookup_order(use_shap: bool) -> &'static [ExplanationCacheType] {
        const SHAP: [ExplanationCacheType; 3] = [
            ExplanationCacheType::FeatureInfluenceTreeShapInterventional,
            ExplanationCacheType::FeatureInfluenceKernelShap,
            ExplanationCacheType::FeatureInfluenceTreeShapPathDependent,
        ];
        const QII: [ExplanationCacheType; 1] = [ExplanationCacheType::FeatureInfluence];
        if use_shap {
            &SHAP
        } else {
            &QII
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExplanationCacheType::FeatureInfluence => "feature_influence",
            ExplanationCacheType::FeatureInfluenceKernelShap => "feature_influence_kernel_shap",
            ExplanationCacheType::FeatureInfluenceTreeShapInterventional => {
                "feature_influence_tree_shap_interventional"
            }
            ExplanationCacheType::FeatureInfluenceTreeShapPathDependent => {
                "feature_influence_tree_shap_path_dependent"
            }
            ExplanationCacheType::FeatureInfluenceIntegratedGradients => {
                "feature_influence_integrated_gradients"
            }
            ExplanationCacheType::PartialDependence => "partial_dependence",
        }
    }

    /// Client-facing algorithm that produced influences of this cache type.
    pub fn algorithm(&self) -> Result<ExplanationAlgorithmType, ProcessorError> {
        match self {
            ExplanationCacheType::FeatureInfluence => Ok(ExplanationAlgorithmType::Qii),
            ExplanationCacheType::FeatureInfluenceKernelShap => {
                Ok(ExplanationAlgorithmType::KernelShap)
            }
            ExplanationCacheType::FeatureInfluenceTreeShapInterventional => {
                Ok(ExplanationAlgorithmType::TreeShapInterventional)
            }
            ExplanationCacheType::FeatureInfluenceTreeShapPathDependent => {
                Ok(ExplanationAlgorithmType::TreeShapPathDependent)
            }
            ExplanationCacheType::FeatureInfluenceIntegratedGradients => {
                Ok(ExplanationAlgorithmType::IntegratedGradients)
            }
            ExplanationCacheType::PartialDependence => Err(ProcessorError::Internal(
                "Partial dependence caches do not map to an influence algorithm".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for ExplanationCacheType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Influence algorithm reported back to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExplanationAlgorithmType {
    Qii,
    KernelShap,
    TreeShapInterventional,
    TreeShapPathDependent,
    IntegratedGradients,
}

impl std::fmt::Display for ExplanationAlgorithmType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExplanationAlgorithmType::Qii => "qii",
            ExplanationAlgorithmType::KernelShap => "kernel-shap",
            ExplanationAlgorithmType::TreeShapInterventional => "tree-shap-interventional",
            ExplanationAlgorithmType::TreeShapPathDependent => "tree-shap-path-dependent",
            ExplanationAlgorithmType::IntegratedGradients => "integrated-gradients",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_type_parse_round_trip() {
        for score_type in ScoreType::ALL {
            let parsed: ScoreType = score_type.as_str().parse().unwrap();
            assert_eq!(parsed, score_type);
        }
        assert!(matches!(
            "softmax".parse::<ScoreType>(),
            Err(ProcessorError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_error_and_regression_groups() {
        assert!(ScoreType::LogLoss.is_error());
        assert!(ScoreType::MeanAbsoluteErrorRegression.is_error());
        assert!(!ScoreType::Probits.is_error());
        assert!(ScoreType::MeanAbsoluteErrorRegression.is_regression());
        assert!(!ScoreType::MeanAbsoluteErrorClassification.is_regression());
        assert_eq!(ScoreType::default_for_model(true), ScoreType::Regression);
        assert_eq!(ScoreType::default_for_model(false), ScoreType::Logits);
    }

    #[test]
    fn test_influence_lookup_order() {
        assert_eq!(
            ExplanationCacheType::influence_lookup_order(true),
            &[
                ExplanationCacheType::FeatureInfluenceTreeShapInterventional,
                ExplanationCacheType::FeatureInfluenceKernelShap,
                ExplanationCacheType::FeatureInfluenceTreeShapPathDependent,
            ]
        );
        assert_eq!(
            ExplanationCacheType::influence_lookup_order(false),
            &[ExplanationCacheType::FeatureInfluence]
        );
    }

    #[test]
    fn test_algorithm_mapping() {
        assert_eq!(
            ExplanationCacheType::FeatureInfluence.algorithm().unwrap(),
            ExplanationAlgorithmType::Qii
        );
        assert!(ExplanationCacheType::PartialDependence.algorithm().is_err());
    }
}
