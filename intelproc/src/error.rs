// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Error types for the intelligence processor

use thiserror::Error;

/// Errors raised by cache lookups, derivations and job triggering.
///
/// Pending remote work is never an error; it is reported through
/// [`crate::PendingOperationsOr`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessorError {
    /// Malformed or unsupported combination, e.g. a regression score type
    /// against a classification model
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Valid request that conflicts with dataset capabilities
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Readonly request with no cached data; may succeed after a job runs
    #[error("Prediction unavailable: {0}")]
    PredictionUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Remote model error: {0}")]
    RemoteModel(String),
}

impl ProcessorError {
    /// True for failures that may clear up once remote jobs finish.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProcessorError::PredictionUnavailable(_))
    }
}

impl From<std::io::Error> for ProcessorError {
    fn from(err: std::io::Error) -> Self {
        ProcessorError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ProcessorError {
    fn from(err: serde_json::Error) -> Self {
        ProcessorError::Storage(err.to_string())
    }
}

impl From<bincode::Error> for ProcessorError {
    fn from(err: bincode::Error) -> Self {
        ProcessorError::Storage(err.to_string())
    }
}

#[cfg(feature = "sled-backend")]
impl From<sled::Error> for ProcessorError {
    fn from(err: sled::Error) -> Self {
        ProcessorError::Storage(err.to_string())
    }
}

pub type ProcessorResult<T> = Result<T, ProcessorError>;
