// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Either a ready value or the remote jobs that will produce it

use serde::{Deserialize, Serialize};

/// Non-empty list of job ids for in-flight remote computation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOperations(Vec<String>);

impl PendingOperations {
    /// Returns `None` for an empty list.
    pub fn new(job_ids: Vec<String>) -> Option<Self> {
        if job_ids.is_empty() {
            None
        } else {
            Some(Self(job_ids))
        }
    }

    pub fn single(job_id: impl Into<String>) -> Self {
        Self(vec![job_id.into()])
    }

    pub fn job_ids(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_job_ids(self) -> Vec<String> {
        self.0
    }
}

/// Result of a request that may have triggered remote jobs instead of
/// returning data. Callers poll the jobs and re-issue the request.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingOperationsOr<T> {
    Value(T),
    Operations(PendingOperations),
}

impl<T> PendingOperationsOr<T> {
    pub fn from_value(value: T) -> Self {
        PendingOperationsOr::Value(value)
    }

    pub fn from_operations(operations: PendingOperations) -> Self {
        PendingOperationsOr::Operations(operations)
    }

    pub fn is_operations(&self) -> bool {
        matches!(self, PendingOperationsOr::Operations(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            PendingOperationsOr::Value(value) => Some(value),
            PendingOperationsOr::Operations(_) => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            PendingOperationsOr::Value(value) => Some(value),
            PendingOperationsOr::Operations(_) => None,
        }
    }

    pub fn operations(&self) -> Option<&PendingOperations> {
        match self {
            PendingOperationsOr::Value(_) => None,
            PendingOperationsOr::Operations(operations) => Some(operations),
        }
    }

    /// Transform the value, passing pending operations through unchanged.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PendingOperationsOr<U> {
        match self {
            PendingOperationsOr::Value(value) => PendingOperationsOr::Value(f(value)),
            PendingOperationsOr::Operations(operations) => {
                PendingOperationsOr::Operations(operations)
            }
        }
    }

    /// Fallible variant of [`map`](Self::map).
    pub fn and_then_value<U, E>(
        self,
        f: impl FnOnce(T) -> Result<U, E>,
    ) -> Result<PendingOperationsOr<U>, E> {
        match self {
            PendingOperationsOr::Value(value) => Ok(PendingOperationsOr::Value(f(value)?)),
            PendingOperationsOr::Operations(operations) => {
                Ok(PendingOperationsOr::Operations(operations))
            }
        }
    }
}
