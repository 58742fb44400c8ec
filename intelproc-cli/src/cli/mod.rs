// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! CLI module for intelproc
//!
//! Serves prediction scores, feature influences and partial dependence
//! plots from a local cache store, queueing jobs for anything missing.

pub mod commands;
pub mod handlers;
pub mod manifest;
pub mod output;

pub use commands::{Cli, Commands};
pub use handlers::{
    handle_import_predictions, handle_influence, handle_influences, handle_jobs, handle_pdp,
    handle_score, handle_scores, Session,
};
