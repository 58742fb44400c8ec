// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Command-line argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use intelproc::ScoreType;

#[derive(Parser, Debug)]
#[command(name = "intelproc")]
#[command(version, about = "Inspect and populate intelproc prediction and explanation caches")]
pub struct Cli {
    /// Project manifest describing datasets, models and services
    #[arg(short, long, global = true, default_value = "intelproc.json")]
    pub manifest: PathBuf,

    /// Cache store directory
    #[arg(short, long, global = true, default_value = "./intelproc-cache")]
    pub store: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevel>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show version information
    Version,

    /// Prediction scores for a range of records
    Scores {
        model: String,

        #[arg(long)]
        split: Option<String>,

        #[arg(long)]
        score_type: Option<ScoreType>,

        #[arg(long, default_value_t = 0)]
        start: usize,

        #[arg(long)]
        stop: Option<usize>,

        /// Serve from caches only; never queue jobs
        #[arg(long)]
        readonly: bool,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Prediction score of a single record
    Score {
        model: String,

        index: usize,

        #[arg(long)]
        split: Option<String>,

        #[arg(long)]
        score_type: Option<ScoreType>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Feature influences for the first records of a split
    Influences {
        model: String,

        #[arg(long)]
        split: Option<String>,

        /// Number of records
        #[arg(short = 'n', long)]
        count: Option<usize>,

        /// Background split id
        #[arg(long)]
        background: Option<String>,

        #[arg(long)]
        score_type: Option<ScoreType>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Feature influences of a single record
    Influence {
        model: String,

        index: usize,

        #[arg(long)]
        split: Option<String>,

        #[arg(long)]
        background: Option<String>,

        #[arg(long)]
        score_type: Option<ScoreType>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Partial dependence plots of a model
    Pdp {
        model: String,

        #[arg(long)]
        background: Option<String>,

        #[arg(long)]
        score_type: Option<ScoreType>,

        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Store prediction scores from a JSON table file
    ImportPredictions {
        model: String,

        split: String,

        score_type: ScoreType,

        file: PathBuf,
    },

    /// Inspect the queue of jobs awaiting a model runner
    Jobs {
        #[command(subcommand)]
        action: JobAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobAction {
    /// List queued jobs, oldest first
    List {
        #[arg(short, long, value_enum, default_value = "table")]
        format: OutputFormat,
    },
    /// Drop a queued job
    Remove { job_id: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scores_command() {
        let cli = Cli::try_parse_from([
            "intelproc",
            "scores",
            "model-a",
            "--score-type",
            "probits",
            "--stop",
            "5",
            "--readonly",
        ])
        .unwrap();
        match cli.command {
            Commands::Scores {
                model,
                score_type,
                stop,
                readonly,
                format,
                ..
            } => {
                assert_eq!(model, "model-a");
                assert_eq!(score_type, Some(ScoreType::Probits));
                assert_eq!(stop, Some(5));
                assert!(readonly);
                assert_eq!(format, OutputFormat::Table);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_unknown_score_type_rejected() {
        let result = Cli::try_parse_from(["intelproc", "score", "m", "0", "--score-type", "odds"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_options_after_subcommand() {
        let cli = Cli::try_parse_from(["intelproc", "jobs", "list", "--store", "/tmp/x", "-v"])
            .unwrap();
        assert_eq!(cli.store, PathBuf::from("/tmp/x"));
        assert!(cli.verbose);
    }
}
