// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! intelproc CLI entry point

use clap::Parser;
use colored::Colorize;

mod cli;
use cli::{Cli, Commands};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        log::LevelFilter::Debug
    } else if let Some(level) = cli.log_level {
        level.to_level_filter()
    } else {
        // RUST_LOG can still raise this
        log::LevelFilter::Warn
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let session = cli::Session::new(cli.manifest, cli.store);

    match cli.command {
        Commands::Version => {
            println!("{} {}", "intelproc".bold().green(), intelproc::VERSION);
            println!("Prediction and explanation cache inspector");
            Ok(())
        }

        Commands::Scores {
            model,
            split,
            score_type,
            start,
            stop,
            readonly,
            format,
        } => cli::handle_scores(
            &session, model, split, score_type, start, stop, readonly, format,
        ),

        Commands::Score {
            model,
            index,
            split,
            score_type,
            format,
        } => cli::handle_score(&session, model, index, split, score_type, format),

        Commands::Influences {
            model,
            split,
            count,
            background,
            score_type,
            format,
        } => cli::handle_influences(&session, model, split, count, background, score_type, format),

        Commands::Influence {
            model,
            index,
            split,
            background,
            score_type,
            format,
        } => cli::handle_influence(&session, model, index, split, background, score_type, format),

        Commands::Pdp {
            model,
            background,
            score_type,
            format,
        } => cli::handle_pdp(&session, model, background, score_type, format),

        Commands::ImportPredictions {
            model,
            split,
            score_type,
            file,
        } => cli::handle_import_predictions(&session, model, split, score_type, file),

        Commands::Jobs { action } => cli::handle_jobs(&session, action),
    }
}
