// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Retouch command-line front end.
//
// Entry point. Initialises logging, reads configuration from the environment
// and dispatches to a subcommand. Results are printed to stdout as JSON.

mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use retouch_core::RetouchConfig;
use retouch_core::types::DocumentId;
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "retouch", version)]
#[command(about = "Overlay text edits onto existing PDFs and check them for visual damage")]
struct Cli {
    /// Directory holding stored documents and fonts
    #[arg(long, global = true, env = "DATA_DIR", value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a PDF and extract its embedded fonts
    Import {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// List the font families extracted for a document
    Fonts {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Apply overlay edits to a stored document
    Export {
        #[arg(value_name = "ID")]
        id: String,

        /// JSON array of edit operations
        #[arg(long, value_name = "FILE")]
        edits: PathBuf,

        /// Output PDF
        #[arg(short, long, value_name = "FILE")]
        out: PathBuf,

        /// Ask the vision oracle to inspect each edited region
        #[arg(long)]
        validate: bool,

        /// Redraw borders the oracle reports as damaged (implies --validate)
        #[arg(long)]
        repair: bool,
    },

    /// Compare an edited PDF against its stored original
    Validate {
        #[arg(value_name = "ID")]
        id: String,

        /// Edited PDF
        #[arg(long, value_name = "FILE")]
        edited: PathBuf,

        /// JSON array of the edit operations that were applied
        #[arg(long, value_name = "FILE")]
        edits: PathBuf,
    },
}

fn print_json(value: &impl Serialize) -> retouch_core::error::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run(cli: Cli) -> retouch_core::error::Result<()> {
    let mut config = RetouchConfig::from_env();
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }

    match cli.command {
        Command::Import { input } => print_json(&commands::import(&config, &input)?),
        Command::Fonts { id } => print_json(&commands::fonts(&config, &DocumentId(id))?),
        Command::Export {
            id,
            edits,
            out,
            validate,
            repair,
        } => {
            let options = commands::ExportOptions {
                validate: validate || repair,
                repair,
            };
            print_json(&commands::export(&config, &DocumentId(id), &edits, &out, options)?)
        }
        Command::Validate { id, edited, edits } => {
            print_json(&commands::validate(&config, &DocumentId(id), &edited, &edits)?)
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "retouch failed");
            eprintln!("error: {err}");
            if err.is_input_error() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
