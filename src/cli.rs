// src/cli.rs
//! CLI definitions for the bale bundle assembler
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use bale::container::CompressionLevel;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "bale")]
#[command(author = "Bale Contributors")]
#[command(version)]
#[command(about = "Assembles installer bundles from an authored document and a stub executable", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Bind an intermediate-representation document into a bundle executable
    Build {
        /// Intermediate-representation document (*.bale.json)
        #[arg(short, long, value_name = "FILE")]
        ir: PathBuf,

        /// Platform stub executable the bundle is assembled onto
        #[arg(short, long, value_name = "FILE")]
        stub: PathBuf,

        /// Output bundle path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,

        /// Working directory for intermediate artifacts (default: a fresh temp dir)
        #[arg(long, value_name = "DIR")]
        work_dir: Option<PathBuf>,

        /// Directory for detached containers and loose payloads (default: the output's parent)
        #[arg(long, value_name = "DIR")]
        layout: Option<PathBuf>,

        /// Container compression level: none, low, medium or high
        #[arg(long, default_value = "medium")]
        compression: CompressionLevel,

        /// Additional directory to probe for payload sources (repeatable)
        #[arg(short, long, value_name = "DIR")]
        bind_path: Vec<PathBuf>,
    },

    /// Read back the bundle section of an assembled bundle
    Inspect {
        /// Bundle executable path
        bundle: PathBuf,

        /// Extract and print the manifest from the UX container
        #[arg(long)]
        manifest: bool,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
