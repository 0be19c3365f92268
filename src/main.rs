// src/main.rs

use anyhow::Result;
use clap::Parser;
use tracing::info;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Build {
            ir,
            stub,
            output,
            work_dir,
            layout,
            compression,
            bind_path,
        }) => {
            info!("Binding bundle from: {}", ir.display());
            commands::build(&ir, &stub, &output, work_dir, layout, compression, bind_path)
        }
        Some(Commands::Inspect { bundle, manifest }) => commands::inspect(&bundle, manifest),
        Some(Commands::Completions { shell }) => {
            commands::completions(shell);
            Ok(())
        }
        None => {
            // No command provided, show help
            println!("Bale Bundle Assembler v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'bale --help' for usage information");
            Ok(())
        }
    }
}
