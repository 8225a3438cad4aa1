//! c3mro Binary
//!
//! Run with: `c3mro [COMMAND]`

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use c3mro_cli::Overrides;

#[derive(Parser)]
#[command(name = "c3mro")]
#[command(about = "Explore C3 method resolution orders and chained dispatch")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Name of the universal root type (overrides the file's settings)
    #[arg(long, global = true)]
    root: Option<String>,

    /// Maximum nested call depth (overrides the file's settings)
    #[arg(long, global = true)]
    max_depth: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the linearization of a type
    Mro {
        /// Hierarchy file
        file: PathBuf,

        /// Type name
        ty: String,

        /// Leave the root type off the end
        #[arg(long)]
        no_root: bool,
    },

    /// Invoke a method and print the transcript
    Invoke {
        /// Hierarchy file
        file: PathBuf,

        /// Receiver type name
        ty: String,

        /// Method name
        method: String,
    },

    /// List every implementation of a method visible from a type
    Which {
        /// Hierarchy file
        file: PathBuf,

        /// Receiver type name
        ty: String,

        /// Method name
        method: String,
    },

    /// Linearize every type and report inconsistencies
    Check {
        /// Hierarchy file
        file: PathBuf,
    },

    /// Run the scenarios in a hierarchy file
    Run {
        /// Hierarchy file
        file: PathBuf,
    },

    /// Print the default settings
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let overrides = Overrides {
        root_name: cli.root,
        max_call_depth: cli.max_depth,
    };

    match cli.command {
        Commands::Mro { file, ty, no_root } => {
            let loaded = c3mro_cli::load(&file, &overrides)?;
            println!("{}", c3mro_cli::mro(&loaded, &ty, !no_root)?);
        }
        Commands::Invoke { file, ty, method } => {
            let loaded = c3mro_cli::load(&file, &overrides)?;
            let transcript = c3mro_cli::invoke(&loaded, &ty, &method)?;
            if !transcript.is_empty() {
                println!("{}", transcript);
            }
        }
        Commands::Which { file, ty, method } => {
            let loaded = c3mro_cli::load(&file, &overrides)?;
            let listing = c3mro_cli::which(&loaded, &ty, &method)?;
            if listing.is_empty() {
                println!("No implementation of `{}` visible from {}", method, ty);
            } else {
                println!("{}", listing);
            }
        }
        Commands::Check { file } => cmd_check(&file, &overrides)?,
        Commands::Run { file } => cmd_run(&file, &overrides)?,
        Commands::Config => println!("{}", c3mro_cli::default_config()?),
    }

    Ok(())
}

fn cmd_check(file: &PathBuf, overrides: &Overrides) -> Result<()> {
    let loaded = c3mro_cli::load(file, overrides)?;
    let report = c3mro_cli::check(&loaded);
    for line in &report.lines {
        println!("{}", line);
    }

    info!(
        "Checked {} types, {} inconsistent",
        report.lines.len(),
        report.failures
    );
    if report.failures > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_run(file: &PathBuf, overrides: &Overrides) -> Result<()> {
    let loaded = c3mro_cli::load(file, overrides)?;
    let summary = c3mro_cli::run(&loaded)?;

    println!("Running {} scenarios...", summary.passed + summary.failed);
    for line in &summary.lines {
        println!("{}", line);
    }
    println!();
    println!("{} passed, {} failed", summary.passed, summary.failed);

    if summary.failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
