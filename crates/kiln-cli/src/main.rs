//! Kiln CLI - compile and run generated Rust programs.

mod batch;
mod colors;
mod deps;
mod options;
mod output;
mod run;

use clap::{Parser, Subcommand};

use options::ExecOptions;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Compile and run generated Rust programs under a time limit")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one program and print its result
    Run {
        /// Path to the program (.rs file)
        file: String,

        /// Function execution starts at
        #[arg(long, default_value = "main")]
        entry: String,

        /// JSON file with input rows (array of string maps)
        #[arg(long)]
        input: Option<String>,

        #[command(flatten)]
        exec: ExecOptions,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the external crates a program depends on
    Deps {
        /// Path to the program (.rs file)
        file: String,

        /// Print the manifest as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run several programs concurrently
    Batch {
        /// Paths to the programs (.rs files)
        #[arg(required = true)]
        files: Vec<String>,

        /// Function execution starts at, for every program
        #[arg(long, default_value = "main")]
        entry: String,

        #[command(flatten)]
        exec: ExecOptions,

        /// Print one JSON result per line
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Helper to format kiln-core errors with recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(kiln_err) = err.downcast_ref::<kiln_core::Error>() {
            anyhow::anyhow!("{}", kiln_err.with_hint())
        } else {
            err
        }
    };

    let succeeded = match cli.command {
        Commands::Run {
            file,
            entry,
            input,
            exec,
            json,
        } => run::execute(&file, &entry, input.as_deref(), &exec, json).map_err(format_error)?,

        Commands::Deps { file, json } => {
            deps::execute(&file, json).map_err(format_error)?;
            true
        }

        Commands::Batch {
            files,
            entry,
            exec,
            json,
        } => batch::execute(files, entry, &exec, json).await.map_err(format_error)?,
    };

    if !succeeded {
        std::process::exit(1);
    }

    Ok(())
}
