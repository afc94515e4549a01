//! PopGuard CLI
//!
//! CLI tool for classifying element snapshots, measuring detection quality
//! and maintaining pattern store files.

mod classify;
mod evaluate;
mod input;
mod store;

use clap::{Parser, Subcommand};

use classify::{run_classify, ClassifyOptions};
use evaluate::{run_evaluate, EvaluateOptions};
use input::{load_config, parse_viewport};
use store::{run_cleanup, run_learn, run_list, StoreOptions};

#[derive(Parser)]
#[command(name = "pg-cli")]
#[command(about = "PopGuard pop-up classifier and pattern store tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify element snapshots (one object or an array per file)
    Classify {
        /// Snapshot JSON files
        #[arg(short, long, required = true)]
        input: Vec<String>,

        /// Viewport as WIDTHxHEIGHT
        #[arg(long, default_value = "1920x1080")]
        viewport: String,

        /// Domain whose learned patterns apply (needs --store)
        #[arg(short, long)]
        domain: Option<String>,

        /// Pattern store file
        #[arg(short, long)]
        store: Option<String>,

        /// Detector config JSON
        #[arg(short, long)]
        config: Option<String>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Score a labeled sample set and report precision / recall
    Evaluate {
        /// Labeled samples JSON file
        #[arg(short, long)]
        input: String,

        /// Viewport as WIDTHxHEIGHT
        #[arg(long, default_value = "1920x1080")]
        viewport: String,

        /// Candidate threshold (default 0.5)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Print every sample
        #[arg(short, long)]
        verbose: bool,
    },

    /// Inspect and maintain a pattern store file
    Patterns {
        #[command(subcommand)]
        command: PatternCommands,
    },
}

#[derive(Subcommand)]
enum PatternCommands {
    /// List stored patterns
    List {
        /// Pattern store file
        #[arg(short, long)]
        store: String,

        /// Only this domain
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Drop stale, weak and excess patterns
    Cleanup {
        /// Pattern store file
        #[arg(short, long)]
        store: String,

        /// Detector config JSON
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Learn from a JSON array of resolved pop-up records
    Learn {
        /// Pattern store file
        #[arg(short, long)]
        store: String,

        /// Popup records JSON file
        #[arg(short, long)]
        records: String,

        /// Detector config JSON
        #[arg(short, long)]
        config: Option<String>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify {
            input,
            viewport,
            domain,
            store,
            config,
            json,
        } => cmd_classify(input, &viewport, domain, store, config.as_deref(), json),
        Commands::Evaluate {
            input,
            viewport,
            threshold,
            verbose,
        } => parse_viewport(&viewport).and_then(|viewport| {
            run_evaluate(EvaluateOptions {
                input_path: input,
                viewport,
                threshold,
                verbose,
            })
        }),
        Commands::Patterns { command } => cmd_patterns(command),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn cmd_classify(
    input_paths: Vec<String>,
    viewport: &str,
    domain: Option<String>,
    store_path: Option<String>,
    config: Option<&str>,
    json: bool,
) -> Result<(), String> {
    run_classify(ClassifyOptions {
        input_paths,
        viewport: parse_viewport(viewport)?,
        domain,
        store_path,
        config: load_config(config)?,
        json,
    })
}

fn cmd_patterns(command: PatternCommands) -> Result<(), String> {
    match command {
        PatternCommands::List { store, domain } => run_list(
            StoreOptions {
                store_path: store,
                config: load_config(None)?,
            },
            domain,
        ),
        PatternCommands::Cleanup { store, config } => run_cleanup(StoreOptions {
            store_path: store,
            config: load_config(config.as_deref())?,
        }),
        PatternCommands::Learn {
            store,
            records,
            config,
        } => run_learn(
            StoreOptions {
                store_path: store,
                config: load_config(config.as_deref())?,
            },
            &records,
        ),
    }
}
