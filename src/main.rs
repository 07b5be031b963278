//! Build logic CLI
//!
//! Entry point for the `build-logic` command-line tool.

use build_logic::analysis::AnalysisSchema;
use build_logic::config::{self, ConfigLayers, EffectiveConfig, Settings};
use build_logic::convert_block_to_document;
use clap::{Parser, Subcommand};
use dcl_language::{extract_top_level_block, parse, SourceIdentifier, SCRIPT_EXTENSION};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "build-logic")]
#[command(about = "Declarative build script analysis", version)]
struct Cli {
    /// Path to project config file (default: ./build-logic.toml)
    #[arg(long, short = 'c', global = true)]
    config: Option<PathBuf>,

    /// Enable a document check feature (repeatable)
    #[arg(long = "feature", global = true)]
    features: Vec<String>,

    /// Block allowed at most once at the top level (repeatable)
    #[arg(long = "single-block", global = true)]
    single_blocks: Vec<String>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lower a script into a document and print it as JSON
    Document {
        /// The script to convert
        script: PathBuf,
    },

    /// Run the analysis step on a script
    Evaluate {
        /// The script to evaluate
        script: PathBuf,

        /// Analysis schema (TOML); overrides analysis.schema from config
        #[arg(long, short = 's')]
        schema: Option<PathBuf>,
    },

    /// Print the single top-level block with the given name
    ExtractBlock {
        /// The script to search
        script: PathBuf,

        /// Block name, e.g. plugins
        name: String,

        /// Print only the block body
        #[arg(long)]
        body: bool,
    },

    /// Evaluate every script under a directory
    Check {
        /// Directory to walk
        dir: PathBuf,

        /// Analysis schema (TOML); overrides analysis.schema from config
        #[arg(long, short = 's')]
        schema: Option<PathBuf>,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let effective = match load_effective_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    };

    match cli.command {
        Commands::Document { script } => run_document(&script),
        Commands::Evaluate { script, schema } => run_evaluate(&effective, &script, schema),
        Commands::ExtractBlock { script, name, body } => run_extract_block(&script, &name, body),
        Commands::Check { dir, schema, json } => run_check(&effective, &dir, schema, json),
        Commands::Config => print_json(&effective),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn load_effective_config(cli: &Cli) -> Result<EffectiveConfig, config::ConfigError> {
    let user = config::default_user_config_path();
    let project = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(config::PROJECT_CONFIG_FILE));

    let mut analysis = serde_json::Map::new();
    if !cli.features.is_empty() {
        analysis.insert("features".to_string(), serde_json::json!(cli.features));
    }
    if !cli.single_blocks.is_empty() {
        analysis.insert("single_blocks".to_string(), serde_json::json!(cli.single_blocks));
    }
    let overrides = (!analysis.is_empty()).then(|| serde_json::json!({ "analysis": analysis }));

    let layers = ConfigLayers {
        user: user.as_deref(),
        project: Some(project.as_path()),
        cli: overrides,
    };
    EffectiveConfig::build(layers, |key| std::env::var(key).ok())
}

fn settings_of(effective: &EffectiveConfig) -> Settings {
    match effective.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            process::exit(1);
        }
    }
}

fn read_script(path: &Path) -> String {
    match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) => {
            eprintln!("Error reading {}: {}", path.display(), e);
            process::exit(1);
        }
    }
}

fn load_schema(settings: &Settings, schema: Option<PathBuf>) -> Option<AnalysisSchema> {
    let loaded = match schema {
        Some(path) => AnalysisSchema::load(&path).map(Some),
        None => settings.load_schema(),
    };
    match loaded {
        Ok(schema) => schema,
        Err(e) => {
            eprintln!("Error loading schema: {}", e);
            process::exit(1);
        }
    }
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_document(script: &Path) {
    let text = read_script(script);
    let tree = parse(SourceIdentifier::new(script.display().to_string()), &text);
    let converted = convert_block_to_document(&tree.top_level_block);
    let document = &converted.document;

    let errors: Vec<serde_json::Value> = document
        .error_nodes()
        .flat_map(|node| &node.errors)
        .map(|error| {
            serde_json::json!({
                "message": error.message(),
                "line": error.source().start_position.line,
                "column": error.source().start_position.column,
            })
        })
        .collect();

    print_json(&serde_json::json!({
        "content": document.to_json(),
        "errors": errors,
    }));

    if !errors.is_empty() {
        process::exit(1);
    }
}

fn run_evaluate(effective: &EffectiveConfig, script: &Path, schema: Option<PathBuf>) {
    let settings = settings_of(effective);
    let runner = settings.step_runner(load_schema(&settings, schema));

    let text = read_script(script);
    let result = runner.run_on_text(&script.display().to_string(), &text);
    print_json(&result);

    if !result.is_evaluated() {
        process::exit(1);
    }
}

fn run_extract_block(script: &Path, name: &str, body: bool) {
    let text = read_script(script);
    match extract_top_level_block(&text, name) {
        Ok(Some(block)) if body => println!("{}", block.body_text(&text)),
        Ok(Some(block)) => println!("{}", block.text(&text)),
        Ok(None) => {
            eprintln!("No `{}` block in {}", name, script.display());
            process::exit(1);
        }
        Err(e) => {
            eprintln!("{}: {}", script.display(), e);
            process::exit(1);
        }
    }
}

#[derive(Serialize)]
struct CheckOutcome {
    script: String,
    evaluated: bool,
    failures: Vec<String>,
}

fn run_check(effective: &EffectiveConfig, dir: &Path, schema: Option<PathBuf>, json_output: bool) {
    let settings = settings_of(effective);
    let runner = settings.step_runner(load_schema(&settings, schema));

    let mut outcomes = Vec::new();
    let scripts = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!("skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == SCRIPT_EXTENSION));

    for entry in scripts {
        let path = entry.path();
        let text = read_script(path);
        let result = runner.run_on_text(&path.display().to_string(), &text);
        tracing::debug!(script = %path.display(), evaluated = result.is_evaluated(), "checked script");
        outcomes.push(CheckOutcome {
            script: path.display().to_string(),
            evaluated: result.is_evaluated(),
            failures: result
                .stage_failures()
                .iter()
                .map(|failure| failure.name().to_string())
                .collect(),
        });
    }

    if json_output {
        print_json(&outcomes);
    } else {
        for outcome in &outcomes {
            if outcome.evaluated {
                println!("ok    {}", outcome.script);
            } else {
                println!("FAIL  {} ({})", outcome.script, outcome.failures.join(", "));
            }
        }
        println!();
        println!(
            "{} scripts, {} failed",
            outcomes.len(),
            outcomes.iter().filter(|o| !o.evaluated).count()
        );
    }

    if outcomes.iter().any(|o| !o.evaluated) {
        process::exit(1);
    }
}
