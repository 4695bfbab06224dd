use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing::{debug, info};

use gauge_core::config::Config;
use gauge_core::registry::AnalyzerRegistry;
use gauge_core::{AnalyzerKind, CodeGraph, MetricsReport};
use gauge_report::{json, markdown, text};

#[derive(Parser)]
#[command(name = "gauge")]
#[command(about = "Compute object-oriented metrics over a serialized code graph")]
#[command(version)]
struct Cli {
    /// Log verbosity (-v for debug, -vv for trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a code graph and print a metrics report
    Analyze {
        /// Path to the code graph (JSON)
        graph: PathBuf,
        /// Analyzer names or capability tags, comma separated (defaults to gauge.toml)
        #[arg(short, long, value_delimiter = ',')]
        metrics: Vec<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Emit single-line JSON
        #[arg(long)]
        compact: bool,
        /// Config file path (defaults to gauge.toml next to the graph or above it)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Ignore the result cache for this run
        #[arg(long)]
        no_cache: bool,
        /// Package left out of coupling analysis (repeatable)
        #[arg(long = "exclude-package", value_name = "PACKAGE")]
        exclude_packages: Vec<String>,
    },
    /// List analyzers, their aliases and capability tags
    List,
    /// Create a default gauge.toml configuration file
    Init {
        /// Overwrite existing config
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

struct AnalyzeArgs {
    graph: PathBuf,
    metrics: Vec<String>,
    format: OutputFormat,
    compact: bool,
    config: Option<PathBuf>,
    no_cache: bool,
    exclude_packages: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Analyze {
            graph,
            metrics,
            format,
            compact,
            config,
            no_cache,
            exclude_packages,
        } => cmd_analyze(AnalyzeArgs {
            graph,
            metrics,
            format,
            compact,
            config,
            no_cache,
            exclude_packages,
        }),
        Commands::List => cmd_list(),
        Commands::Init { force } => cmd_init(force),
    };

    if let Err(e) = result {
        eprintln!("{} {e:#}", "Error:".red().bold());
        process::exit(2);
    }
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn cmd_analyze(args: AnalyzeArgs) -> Result<()> {
    let graph_dir = args
        .graph
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let (config, config_path) = load_config(&graph_dir, args.config)?;
    // Relative cache directories belong to the config file that names them.
    let base = config_path
        .as_deref()
        .and_then(Path::parent)
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or(graph_dir);
    debug!(config = ?config_path, base = %base.display(), "configuration resolved");

    let mut overrides = HashMap::new();
    if args.no_cache {
        overrides.insert("no-cache".to_string(), "true".to_string());
    }
    if !args.exclude_packages.is_empty() {
        overrides.insert(
            "coupling-exclude".to_string(),
            args.exclude_packages.join(","),
        );
    }
    let options = config.analyzer_options(&base).with_options(&overrides);

    let metrics = if args.metrics.is_empty() {
        config.analysis.metrics.clone()
    } else {
        args.metrics
    };

    let graph = CodeGraph::load(&args.graph)?;
    info!(
        project = %graph.name,
        nodes = graph.node_count(),
        metrics = ?metrics,
        "analyzing code graph"
    );

    let mut registry = AnalyzerRegistry::new(options);
    let handles = registry
        .run(&graph, metrics.as_slice())
        .context("analysis failed")?;
    let report = MetricsReport::build(&graph, &handles);
    debug!(packages = report.packages.len(), "report assembled");

    let output = match args.format {
        OutputFormat::Text => text::format_report(&report),
        OutputFormat::Json => json::format_report(&report, args.compact)? + "\n",
        OutputFormat::Markdown => markdown::format_report(&report),
    };
    print!("{output}");
    Ok(())
}

fn cmd_list() -> Result<()> {
    for registration in AnalyzerRegistry::registrations() {
        let capabilities: Vec<&str> = registration
            .capabilities
            .iter()
            .map(|c| c.as_str())
            .collect();
        let name = format!("{:<12}", registration.kind.name());
        let mut line = format!("{} [{}]", name.bold(), capabilities.join(", "));
        let aliases = registration.kind.aliases();
        if !aliases.is_empty() {
            line.push_str(&format!("  aliases: {}", aliases.join(", ")));
        }
        let required = required_by(registration.kind);
        if !required.is_empty() {
            line.push_str(&format!("  requires: {required}"));
        }
        println!("{line}");
    }
    Ok(())
}

/// Dependencies of an analyzer kind, as declared by a fresh instance.
fn required_by(kind: AnalyzerKind) -> String {
    let mut registry = AnalyzerRegistry::new(Default::default());
    registry
        .resolve(&[kind.name()])
        .ok()
        .and_then(|handles| handles.into_iter().next())
        .map(|handle| {
            handle
                .required_analyzers()
                .iter()
                .map(|k| k.name())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

fn cmd_init(force: bool) -> Result<()> {
    let target = PathBuf::from("gauge.toml");
    if target.exists() && !force {
        anyhow::bail!("gauge.toml already exists. Use --force to overwrite.");
    }
    std::fs::write(&target, Config::default_toml()).context("failed to write gauge.toml")?;
    println!("Created gauge.toml with default configuration.");
    Ok(())
}

/// The configuration in effect and the file it came from, if any.
fn load_config(graph_dir: &Path, config_path: Option<PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    match config_path {
        Some(p) => Ok((Config::load(&p)?, Some(p))),
        None => Ok(Config::discover(graph_dir)),
    }
}
