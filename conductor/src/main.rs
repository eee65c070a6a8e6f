//! Conductor CLI - run agents and execution plans, or serve them over HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Start the REST API server
//! conductor serve --port 8088
//!
//! # Inspect the registry
//! conductor agents list --category text
//! conductor agents search count
//!
//! # Run one agent
//! conductor run word_count --params '{"text": "hello world"}'
//!
//! # Run a plan
//! conductor plan echo delay word_count --mode parallel --max-concurrency 2 \
//!     --params '{"ms": 100, "text": "hi"}'
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use conductor::agents::{AgentMetadata, AgentRegistry};
use conductor::commands::{api, ConductorConfig, LogFormat};
use conductor::orchestration::{ExecutionMode, ExecutionPlan, Orchestrator};

#[derive(Parser)]
#[command(name = "conductor")]
#[command(about = "Conductor - Agent Execution Engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    Sequential,
    Parallel,
    Dag,
}

impl From<ModeArg> for ExecutionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Sequential => ExecutionMode::Sequential,
            ModeArg::Parallel => ExecutionMode::Parallel,
            ModeArg::Dag => ExecutionMode::Dag,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API server
    Serve {
        /// Bind host (overrides configuration)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides configuration)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Query the agent registry
    #[command(subcommand)]
    Agents(AgentCommands),

    /// Execute a single agent
    Run {
        /// Agent name
        name: String,

        /// Parameters as a JSON document
        #[arg(long)]
        params: Option<String>,
    },

    /// Execute several agents as a plan
    Plan {
        /// Agent names, in plan order
        #[arg(required = true)]
        agents: Vec<String>,

        /// Execution mode
        #[arg(long, value_enum, default_value = "sequential")]
        mode: ModeArg,

        /// Worker pool size (parallel and dag modes)
        #[arg(long)]
        max_concurrency: Option<usize>,

        /// Stop starting agents after the first failure
        #[arg(long)]
        stop_on_error: bool,

        /// Shared parameters as a JSON document
        #[arg(long)]
        params: Option<String>,

        /// Per-agent parameters, `NAME=JSON` (repeatable)
        #[arg(long = "override", value_name = "NAME=JSON")]
        overrides: Vec<String>,
    },
}

#[derive(Subcommand)]
enum AgentCommands {
    /// List registered agents
    List {
        /// Only agents in this category
        #[arg(long)]
        category: Option<String>,
    },

    /// List categories
    Categories,

    /// Registry statistics
    Stats,

    /// Search name, description and tags
    Search {
        /// Search text (case-insensitive)
        query: String,
    },

    /// Show one agent's metadata
    Show {
        /// Agent name
        name: String,
    },

    /// Export every agent's metadata
    Manifest,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let config = ConductorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.verbose, &config);

    let registry = AgentRegistry::with_builtin_agents().context("Failed to register built-in agents")?;

    match cli.command {
        Commands::Serve { host, port } => {
            let mut config = config;
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            config.validate()?;
            api::start_server(config, registry).await?;
        }

        Commands::Agents(cmd) => agents_command(cmd, &registry)?,

        Commands::Run { name, params } => {
            let params = parse_json(params.as_deref(), "--params")?;
            let orchestrator = Orchestrator::new(Arc::new(registry));
            let cancel = cancel_on_ctrl_c();

            let result = orchestrator
                .execute_agent_with_cancel(&name, params, &cancel)
                .await?;
            print_json(&result)?;

            if !result.is_success() {
                process::exit(1);
            }
        }

        Commands::Plan {
            agents,
            mode,
            max_concurrency,
            stop_on_error,
            params,
            overrides,
        } => {
            let mut plan = ExecutionPlan::new(agents, mode.into())
                .with_max_concurrency(config.execution.effective_concurrency(max_concurrency))
                .with_stop_on_error(stop_on_error)
                .with_params(parse_json(params.as_deref(), "--params")?);
            for entry in &overrides {
                let (name, json) = entry
                    .split_once('=')
                    .with_context(|| format!("Override must be NAME=JSON, got `{}`", entry))?;
                plan = plan.with_override(name, parse_json(Some(json), "--override")?);
            }

            let orchestrator = Orchestrator::new(Arc::new(registry));
            let cancel = cancel_on_ctrl_c();

            let result = orchestrator.run_plan_with_cancel(plan, &cancel).await?;
            print_json(&result)?;

            if result.failed_count > 0 || result.skipped_count > 0 {
                process::exit(1);
            }
        }
    }

    Ok(())
}

fn agents_command(cmd: AgentCommands, registry: &AgentRegistry) -> Result<()> {
    let metadata = |agents: Vec<Arc<dyn conductor::Agent>>| -> Vec<AgentMetadata> {
        agents.iter().map(|a| a.metadata().clone()).collect()
    };

    match cmd {
        AgentCommands::List { category } => {
            print_json(&metadata(registry.list_agents(category.as_deref())))
        }
        AgentCommands::Categories => print_json(&registry.list_categories()),
        AgentCommands::Stats => print_json(&registry.stats()),
        AgentCommands::Search { query } => print_json(&metadata(registry.search(&query))),
        AgentCommands::Show { name } => {
            let agent = registry
                .get(&name)
                .with_context(|| format!("Agent not found: {}", name))?;
            print_json(agent.metadata())
        }
        AgentCommands::Manifest => print_json(&registry.export_manifest()),
    }
}

/// Token cancelled on the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling");
            token.cancel();
        }
    });
    cancel
}

fn parse_json(raw: Option<&str>, flag: &str) -> Result<Value> {
    match raw {
        Some(raw) => serde_json::from_str(raw).with_context(|| format!("Invalid JSON for {}", flag)),
        None => Ok(Value::Object(Default::default())),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", out);
    Ok(())
}

fn init_logging(verbose: bool, config: &ConductorConfig) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("conductor=debug,info")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("conductor={},warn", config.logging.level)))
    };

    let registry = tracing_subscriber::registry().with(filter);

    // logs go to stderr; stdout carries command output
    match config.logging.format {
        LogFormat::Human => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }
}
