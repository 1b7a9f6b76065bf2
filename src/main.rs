//! toolrelay: directive-driven tool orchestration for language models.
//!
//! Usage:
//!   toolrelay init               Write a default config
//!   toolrelay run [QUERY]        Run the orchestration loop
//!   toolrelay serve              Serve the builtin tools over stdio
//!   toolrelay tools              List the tool catalog
//!   toolrelay call TOOL [ARGS]   Call one tool directly
//!   toolrelay history            Show journaled runs
//!   toolrelay recipe FILE        Normalize a recipe payload

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use toolrelay::agent::coerce::coerce_arguments;
use toolrelay::agent::context::render_entry;
use toolrelay::agent::{LoopSettings, Orchestrator, RunOutcome};
use toolrelay::config::{self, ServerMode, ToolrelayConfig, CONFIG_FILE_NAME};
use toolrelay::inference;
use toolrelay::mcp::{self, StdioToolServer};
use toolrelay::recipe::RecipePayload;
use toolrelay::state::Journal;
use toolrelay::tools::{LocalMailbox, LocalToolServer, ToolRegistry, ToolServer};
use toolrelay::types::RunState;

// ---------------------------------------------------------------------------
// CLI definition
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "toolrelay")]
#[command(version)]
#[command(about = "Drive tool servers from single-line model directives")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to toolrelay home directory.
    #[arg(long, default_value = "~/.toolrelay")]
    home: String,

    /// Log level (debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a default toolrelay.toml into the home directory.
    Init {
        /// Overwrite an existing config.
        #[arg(long)]
        force: bool,
    },

    /// Run one query through the orchestration loop.
    Run {
        /// The query. Defaults to `agent.default_query`.
        query: Option<String>,
    },

    /// Serve the builtin tools as a stdio tool server.
    Serve,

    /// List the tool catalog.
    Tools,

    /// Call one tool with positional arguments, bypassing the model.
    Call {
        tool: String,
        args: Vec<String>,
    },

    /// Show recently journaled runs.
    History {
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Show the progress log of one run.
        #[arg(long)]
        run: Option<String>,
    },

    /// Normalize a model-produced recipe payload and print it as markdown.
    Recipe {
        file: PathBuf,

        /// Ingredients the recipe was requested for (comma separated).
        #[arg(long, value_delimiter = ',')]
        ingredients: Vec<String>,
    },
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr; `serve` owns stdout.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let home_dir = PathBuf::from(shellexpand::tilde(&cli.home).into_owned());

    match cli.command {
        Commands::Init { force } => cmd_init(&home_dir, force),
        Commands::Run { query } => cmd_run(&home_dir, query).await,
        Commands::Serve => cmd_serve(&home_dir).await,
        Commands::Tools => cmd_tools(&home_dir).await,
        Commands::Call { tool, args } => cmd_call(&home_dir, &tool, &args).await,
        Commands::History { limit, run } => cmd_history(&home_dir, limit, run.as_deref()),
        Commands::Recipe { file, ingredients } => cmd_recipe(&file, &ingredients),
    }
}

// ---------------------------------------------------------------------------
// Command implementations
// ---------------------------------------------------------------------------

fn cmd_init(home_dir: &Path, force: bool) -> Result<()> {
    let config_path = home_dir.join(CONFIG_FILE_NAME);
    if config_path.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }
    config::save_config(&ToolrelayConfig::default(), &config_path)?;
    println!(
        "{} Wrote {}",
        ">>>".green().bold(),
        config_path.display()
    );
    Ok(())
}

async fn cmd_run(home_dir: &Path, query: Option<String>) -> Result<()> {
    let cfg = load(home_dir)?;
    let query = query.unwrap_or_else(|| cfg.agent.default_query.clone());

    let model = inference::build_model(&cfg.model)?;
    let server = build_tool_server(&cfg).await?;
    let settings = LoopSettings::from_config(&cfg.agent, &cfg.model);

    let cancel = CancellationToken::new();
    let orchestrator = Orchestrator::new(model, server, settings)
        .await?
        .with_cancellation(cancel.clone());

    // Ctrl-C stops the run at the next iteration boundary.
    let ctrl_c_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Cancelling after the current step...", "<<<".red().bold());
            ctrl_c_cancel.cancel();
        }
    });

    println!(
        "{} Running with model {} ({} tools)",
        ">>>".green().bold(),
        cfg.model.model,
        orchestrator.registry().len(),
    );

    let report = orchestrator.run(&query, RunState::new()).await;

    for entry in &report.state.progress {
        println!("  {}", render_entry(entry).dimmed());
    }
    match &report.outcome {
        RunOutcome::Completed { answer } => {
            println!("\n{} {}", "=== Final Answer ===".green().bold(), answer)
        }
        RunOutcome::MaxIterationsReached { .. } => {
            println!("\n{} {}", "Incomplete:".yellow().bold(), report.outcome.message())
        }
        RunOutcome::Cancelled => println!("\n{}", "Cancelled".yellow().bold()),
        RunOutcome::Failed { .. } => {
            eprintln!("\n{} {}", "Error:".red().bold(), report.outcome.message())
        }
    }

    if cfg.journal.enabled {
        let db_path = cfg.resolved_db_path();
        match Journal::open(Path::new(&db_path)).and_then(|mut j| j.record_run(&report)) {
            Ok(()) => info!("Run {} journaled", report.run_id),
            Err(e) => warn!("Failed to journal run {}: {:#}", report.run_id, e),
        }
    }

    if matches!(report.outcome, RunOutcome::Failed { .. }) {
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_serve(home_dir: &Path) -> Result<()> {
    let cfg = load(home_dir)?;
    let server = local_server(&cfg)?;
    mcp::serve(&server).await
}

async fn cmd_tools(home_dir: &Path) -> Result<()> {
    let cfg = load(home_dir)?;
    let server = build_tool_server(&cfg).await?;
    let registry = ToolRegistry::from_catalog(server.list_tools().await?);

    println!();
    println!("{}", "=== Tool Catalog ===".bold());
    println!();
    for tool in registry.visible(&[]) {
        let hidden = !cfg.agent.tool_filter.is_empty()
            && !cfg.agent.tool_filter.iter().any(|t| *t == tool.name);
        let signature = if hidden {
            tool.signature().dimmed().to_string()
        } else {
            tool.signature().bold().to_string()
        };
        println!("  {}  {}", signature, tool.description);
    }
    println!();
    Ok(())
}

async fn cmd_call(home_dir: &Path, tool: &str, args: &[String]) -> Result<()> {
    let cfg = load(home_dir)?;
    let server = build_tool_server(&cfg).await?;
    let registry = ToolRegistry::from_catalog(server.list_tools().await?);

    let descriptor = registry.lookup(tool)?;
    let arguments = coerce_arguments(descriptor, args, &cfg.agent.default_friendly_tools)?;
    info!("Calling {} with {}", tool, serde_json::Value::Object(arguments.clone()));

    let response = server.call_tool(tool, arguments).await?;
    if response.is_error {
        eprintln!("{} {}", "Error:".red().bold(), response.summary());
        std::process::exit(1);
    }
    println!("{}", response.summary());
    Ok(())
}

fn cmd_history(home_dir: &Path, limit: usize, run: Option<&str>) -> Result<()> {
    let cfg = load(home_dir)?;
    let db_path = cfg.resolved_db_path();
    let journal = Journal::open(Path::new(&db_path))
        .with_context(|| format!("Failed to open journal at {}", db_path))?;

    if let Some(run_id) = run {
        let entries = journal.progress_for(run_id)?;
        if entries.is_empty() {
            println!("No progress entries for run {}", run_id);
        }
        for entry in &entries {
            println!("{}", render_entry(entry));
        }
        return Ok(());
    }

    let runs = journal.recent_runs(limit)?;
    if runs.is_empty() {
        println!("No runs journaled yet.");
        return Ok(());
    }
    for run in runs {
        println!(
            "{}  {}  {:<15} {} step(s)  {}",
            run.started_at.format("%Y-%m-%d %H:%M:%S"),
            run.id.dimmed(),
            colorize_outcome(&run.outcome),
            run.iteration_count,
            run.query,
        );
        if !run.message.is_empty() {
            println!("    {}", run.message);
        }
    }
    Ok(())
}

fn cmd_recipe(file: &Path, ingredients: &[String]) -> Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let payload = RecipePayload::classify(&raw);
    info!("Recipe payload shape: {}", payload.kind());
    if matches!(payload, RecipePayload::FreeText(_)) {
        warn!("Payload is not a recipe object; using a fallback recipe");
    }
    print!("{}", payload.into_recipe(ingredients).to_markdown());
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Load config from the home directory. A missing file means defaults.
fn load(home_dir: &Path) -> Result<ToolrelayConfig> {
    let config_path = home_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        warn!(
            "No config at {}, using defaults (run `toolrelay init` to create one)",
            config_path.display()
        );
    }
    config::load_config(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))
}

fn local_server(cfg: &ToolrelayConfig) -> Result<LocalToolServer> {
    let mailbox_path = cfg.resolved_mailbox_path();
    let mailbox = LocalMailbox::open(Path::new(&mailbox_path), &cfg.mailbox.address)
        .with_context(|| format!("Failed to open mailbox at {}", mailbox_path))?;
    Ok(LocalToolServer::new(Arc::new(mailbox)))
}

async fn build_tool_server(cfg: &ToolrelayConfig) -> Result<Arc<dyn ToolServer>> {
    match cfg.server.mode {
        ServerMode::InProcess => Ok(Arc::new(local_server(cfg)?)),
        ServerMode::Stdio => {
            if cfg.server.command.is_empty() {
                bail!("server.mode is \"stdio\" but server.command is empty");
            }
            let server = StdioToolServer::spawn(&cfg.server.command, &cfg.server.args)
                .await
                .map_err(|e| {
                    error!("Tool server failed to start: {}", e);
                    e
                })?;
            Ok(Arc::new(server))
        }
    }
}

fn colorize_outcome(outcome: &str) -> String {
    match outcome {
        "completed" => outcome.green().to_string(),
        "max_iterations" | "cancelled" => outcome.yellow().to_string(),
        "failed" => outcome.red().to_string(),
        _ => outcome.dimmed().to_string(),
    }
}
