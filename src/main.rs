use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use deepsearch_mcp::agent::{error_result, ResearchAgent};
use deepsearch_mcp::config::{
    default_config_path, find_config_file, get_config, load_config, Config, LogFormat,
};
use deepsearch_mcp::llm::GeminiClient;
use deepsearch_mcp::mcp::McpServer;
use deepsearch_mcp::models::{get_effort_settings, DeepSearchResult, Effort, ResearchState};
use deepsearch_mcp::ui;
use deepsearch_mcp::utils::{CacheResult, CacheService};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// DeepSearch MCP - Deep web research with Gemini, served over MCP
#[derive(Parser, Debug)]
#[command(name = "deepsearch-mcp")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "MCP server for deep web research with Gemini and Google Search", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Show all environment variables
    #[arg(long, global = true)]
    env: bool,

    /// Disable the result cache for this command
    #[arg(long, global = true, default_value_t = false)]
    no_cache: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Output format for results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Automatic based on terminal (pretty if TTY, JSON otherwise)
    Auto,
    /// JSON format (machine-readable)
    Json,
    /// Plain text format
    Plain,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the MCP server (stdio by default)
    Serve {
        /// Serve streamable HTTP instead of stdio
        #[arg(long)]
        http: bool,

        /// Host to bind to in HTTP mode (default from config)
        #[arg(long)]
        host: Option<String>,

        /// Port to bind to in HTTP mode (default from config)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Run a deep search from the command line
    #[command(alias = "s")]
    Search {
        /// Research question or topic
        query: String,

        /// Search effort
        #[arg(long, short, default_value = "low")]
        effort: Effort,

        /// Override the number of initial search queries
        #[arg(long)]
        initial_queries: Option<usize>,

        /// Override the maximum number of research loops
        #[arg(long)]
        max_loops: Option<usize>,

        /// Output format
        #[arg(long, short, value_enum, default_value_t = OutputFormat::Auto)]
        output: OutputFormat,
    },

    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Manage the local result cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Generate shell completions
    Completions {
        /// Target shell
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Write a default configuration file
    Init {
        /// Where to write the file (default: user config directory)
        #[arg(long)]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },

    /// Show the effective configuration (secrets masked)
    Show,
}

#[derive(Subcommand, Debug)]
enum CacheCommands {
    /// Show cache status and statistics
    Status,

    /// Clear all cached results
    Clear,
}

/// Print all available environment variables
fn print_env_vars() {
    println!("DeepSearch MCP - Environment Variables");
    println!();
    println!("API Keys:");
    println!("  GEMINI_API_KEY              Gemini API key (required for searches)");
    println!("  GOOGLE_API_KEY              Fallback when GEMINI_API_KEY is unset");
    println!();
    println!("Agent Settings:");
    println!("  QUERY_GENERATOR_MODEL       Model for query generation and web research");
    println!("  REFLECTION_MODEL            Model for reflection");
    println!("  ANSWER_MODEL                Model for the final answer");
    println!("  NUMBER_OF_INITIAL_QUERIES   Default number of initial queries (default: 3)");
    println!("  MAX_RESEARCH_LOOPS          Default research loop budget (default: 2)");
    println!();
    println!("Configuration Overrides (nested keys use __):");
    println!("  DEEPSEARCH_GEMINI__BASE_URL         Gemini API base URL");
    println!("  DEEPSEARCH_GEMINI__TIMEOUT_SECONDS  Request timeout (default: 120)");
    println!("  DEEPSEARCH_GEMINI__MAX_RETRIES      Retries for transient errors (default: 2)");
    println!("  DEEPSEARCH_CACHE__ENABLED           Enable the result cache (default: false)");
    println!("  DEEPSEARCH_CACHE__DIRECTORY         Custom cache directory");
    println!("  DEEPSEARCH_CACHE__TTL_SECONDS       TTL for cached results (default: 3600)");
    println!("  DEEPSEARCH_SERVER__HOST             HTTP host (default: 127.0.0.1)");
    println!("  DEEPSEARCH_SERVER__PORT             HTTP port (default: 8000)");
    println!("  DEEPSEARCH_LOGGING__LEVEL           Log level (default: info)");
    println!("  DEEPSEARCH_LOGGING__FORMAT          Log format: text or json (default: text)");
    println!();
    println!("Other Settings:");
    println!("  RUST_LOG                    Overrides the log filter (e.g., deepsearch_mcp=debug)");
    println!();
    println!("Example:");
    println!("  export GEMINI_API_KEY=\"your-key-here\"");
    println!("  export DEEPSEARCH_CACHE__ENABLED=true");
}

/// Load configuration from the given path, a default location, or the environment
fn resolve_config(path: Option<&PathBuf>) -> Result<(Config, Option<PathBuf>)> {
    let found = path.cloned().or_else(find_config_file);
    let mut config = match &found {
        Some(path) => load_config(path)
            .with_context(|| format!("Failed to load config file {}", path.display()))?,
        None => get_config().context("Failed to read configuration from environment")?,
    };
    config.agent = config.agent.with_env_overrides();
    Ok((config, found))
}

/// Compute the log filter from flags and configuration
fn log_filter(verbose: u8, quiet: bool, configured: &str) -> String {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => configured,
            1 => "debug",
            _ => "trace",
        }
    };
    format!("deepsearch_mcp={}", level)
}

/// Initialize tracing; logs always go to stderr so stdio stays clean
fn init_tracing(filter: String, format: LogFormat) {
    let env_filter =
        tracing_subscriber::EnvFilter::new(std::env::var("RUST_LOG").unwrap_or(filter));
    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
    }
}

fn build_agent(config: &Config) -> Result<Arc<ResearchAgent>> {
    let client = GeminiClient::from_config(config)?;
    if !client.has_api_key() {
        tracing::warn!("No Gemini API key configured; set GEMINI_API_KEY");
    }
    Ok(Arc::new(ResearchAgent::new(
        Arc::new(client),
        config.agent.clone(),
    )))
}

fn build_cache(config: &Config) -> CacheService {
    CacheService::from_config(config.cache.clone()).with_namespace(config.agent.cache_namespace())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.env {
        print_env_vars();
        return Ok(());
    }

    let (mut config, config_path) = resolve_config(cli.config.as_ref())?;
    if cli.no_cache {
        config.cache.enabled = false;
    }

    init_tracing(
        log_filter(cli.verbose, cli.quiet, &config.logging.level),
        config.logging.format,
    );
    if let Some(path) = &config_path {
        tracing::info!("Using config file: {}", path.display());
    }

    match cli.command {
        None => serve(&config, false, None, None).await?,

        Some(Commands::Serve { http, host, port }) => serve(&config, http, host, port).await?,

        Some(Commands::Search {
            query,
            effort,
            initial_queries,
            max_loops,
            output,
        }) => {
            let agent = build_agent(&config)?;
            let overridden = initial_queries.is_some() || max_loops.is_some();
            let cache = build_cache(&config);
            cache.initialize()?;

            let pretty = match output {
                OutputFormat::Auto => ui::is_terminal(),
                _ => false,
            };

            if pretty && !cli.quiet {
                ui::print_search_header(&query, effort);
            }
            let spinner = (pretty && !cli.quiet).then(|| ui::Spinner::new("Researching..."));
            let started = Instant::now();

            let cached = if overridden {
                CacheResult::Miss
            } else {
                cache.get(&query, effort)
            };
            let outcome = match cached {
                CacheResult::Hit(result) => Ok(result),
                CacheResult::Miss | CacheResult::Expired => {
                    let mut state = ResearchState::from_query(&query, &get_effort_settings(effort));
                    if initial_queries.is_some() {
                        state.initial_search_query_count = initial_queries;
                    }
                    if max_loops.is_some() {
                        state.max_research_loops = max_loops;
                    }

                    let outcome = agent.run(state).await.map(DeepSearchResult::from_state);
                    if let (Ok(result), false) = (&outcome, overridden) {
                        cache.set(&query, effort, result);
                    }
                    outcome
                }
            };

            let result = match outcome {
                Ok(result) => {
                    if let Some(spinner) = &spinner {
                        spinner.finish_with_success(&format!(
                            "Research complete ({} sources)",
                            result.sources.len()
                        ));
                    }
                    result
                }
                Err(e) => {
                    if let Some(spinner) = &spinner {
                        spinner.finish_with_error("Research failed");
                    }
                    error_result(&e)
                }
            };

            match output {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                OutputFormat::Plain => print!("{}", ui::format_plain(&result)),
                OutputFormat::Auto if pretty => ui::print_result(&result, started.elapsed()),
                OutputFormat::Auto => println!("{}", serde_json::to_string_pretty(&result)?),
            }
        }

        Some(Commands::Config { command }) => match command {
            ConfigCommands::Init { path, force } => {
                let path = path
                    .or_else(default_config_path)
                    .context("Could not determine a config directory; pass --path")?;
                if path.exists() && !force {
                    anyhow::bail!(
                        "{} already exists (use --force to overwrite)",
                        path.display()
                    );
                }

                let mut template = Config::default();
                template.api_keys.gemini = None;

                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(&path, template.to_toml()?)?;
                if !cli.quiet {
                    ui::print_status(
                        ui::Status::Success,
                        &format!("Wrote configuration to {}", path.display()),
                    );
                }
            }
            ConfigCommands::Show => {
                print!("{}", config.redacted().to_toml()?);
            }
        },

        Some(Commands::Cache { command }) => {
            let cache = build_cache(&config);
            cache.initialize()?;

            match command {
                CacheCommands::Status => {
                    let stats = cache.stats();
                    if !stats.enabled {
                        println!("Cache: disabled");
                        println!("To enable, set DEEPSEARCH_CACHE__ENABLED=true");
                    } else {
                        println!("Cache: enabled");
                        println!("Directory: {}", stats.cache_dir.display());
                        println!("Cached results: {} ({} KB)", stats.entries, stats.size_kb);
                        println!("TTL: {} seconds", stats.ttl.as_secs());
                    }
                }
                CacheCommands::Clear => {
                    if cache.clear()? {
                        if !cli.quiet {
                            eprintln!("Cache cleared successfully.");
                        }
                    } else {
                        println!("Cache: disabled, nothing to clear");
                        println!("To enable, set DEEPSEARCH_CACHE__ENABLED=true");
                    }
                }
            }
        }

        Some(Commands::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "deepsearch-mcp", &mut std::io::stdout());
        }
    }

    Ok(())
}

async fn serve(config: &Config, http: bool, host: Option<String>, port: Option<u16>) -> Result<()> {
    let agent = build_agent(config)?;
    let cache = build_cache(config);
    cache.initialize()?;

    let server = McpServer::new(agent, cache)?;

    if http {
        let addr = format!(
            "{}:{}",
            host.unwrap_or_else(|| config.server.host.clone()),
            port.unwrap_or(config.server.port)
        );
        let (bound_addr, handle) = server.run_http(&addr).await?;
        tracing::info!("MCP server listening on http://{}", bound_addr);

        tokio::select! {
            result = handle => {
                result.map_err(|e| anyhow::anyhow!("Server task failed: {}", e))?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutting down");
            }
        }
    } else {
        server.run().await?;
    }

    Ok(())
}
