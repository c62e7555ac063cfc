//! TSmart Hub CLI - endpoint policy validation, replay and live monitoring.
//!
//! Commands:
//! - `hub validate` - Check an endpoint's policies without samples
//! - `hub evaluate` - Replay recorded samples through the trigger evaluator
//! - `hub explain` - Write the execution-order report
//! - `hub export` - Write a normalized YAML/JSON export (optionally locked)
//! - `hub sdk` / `hub docs` - Render client snippets and endpoint docs
//! - `hub monitor` - Evaluate a live sample stream

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "hub")]
#[command(about = "Policy and trigger evaluation for TSmart Hub API endpoints")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "text", env = "HUB_LOG_FORMAT")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new hub project
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        path: String,
    },

    /// Check policies for configuration errors
    Validate {
        /// Policy document (.toon, .yaml, .yml or .json)
        #[arg(short, long, default_value = "endpoint.toon")]
        policy: String,

        /// Fail on warnings (not just violations)
        #[arg(long)]
        strict: bool,
    },

    /// Replay recorded samples and print what fired
    Evaluate {
        /// Policy document
        #[arg(short, long, default_value = "endpoint.toon")]
        policy: String,

        /// Sample file (CSV or JSON lines)
        #[arg(short, long, default_value = "samples.csv")]
        samples: String,

        /// Output format (text or json)
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Sample format; detected from the first line if omitted
        #[arg(long)]
        input_format: Option<String>,
    },

    /// Generate a report explaining execution order
    Explain {
        /// Policy document
        #[arg(short, long, default_value = "endpoint.toon")]
        policy: String,

        /// Output path for the report
        #[arg(short, long, default_value = "policy-report.md")]
        output: String,
    },

    /// Export policies in execution order
    Export {
        /// Policy document
        #[arg(short, long, default_value = "endpoint.toon")]
        policy: String,

        /// Output path
        #[arg(short, long, default_value = "hub-export.yaml")]
        output: String,

        /// Output format (yaml or json)
        #[arg(short, long, default_value = "yaml")]
        format: String,

        /// Keep disabled policies
        #[arg(long)]
        include_disabled: bool,

        /// Create a lockfile next to the policy document
        #[arg(long)]
        lock: bool,

        /// Fail if the export no longer matches the lockfile; writes nothing
        #[arg(long, conflicts_with = "lock")]
        check: bool,
    },

    /// Render a client snippet for an endpoint
    Sdk {
        /// Policy document
        #[arg(short, long, default_value = "endpoint.toon")]
        policy: String,

        /// Target language (typescript, python or curl)
        #[arg(short, long, default_value = "typescript")]
        language: String,

        /// Endpoint path; the first endpoint if omitted
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Public base URL of the hub
        #[arg(long, default_value = "https://api.example.com", env = "HUB_BASE_URL")]
        base_url: String,

        /// Output path; stdout if omitted
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Render endpoint documentation
    Docs {
        /// Policy document
        #[arg(short, long, default_value = "endpoint.toon")]
        policy: String,

        /// Public base URL of the hub
        #[arg(long, default_value = "https://api.example.com", env = "HUB_BASE_URL")]
        base_url: String,

        /// Output path
        #[arg(short, long, default_value = "endpoint-docs.md")]
        output: String,
    },

    /// Evaluate a live sample stream until end of input or Ctrl+C
    Monitor {
        /// Monitor configuration
        #[arg(short, long, default_value = "hub.yaml", env = "HUB_CONFIG")]
        config: String,

        /// Sample source; `-` reads stdin
        #[arg(short, long, default_value = "-")]
        samples: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    match cli.log_format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt().json().with_env_filter(filter).init(),
    }

    match cli.command {
        Commands::Init { path } => commands::init::run(&path),
        Commands::Validate { policy, strict } => commands::validate::run(&policy, strict),
        Commands::Evaluate {
            policy,
            samples,
            format,
            input_format,
        } => commands::evaluate::run(&policy, &samples, &format, input_format.as_deref()),
        Commands::Explain { policy, output } => commands::explain::run(&policy, &output),
        Commands::Export {
            policy,
            output,
            format,
            include_disabled,
            lock,
            check,
        } => {
            let lock = match (lock, check) {
                (_, true) => commands::export::LockMode::Check,
                (true, false) => commands::export::LockMode::Write,
                (false, false) => commands::export::LockMode::Skip,
            };
            commands::export::run(&policy, &output, &format, include_disabled, lock)
        }
        Commands::Sdk {
            policy,
            language,
            endpoint,
            base_url,
            output,
        } => commands::sdk::run(
            &policy,
            &language,
            endpoint.as_deref(),
            &base_url,
            output.as_deref(),
        ),
        Commands::Docs {
            policy,
            base_url,
            output,
        } => commands::docs::run(&policy, &base_url, &output),
        Commands::Monitor { config, samples } => commands::monitor::run(&config, &samples).await,
    }
}
