use clap::{Parser, Subcommand};
use courier_core::config::AppConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;
use commands::{
    handle_config_command, run_invocation, utils::CliError, ConfigCommands, Invocation,
    InvokeOptions, RpcVersionArg,
};

#[derive(Parser)]
#[command(name = "courier-cli")]
#[command(about = "Courier CLI - one-shot invocations through the resilient invocation engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file (defaults to $COURIER_CONFIG or config/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an HTTP GET
    Get {
        url: String,

        /// Query parameter as key=value (repeatable)
        #[arg(short, long = "param")]
        params: Vec<String>,

        /// Serve from and store into the result cache
        #[arg(long)]
        cache: bool,

        #[command(flatten)]
        options: InvokeOptions,
    },

    /// Send an HTTP POST
    Post {
        url: String,

        /// Form-encoded body text
        #[arg(long)]
        body: Option<String>,

        /// JSON document body
        #[arg(long)]
        json: Option<String>,

        #[command(flatten)]
        options: InvokeOptions,
    },

    /// Send an RPC envelope
    Rpc {
        url: String,

        /// Envelope version
        #[arg(long, value_enum, default_value = "v1")]
        version: RpcVersionArg,

        /// JSON document body
        #[arg(long, default_value = "{}")]
        json: String,

        #[command(flatten)]
        options: InvokeOptions,
    },

    /// Configuration Management
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Installs the tracing subscriber. Logs go to stderr so stdout carries only the payload.
fn init_logging(config: &AppConfig) {
    let level = config.logging.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("warn,courier_core={level},courier_cli={level}"))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format.as_str() == "json" {
        let fmt_layer = tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .pretty()
            .with_file(true)
            .with_line_number(true)
            .with_target(false)
            .with_writer(std::io::stderr);
        registry.with(fmt_layer).init();
    }
}

fn load_config(path: Option<String>) -> Result<AppConfig, CliError> {
    let config = match path {
        Some(path) => AppConfig::from_file(&path),
        None => AppConfig::load(),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;

    config.validate().map_err(CliError::Config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let invocation = match cli.command {
        Commands::Config(config_command) => {
            handle_config_command(config_command)?;
            return Ok(());
        }
        Commands::Get { url, params, cache, options } => {
            Invocation::get(url, &params, cache, &options)?
        }
        Commands::Post { url, body, json, options } => Invocation::post(url, body, json, &options)?,
        Commands::Rpc { url, version, json, options } => {
            Invocation::rpc(url, version, &json, &options)?
        }
    };

    let config = load_config(cli.config)?;
    init_logging(&config);

    run_invocation(&config, invocation).await?;

    Ok(())
}
