use clap::Subcommand;
use courier_core::config::AppConfig;
use std::path::Path;

use super::utils::{print_error, print_info, print_success, CliError, CliResult};

pub const SAMPLE_CONFIG: &str = r#"# Courier invocation engine configuration
# Every value below is the compiled default. Environment variables override
# any key, e.g. COURIER__RETRY__MAX_RETRIES=5.

[throttle]
# Minimum spacing between GETs to the same host
min_interval_ms = 1500
max_tracked_hosts = 20

# Per-host overrides of min_interval_ms
[throttle.host_intervals]
# "slow.example.com" = 5000

[timeouts.short]
connect_ms = 5000
read_ms = 7000

[timeouts.long]
connect_ms = 5000
read_ms = 180000

[cache]
in_memory = true
# Records older than this are stale
renewal_window_ms = 3600000
max_entries = 10000
overwrite = true

[retry]
max_retries = 2
backoff_min_ms = 200
backoff_max_ms = 1000

[fallback]
enabled = true
# user_agent = "Mozilla/5.0 ..."

[logging]
level = "info"
format = "pretty"
"#;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to config file
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,
    },

    /// Show the effective configuration (file, defaults and environment merged)
    Show {
        /// Path to config file
        #[arg(short, long, default_value = "config/config.toml")]
        file: String,
    },

    /// Generate a sample configuration file
    Generate {
        /// Output path for the config file
        #[arg(short, long, default_value = "config/config.toml")]
        output: String,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config_command(command: ConfigCommands) -> CliResult<()> {
    match command {
        ConfigCommands::Validate { file } => validate_config(&file),
        ConfigCommands::Show { file } => show_config(&file),
        ConfigCommands::Generate { output, force } => generate_config(&output, force),
    }
}

fn validate_config(file: &str) -> CliResult<()> {
    if !Path::new(file).exists() {
        print_error(&format!("Configuration file not found: {file}"));
        return Err(CliError::Config(format!("File not found: {file}")));
    }

    print_info(&format!("Loading configuration from {file}..."));
    let config = AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;

    print_info("Validating configuration...");
    config.validate().map_err(CliError::Config)?;

    print_success("Configuration is valid!");

    println!("Configuration Summary:");
    println!(
        "  Throttle: {}ms per host ({} overrides)",
        config.throttle.min_interval_ms,
        config.throttle.host_intervals.len()
    );
    println!(
        "  Cache: {}",
        if config.cache.in_memory { "in-memory" } else { "disabled" }
    );
    println!("  Retries: {}", config.retry.max_retries);
    println!(
        "  Fallback: {}",
        if config.fallback.enabled { "enabled" } else { "disabled" }
    );

    Ok(())
}

fn show_config(file: &str) -> CliResult<()> {
    let config = AppConfig::from_file(file).map_err(|e| CliError::Config(e.to_string()))?;

    println!("Configuration from {file}:");

    println!("\n[Throttle]");
    println!("  Min Interval: {}ms", config.throttle.min_interval_ms);
    println!("  Max Tracked Hosts: {}", config.throttle.max_tracked_hosts);
    let mut overrides: Vec<_> = config.throttle.host_intervals.iter().collect();
    overrides.sort();
    for (host, interval) in overrides {
        println!("    {host}: {interval}ms");
    }

    println!("\n[Timeouts]");
    println!(
        "  Short: connect {}ms, read {}ms",
        config.timeouts.short.connect_ms, config.timeouts.short.read_ms
    );
    println!(
        "  Long: connect {}ms, read {}ms",
        config.timeouts.long.connect_ms, config.timeouts.long.read_ms
    );

    println!("\n[Cache]");
    println!("  In Memory: {}", config.cache.in_memory);
    println!("  Renewal Window: {}ms", config.cache.renewal_window_ms);
    println!("  Max Entries: {}", config.cache.max_entries);
    println!("  Overwrite: {}", config.cache.overwrite);

    println!("\n[Retry]");
    println!("  Max Retries: {}", config.retry.max_retries);
    println!("  Backoff: {}..{}ms", config.retry.backoff_min_ms, config.retry.backoff_max_ms);

    println!("\n[Fallback]");
    println!("  Enabled: {}", config.fallback.enabled);
    println!("  User Agent: {}", config.fallback.user_agent);

    println!("\n[Logging]");
    println!("  Level: {}", config.logging.level);
    println!("  Format: {}", config.logging.format);

    Ok(())
}

fn generate_config(output: &str, force: bool) -> CliResult<()> {
    if Path::new(output).exists() && !force {
        return Err(CliError::Config(format!(
            "File {output} already exists. Use --force to overwrite."
        )));
    }

    if let Some(parent) = Path::new(output).parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, SAMPLE_CONFIG)?;

    print_success(&format!("Sample configuration generated: {output}"));
    Ok(())
}
