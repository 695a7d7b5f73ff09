mod config_commands;
mod panel_commands;

use std::path::PathBuf;

use {
    anyhow::bail,
    clap::{Parser, Subcommand},
    tracing::{debug, info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
    warden_auth::Authenticator,
    warden_config::{Severity, WardenConfig},
    warden_metrics::{MetricsRecorderConfig, init_metrics},
};

#[derive(Parser)]
#[command(name = "warden", about = "warden: panel-backed authentication for proxy nodes")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Config file (overrides discovery in ./ and ~/.config/warden/).
    #[arg(long, global = true, env = "WARDEN_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Authenticate against the panel and report traffic until interrupted
    /// (default when no subcommand is provided).
    Run,
    /// Fetch the user list once and print a summary.
    Fetch {
        /// Print every account id and credential.
        #[arg(long)]
        list: bool,
    },
    /// Validate the configuration and report errors/warnings.
    CheckConfig {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Check whether a credential would be accepted.
    Probe { credential: String },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

/// Load the explicit config file, or discover one, then apply env overrides.
fn load_config(cli: &Cli) -> anyhow::Result<(WardenConfig, Option<PathBuf>)> {
    let (config, path) = match &cli.config {
        Some(path) => (warden_config::load_config(path)?, Some(path.clone())),
        None => warden_config::discover_and_load()?,
    };
    Ok((warden_config::apply_env_overrides(config), path))
}

async fn run(config: WardenConfig) -> anyhow::Result<()> {
    let validation = warden_config::validate(&config);
    for d in &validation.diagnostics {
        match d.severity {
            Severity::Error => tracing::error!(path = %d.path, "{}", d.message),
            Severity::Warning => warn!(path = %d.path, "{}", d.message),
            Severity::Info => info!(path = %d.path, "{}", d.message),
        }
    }
    if validation.has_errors() {
        bail!("invalid configuration, run `warden check-config` for details");
    }

    let metrics = init_metrics(MetricsRecorderConfig {
        enabled: config.metrics.enabled,
        global_labels: vec![("node_id".into(), config.panel.node_id.to_string())],
    })?;

    let auth = Authenticator::from_config(&config.panel, &config.sync).await?;
    info!(users = auth.stats().users, "authenticator ready");

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    let pending = auth.stats().pending_entries;
    auth.shutdown().await;
    debug!(pending, "authenticator stopped");

    if config.metrics.enabled {
        debug!(metrics = %metrics.render(), "final metrics");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "warden starting");

    let (config, path) = load_config(&cli)?;

    match cli.command {
        None | Some(Commands::Run) => run(config).await,
        Some(Commands::Fetch { list }) => panel_commands::fetch(&config, list).await,
        Some(Commands::CheckConfig { verbose }) => {
            config_commands::check(&config, path.as_deref(), verbose)
        },
        Some(Commands::Probe { credential }) => panel_commands::probe(&config, &credential).await,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, clap::CommandFactory};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = Cli::try_parse_from(["warden"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn parses_probe_and_global_flags() {
        let cli = Cli::try_parse_from([
            "warden",
            "probe",
            "abc",
            "--config",
            "/etc/warden.toml",
            "--json-logs",
        ])
        .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/warden.toml")));
        assert!(matches!(&cli.command, Some(Commands::Probe { credential }) if credential == "abc"));
    }
}
