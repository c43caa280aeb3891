/*
[INPUT]:  CLI arguments, YAML configuration file, OS shutdown signals
[OUTPUT]: Wallet login, payment and history operations with cancellation
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use zelid_connect::ZelidClient;
use zelid_connect_cli::{CliConfig, Command, build_connector, run_command};

#[derive(Parser, Debug)]
#[command(name = "zelid-connect-cli", version, about = "ZelID wallet login and payment client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "warn")]
    log_level: String,
    #[arg(long = "dry-run")]
    dry_run: bool,
    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    info!(dry_run = args.dry_run, "starting zelid-connect-cli");

    let config = load_config(args.config_path.as_ref())?;
    info!(
        id_base_url = %config.id_base_url,
        verifier_base_url = %config.verifier_base_url,
        relay = config.relay_url.is_some(),
        "configuration loaded"
    );

    if args.dry_run {
        validate(&config)?;
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let connector = build_connector(&config)?;
    let cancel = CancellationToken::new();
    setup_signal_handlers(cancel.clone());

    let command = args.command.unwrap_or(Command::Status);
    run_command(&connector, command, &cancel).await
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<CliConfig> {
    let Some(path) = path else {
        return Ok(CliConfig::default());
    };
    let path_str = path.to_str().context("config path must be valid utf-8")?;
    CliConfig::from_file(path_str).context("load config")
}

fn validate(config: &CliConfig) -> Result<()> {
    let connector_config = config.connector_config();
    ZelidClient::with_config_and_base_urls(
        connector_config.client.clone(),
        &connector_config.id_base_url,
        &connector_config.verifier_base_url,
    )
    .context("invalid service url")?;
    zelid_connect::ws::WsPushConnector::new(&connector_config.push_base_url)
        .context("invalid push url")?;
    if let Some(key) = &config.evm_private_key {
        zelid_connect::LocalEvmProvider::new(key).context("invalid evm private key")?;
    }
    Ok(())
}

fn setup_signal_handlers(cancel: CancellationToken) {
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        cancel_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let cancel_clone = cancel.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    cancel_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
