/*
[INPUT]:  Parsed subcommand, CLI configuration, cancellation token
[OUTPUT]: Login/payment/history results printed to the terminal
[POS]:    Command layer - drives the wallet connector
[UPDATE]: When adding subcommands or changing their output
*/

use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::Subcommand;
use console::style;
use dialoguer::Select;
use dialoguer::theme::ColorfulTheme;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::info;
use zelid_connect::{
    ChannelKind, ConnectError, FileSessionStore, LocalEvmProvider, StatusFilter, WalletConnector,
    filter_transactions,
};

use crate::config::CliConfig;

const WALLET_CHOICES: [ChannelKind; 3] = [
    ChannelKind::DeepLinkRelay,
    ChannelKind::ExtensionRequest,
    ChannelKind::InjectedProviderSign,
];

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Sign in with a wallet and store the verified session
    Login {
        /// extension | deeplink | provider (aliases: ssp, zelcore, metamask)
        #[arg(long)]
        wallet: Option<ChannelKind>,
    },
    /// Send a payment from the logged-in identity
    Pay {
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        wallet: Option<ChannelKind>,
    },
    /// List ledger transactions of the logged-in identity
    History {
        #[arg(long, default_value = "")]
        search: String,
        /// all | pending | completed
        #[arg(long, default_value = "all")]
        status: StatusFilter,
    },
    /// Check whether the stored session is still valid
    Status,
    /// Forget the stored session
    Logout,
}

/// Build a connector from the CLI configuration
pub fn build_connector(config: &CliConfig) -> Result<WalletConnector> {
    let sessions = Arc::new(FileSessionStore::new(config.session_dir()));
    let mut connector = WalletConnector::new(config.connector_config(), sessions)
        .context("initialize wallet connector")?;

    if let Some(key) = &config.evm_private_key {
        let provider = LocalEvmProvider::new(key).context("load evm private key")?;
        info!(address = %provider.address(), "local evm provider loaded");
        connector = connector.with_provider(Arc::new(provider));
    }
    Ok(connector)
}

pub async fn run_command(
    connector: &WalletConnector,
    command: Command,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Command::Login { wallet } => {
            let kind = choose_wallet(wallet)?;
            let session = connector
                .login(kind, cancel)
                .await
                .map_err(report)
                .context("login")?;
            println!(
                "{} {}",
                style("Logged in as").green().bold(),
                session.identity.id
            );
        }
        Command::Pay { amount, wallet } => {
            let zelid = logged_in_id(connector)?;
            let kind = choose_wallet(wallet)?;
            let ack = connector
                .pay(kind, amount, &zelid, cancel)
                .await
                .map_err(report)
                .context("payment")?;
            println!(
                "{} {}",
                style("Payment sent:").green().bold(),
                ack.transaction_id
            );
        }
        Command::History { search, status } => {
            let zelid = logged_in_id(connector)?;
            let transactions = connector
                .history(&zelid)
                .await
                .map_err(report)
                .context("fetch history")?;
            let matching = filter_transactions(&transactions, &search, status);
            if matching.is_empty() {
                println!("{}", style("No transactions").dim());
            }
            for tx in matching {
                println!(
                    "{}  {:>10}  {:<9}  {:<9}  {}",
                    tx.created_at,
                    tx.amount,
                    tx.channel_kind,
                    format!("{:?}", tx.status).to_lowercase(),
                    tx.explorer_url()
                );
            }
        }
        Command::Status => match connector.resume().await.context("check session")? {
            Some(session) => println!(
                "{} {}",
                style("Logged in as").green().bold(),
                session.identity.id
            ),
            None => println!("{}", style("Not logged in").yellow()),
        },
        Command::Logout => {
            connector.logout().context("clear session")?;
            println!("{}", style("Logged out").dim());
        }
    }
    Ok(())
}

fn logged_in_id(connector: &WalletConnector) -> Result<String> {
    match connector.session() {
        Some(session) if session.verified => Ok(session.identity.id),
        _ => bail!("not logged in, run `login` first"),
    }
}

fn choose_wallet(wallet: Option<ChannelKind>) -> Result<ChannelKind> {
    if let Some(kind) = wallet {
        return Ok(kind);
    }
    if !console::user_attended() {
        bail!("--wallet is required when not running in a terminal");
    }

    let labels: Vec<&str> = WALLET_CHOICES.iter().map(ChannelKind::as_str).collect();
    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Wallet")
        .items(&labels)
        .default(0)
        .interact()
        .context("select wallet")?;
    Ok(WALLET_CHOICES[selection])
}

/// Print the user-facing message, plus the raw link when the handler did not open
fn report(err: ConnectError) -> anyhow::Error {
    eprintln!("{}", style(err.user_message()).red());
    if let Some(url) = err.fallback_url() {
        eprintln!("{url}");
    }
    anyhow!(err)
}
