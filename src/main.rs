//! # SigBridge — Telegram → FCM trading-signal bridge
//!
//! Watches a Telegram channel for trading signals, computes an execution
//! instant for each, and fans it out to every registered device.
//!
//! Usage:
//!   sigbridge listen                          # broadcast to everyone
//!   sigbridge listen --operators-only --role super_admin
//!   sigbridge parse "12:30 S"                 # offline parse check
//!   sigbridge send-test --end-users-only      # synthetic signal, one minute out
//!   sigbridge recipients                      # show the current roster

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{Timelike, Utc};
use clap::{Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use sigbridge_core::config::BridgeConfig;
use sigbridge_core::time::MarketClock;
use sigbridge_core::traits::RecipientStore;
use sigbridge_core::types::{Directive, RecipientFilter, Trend};
use sigbridge_delivery::{FanOutEngine, SessionStats};
use sigbridge_firebase::{FcmDispatch, FirestoreRecipients};
use sigbridge_stream::{ExitReason, Supervisor, TelegramSource};

#[derive(Parser)]
#[command(
    name = "sigbridge",
    version,
    about = "📡 SigBridge — Telegram → FCM trading-signal bridge"
)]
struct Cli {
    /// Config file path (default: ~/.sigbridge/config.toml)
    #[arg(long)]
    config: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Listen for channel signals and broadcast them (production mode)
    Listen {
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Parse a message offline and print the outcome
    Parse { text: String },
    /// Send a synthetic test signal scheduled one minute ahead
    SendTest {
        #[command(flatten)]
        scope: ScopeArgs,

        /// Trend of the test signal: call or put
        #[arg(long, default_value = "call")]
        trend: String,
    },
    /// List the recipients currently in the directory
    Recipients {
        #[command(flatten)]
        scope: ScopeArgs,
    },
}

#[derive(Args)]
struct ScopeArgs {
    /// Deliver to end users only
    #[arg(long, conflicts_with = "operators_only")]
    end_users_only: bool,

    /// Deliver to operators only
    #[arg(long)]
    operators_only: bool,

    /// Restrict operators to one role (implies --operators-only)
    #[arg(long)]
    role: Option<String>,
}

impl ScopeArgs {
    fn filter(&self) -> RecipientFilter {
        if self.end_users_only {
            RecipientFilter::EndUsersOnly
        } else if self.operators_only || self.role.is_some() {
            RecipientFilter::OperatorsOnly {
                role: self.role.clone(),
            }
        } else {
            RecipientFilter::All
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = match &cli.config {
        Some(path) => {
            let mut config = BridgeConfig::load_from(Path::new(path))?;
            config.apply_env_overrides();
            config
        }
        None => BridgeConfig::load()?,
    };

    match cli.command {
        Command::Listen { scope } => listen(config, scope.filter()).await,
        Command::Parse { text } => parse(&config, &text),
        Command::SendTest { scope, trend } => send_test(config, scope.filter(), &trend).await,
        Command::Recipients { scope } => recipients(config, scope.filter()).await,
    }
}

fn clock(config: &BridgeConfig) -> MarketClock {
    MarketClock::new(config.market.utc_offset_hours)
}

fn roster(config: &BridgeConfig) -> FirestoreRecipients {
    FirestoreRecipients::new(
        config.firebase.project_id.clone(),
        config.firebase.access_token.clone(),
    )
}

fn engine(config: &BridgeConfig, stats: Arc<SessionStats>) -> FanOutEngine {
    FanOutEngine::new(
        Arc::new(FcmDispatch::new(
            config.firebase.server_key.clone(),
            &config.delivery,
        )),
        stats,
        Duration::from_secs(config.delivery.send_timeout_secs),
    )
}

async fn listen(config: BridgeConfig, filter: RecipientFilter) -> Result<()> {
    println!("🚀 SigBridge v{}", env!("CARGO_PKG_VERSION"));
    println!("   📢 Channel:   {}", config.telegram.channel_id);
    println!("   👥 Scope:     {filter:?}");
    println!("   ⏰ Timezone:  UTC{:+}", config.market.utc_offset_hours);
    println!();

    let stats = Arc::new(SessionStats::new());
    let mut supervisor = Supervisor::new(
        TelegramSource::new(config.telegram.clone()),
        Arc::new(roster(&config)),
        engine(&config, stats.clone()),
        stats,
        clock(&config),
        filter,
        Duration::from_secs(config.telegram.connect_timeout_secs),
    );

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("🛑 interrupt received");
            let _ = stop_tx.send(true);
        }
    });

    match supervisor.run(stop_rx).await {
        ExitReason::Drained => Ok(()),
        ExitReason::Fatal(reason) => {
            eprintln!("❌ FATAL: {reason}");
            eprintln!("   The stream credential needs manual attention before restarting.");
            Err(anyhow::anyhow!("fatal stream fault: {reason}"))
        }
        ExitReason::RetriesExhausted => {
            eprintln!("❌ Reconnect budget exhausted; giving up.");
            Err(anyhow::anyhow!("reconnect budget exhausted"))
        }
    }
}

fn parse(config: &BridgeConfig, text: &str) -> Result<()> {
    match sigbridge_signal::parse_signal(text, Some(Utc::now()), &clock(config)) {
        Some(directive) => {
            println!("✅ valid signal");
            println!("{}", serde_json::to_string_pretty(&directive)?);
        }
        None => println!("❌ not a trading signal"),
    }
    Ok(())
}

async fn send_test(config: BridgeConfig, filter: RecipientFilter, trend: &str) -> Result<()> {
    let trend = match trend.to_lowercase().as_str() {
        "call" | "b" | "buy" => Trend::Call,
        "put" | "s" | "sell" => Trend::Put,
        other => return Err(anyhow::anyhow!("unknown trend '{other}' (use call or put)")),
    };

    // One minute ahead on the market clock, like a freshly inferred signal.
    let now = clock(&config).now_local();
    let minute = (now.minute() + 1) % 60;
    let hour = (now.hour() + u32::from(now.minute() == 59)) % 24;
    let directive = Directive {
        trend,
        hour: hour as u8,
        minute: minute as u8,
        second: 0,
        time_was_inferred: false,
        source_text: format!("TEST: {hour:02}:{minute:02} {}", trend.letter()),
        parsed_at: Utc::now(),
    };

    let stats = Arc::new(SessionStats::new());
    let engine = engine(&config, stats.clone());
    let recipients = roster(&config).list_recipients(&filter).await?;
    let result = engine.dispatch(&directive, recipients).await;

    println!("✅ test dispatch complete");
    println!("   Total:     {}", result.total);
    println!("   Succeeded: {}", result.succeeded);
    println!("   - Users:     {}", result.end_user_succeeded);
    println!("   - Operators: {}", result.operator_succeeded);
    println!("   Failed:    {}", result.failed);
    Ok(())
}

async fn recipients(config: BridgeConfig, filter: RecipientFilter) -> Result<()> {
    let recipients = roster(&config).list_recipients(&filter).await?;

    if recipients.is_empty() {
        println!("⚠️  no recipients with delivery tokens found");
        return Ok(());
    }

    println!("📱 {} recipients:", recipients.len());
    for recipient in &recipients {
        let class = match &recipient.role {
            Some(role) => format!("{} ({role})", recipient.class.as_str()),
            None => recipient.class.as_str().to_string(),
        };
        println!(
            "   • {} [{class}] token {}",
            recipient.identifier,
            mask_token(&recipient.delivery_token)
        );
    }
    Ok(())
}

/// Tokens are credentials; logs only ever see the edges.
fn mask_token(token: &str) -> String {
    if token.len() <= 16 || !token.is_ascii() {
        return "…".into();
    }
    format!("{}…{}", &token[..8], &token[token.len() - 8..])
}
