use std::sync::Arc;

use alert_sync::net::api::HttpAlertApi;
use alert_sync::net::stream::SseEventSource;
use alert_sync::net::types::{AlertId, ChatRole};
use alert_sync::state::{AlertDetail, SyncState};
use alert_sync::{SendOutcome, SendRejection, SyncConfig, SyncEngine, SyncError};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Sync(#[from] SyncError),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("{0}")]
    Engine(String),
    #[error("send rejected: {0}")]
    Rejected(#[from] SendRejection),
    #[error("alert {0} not found")]
    NotFound(AlertId),
}

#[derive(Parser, Debug)]
#[command(name = "alert-sync", about = "Alert list and chat client for the alert-analysis service")]
struct Cli {
    /// Overrides the base URL from the environment config.
    #[arg(long, env = "ALERT_SYNC_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the server health report.
    Ping,
    Alerts(AlertsCommand),
    /// Follow the push stream and print state changes until Ctrl-C.
    Watch {
        #[arg(long)]
        alert: Option<AlertId>,
    },
}

#[derive(Args, Debug)]
struct AlertsCommand {
    #[command(subcommand)]
    command: AlertsSubcommand,
}

#[derive(Subcommand, Debug)]
enum AlertsSubcommand {
    List,
    Show {
        alert_id: AlertId,
    },
    Delete {
        alert_id: AlertId,
    },
    Chat {
        alert_id: AlertId,
        message: String,
    },
    Submit {
        #[arg(long, help = "Raw alert JSON")]
        data: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("alert_sync=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = SyncConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url);
    }

    match cli.command {
        Command::Ping => run_ping(&config).await,
        Command::Alerts(alerts) => run_alerts(&config, alerts).await,
        Command::Watch { alert } => run_watch(&config, alert).await,
    }
}

fn engine_for(config: &SyncConfig) -> Result<SyncEngine, CliError> {
    let api = HttpAlertApi::new(config)?;
    Ok(SyncEngine::new(Arc::new(api), config))
}

/// Turn whatever is left on the error surface into the command's error.
fn take_error(engine: &SyncEngine) -> Result<(), CliError> {
    let state = engine.snapshot();
    match state.error.current() {
        Some(message) => Err(CliError::Engine(message.to_owned())),
        None => Ok(()),
    }
}

async fn run_ping(config: &SyncConfig) -> Result<(), CliError> {
    let health = HttpAlertApi::new(config)?.health().await?;
    print_json(&health)
}

async fn run_alerts(config: &SyncConfig, alerts: AlertsCommand) -> Result<(), CliError> {
    match alerts.command {
        AlertsSubcommand::List => {
            let engine = engine_for(config)?;
            engine.fetch_alerts().await;
            take_error(&engine)?;
            for alert in &engine.snapshot().alerts {
                println!(
                    "{:>6}  {}  {:<12}  {}",
                    alert.id,
                    alert.created_at,
                    alert.details_kind.as_deref().unwrap_or("-"),
                    alert.prefix.as_deref().unwrap_or("-"),
                );
            }
            Ok(())
        }
        AlertsSubcommand::Show { alert_id } => {
            let engine = engine_for(config)?;
            let detail = load_detail(&engine, alert_id).await?;
            print_detail(&detail);
            Ok(())
        }
        AlertsSubcommand::Delete { alert_id } => {
            let engine = engine_for(config)?;
            engine.delete_alert(alert_id).await;
            take_error(&engine)?;
            println!("deleted alert {alert_id}");
            Ok(())
        }
        AlertsSubcommand::Chat { alert_id, message } => {
            let engine = engine_for(config)?;
            load_detail(&engine, alert_id).await?;
            match engine.send_message(&message).await {
                SendOutcome::Confirmed { .. } => {
                    if let Some(detail) = engine.snapshot().detail {
                        print_detail(&detail);
                    }
                    Ok(())
                }
                SendOutcome::RolledBack => take_error(&engine),
                SendOutcome::Rejected(rejection) => Err(rejection.into()),
            }
        }
        AlertsSubcommand::Submit { data } => {
            let alert = serde_json::from_str::<Value>(&data)?;
            let reply = HttpAlertApi::new(config)?.submit_alert(&alert).await?;
            print_json(&reply)
        }
    }
}

async fn load_detail(engine: &SyncEngine, alert_id: AlertId) -> Result<AlertDetail, CliError> {
    engine.select_alert(Some(alert_id)).await;
    take_error(engine)?;
    engine.snapshot().detail.ok_or(CliError::NotFound(alert_id))
}

async fn run_watch(config: &SyncConfig, alert: Option<AlertId>) -> Result<(), CliError> {
    let engine = engine_for(config)?;
    let source = SseEventSource::new(config)?;
    let mut updates = engine.subscribe();

    engine.mount(Arc::new(source)).await;
    if alert.is_some() {
        engine.select_alert(alert).await;
    }

    let mut last = String::new();
    loop {
        let line = describe(&updates.borrow_and_update());
        if line != last {
            println!("{line}");
            last = line;
        }
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    engine.unmount();
    Ok(())
}

fn describe(state: &SyncState) -> String {
    let messages = state.detail.as_ref().map_or(0, |detail| detail.chat_messages.len());
    let mut line = format!(
        "connection={:?} alerts={} selected={} messages={messages}",
        state.connection,
        state.alerts.len(),
        state.selected_alert_id.map_or_else(|| "-".to_owned(), |id| id.to_string()),
    );
    if let Some(delay) = state.reconnect_delay {
        line.push_str(&format!(" retry_in={}ms", delay.as_millis()));
    }
    if let Some(error) = state.error.current() {
        line.push_str(&format!(" error={error:?}"));
    }
    line
}

fn print_detail(detail: &AlertDetail) {
    println!("alert {} ({})", detail.id, detail.prefix().unwrap_or("no prefix"));
    println!("created: {}", detail.created_at);
    println!();
    println!("{}", detail.initial_response);
    for message in &detail.chat_messages {
        let role = match message.role {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        let content = if message.pending { "..." } else { message.content.as_str() };
        println!();
        println!("[{role}] {content}");
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
