use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use clap::Parser;
use tokio::time::Instant;
use tracing::{info, warn};

use tradeboard::config::Config;
use tradeboard::logging::{init_logging, LogMode, LoggingConfig};
use tradeboard::push::{ChannelState, PushChannel};
use tradeboard::rest::{ApiClient, SnapshotLoader};
use tradeboard::store::DashboardStore;
use tradeboard::view;

#[derive(Parser, Debug)]
#[command(name = "tradeboard", about = "Live brokerage dashboard state monitor")]
struct Cli {
    /// REST base URL (overrides TRADEBOARD_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    /// Push channel URL (overrides TRADEBOARD_WS_URL)
    #[arg(long)]
    ws_url: Option<String>,

    /// Load snapshots once, report, and exit
    #[arg(long)]
    once: bool,

    /// Also write logs to this directory
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mode = match &cli.log_dir {
        Some(dir) => LogMode::ConsoleAndFile(dir.clone()),
        None => LogMode::ConsoleOnly,
    };
    init_logging(LoggingConfig::new(mode))?;

    let mut config = Config::from_env();
    if let Some(url) = cli.api_url {
        config.rest_base_url = url;
    }
    if let Some(url) = cli.ws_url {
        config.push_url = url;
    }

    let store = Arc::new(DashboardStore::new());
    let api = ApiClient::new(&config).context("failed to build REST client")?;
    let loader = SnapshotLoader::new(api, &store);

    loader.load_all().await;
    report(&store);

    if cli.once {
        return Ok(());
    }

    let channel = PushChannel::new(config.push_url.clone(), store.clone());
    channel.connect().context("failed to open push channel")?;

    let mut changes = store.subscribe();

    // Reconnection policy lives here, not in the channel: back off between
    // attempts and re-fetch snapshots after each reopen so the store
    // recovers anything missed while disconnected. The backoff delay is
    // tracked as a deadline rather than slept inline, keeping ctrl-c and
    // store-change reporting responsive while disconnected.
    let mut reconnect = ReconnectSchedule::new();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Shutting down");
                channel.disconnect();
                break;
            }

            changed = changes.changed() => {
                if changed.is_err() {
                    break;
                }
                report(&store);
            }

            _ = tokio::time::sleep(Duration::from_millis(500)) => {
                match channel.state() {
                    ChannelState::Connected => reconnect.connected(),
                    ChannelState::Connecting => {}
                    ChannelState::Disconnected => {
                        if reconnect.should_attempt(Instant::now()) {
                            warn!("Push channel down, reconnecting");
                            channel.connect().context("failed to reopen push channel")?;
                            loader.load_all().await;
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// Spaces reconnect attempts with exponential backoff without ever
/// sleeping: callers poll `should_attempt` and keep servicing other
/// events until the deadline passes.
struct ReconnectSchedule {
    backoff: ExponentialBackoff,
    deadline: Option<Instant>,
}

impl ReconnectSchedule {
    fn new() -> Self {
        Self {
            backoff: ExponentialBackoff {
                initial_interval: Duration::from_secs(1),
                max_interval: Duration::from_secs(30),
                max_elapsed_time: None,
                ..Default::default()
            },
            deadline: None,
        }
    }

    fn connected(&mut self) {
        self.backoff.reset();
        self.deadline = None;
    }

    /// True once the current backoff delay has elapsed. The first call
    /// after a disconnect arms the deadline and returns false.
    fn should_attempt(&mut self, now: Instant) -> bool {
        match self.deadline {
            None => {
                let delay = self
                    .backoff
                    .next_backoff()
                    .unwrap_or(Duration::from_secs(30));
                self.deadline = Some(now + delay);
                false
            }
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            Some(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reconnect_schedule_arms_then_fires_without_sleeping() {
        let mut schedule = ReconnectSchedule::new();
        let start = Instant::now();

        // First poll after a disconnect only arms the deadline.
        assert!(!schedule.should_attempt(start));
        // Still within the delay window (first delay is at most 1.5s).
        assert!(!schedule.should_attempt(start));
        // Past the window the attempt fires exactly once, then re-arms.
        assert!(schedule.should_attempt(start + Duration::from_secs(2)));
        assert!(!schedule.should_attempt(start + Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_reconnect_schedule_resets_on_connect() {
        let mut schedule = ReconnectSchedule::new();
        let start = Instant::now();

        assert!(!schedule.should_attempt(start));
        schedule.connected();

        // After a successful connect the next disconnect starts a fresh
        // backoff cycle from the initial interval.
        assert!(!schedule.should_attempt(start + Duration::from_secs(60)));
        assert!(schedule.should_attempt(start + Duration::from_secs(62)));
    }
}

/// Log a one-line view of the current store state
fn report(store: &DashboardStore) {
    let account = store.account();
    if let Some(account) = account.value {
        info!(
            equity = %account.equity,
            daily_pl = %view::daily_pl(&account),
            active = account.status.is_active(),
            "Account"
        );
    } else if let Some(error) = account.error {
        warn!(%error, "Account unavailable");
    }

    if let Some(status) = store.market_status().value {
        let countdown = view::market_countdown(&status, chrono::Utc::now());
        info!(open = status.is_open, next_event = %countdown, "Market");
    }

    info!(
        positions = store.positions().value.map(|p| p.len()).unwrap_or(0),
        orders = store.orders().value.map(|o| o.len()).unwrap_or(0),
        trades = store.trades().value.map(|t| t.len()).unwrap_or(0),
        log_lines = store.log_lines().len(),
        "Holdings"
    );
}
