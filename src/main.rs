//! gh-notify: polls GitHub notifications and announces new ones.
//!
//! ## Architecture overview
//!
//! ```text
//!                 restart / stop          spawn generation
//! ┌──────────┐  ─────────────────►  ┌─────────────┐  ──────────►  ┌──────────┐
//! │  main    │   (mpsc requests)    │ registry.rs │               │ poll.rs  │
//! │ console  │                      │ coordinator │  ◄──────────  │  loop    │
//! └──────────┘                      └─────────────┘  consumer     └──────────┘
//!      ▲                                              handed back      │
//!      │ watch<Snapshot>                                                │ fetch.rs
//!      │                            ┌─────────────┐   consume()   ┌──────────┐
//!      └─────────────────────────── │   app.rs    │ ◄──────────── │ source/  │
//!                                   │ inbox+alert │               │ (GitHub) │
//!                                   └─────────────┘               └──────────┘
//! ```
//!
//! * **`source/`**: the `NotificationSource` trait and the GitHub REST source.
//! * **`fetch`**: one fetch bounded by the timeout and the cancellation token.
//! * **`reconcile`**: which fetched notifications are new.
//! * **`poll`**: a single cycle and the supervised loop of one generation.
//! * **`registry`**: one live generation per name, cancel-and-replace restarts.
//! * **`app`**: the accepted set, alerts and the snapshot channel.
//! * **`config`**: settings file, overrides, per-generation `PollConfig`.
//! * **`input`** / **`view`**: console commands and text output.
//! * **`main`**: CLI, logging, wiring, and the console loop.

mod alert;
mod app;
mod config;
mod error;
mod fetch;
mod input;
mod poll;
mod reconcile;
mod registry;
mod source;
mod view;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use alert::{Alerter, LogAlerter};
use app::{InboxConsumer, Snapshot};
use config::{Overrides, PollConfig, Settings, TOKEN_ENV};
use input::{Command, HELP};
use registry::{Coordinator, Generation, Registry, TaskFactory, DEFAULT_GRACE};
use source::{GithubSource, NotificationSource};

/// Registry name of the notification poller.
const POLLER: &str = "githubNotifyLoop";

const NOTIFICATIONS_URL: &str = "https://github.com/notifications";

// ---------------------------------------------------------------------------
// CLI
// ---------------------------------------------------------------------------

#[derive(Debug, Parser)]
#[command(name = "gh-notify", version, about = "Poll GitHub notifications and announce new ones")]
struct Cli {
    /// Settings file (defaults to <config dir>/gh-notify/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// GitHub token; overrides the settings file and GITHUB_TOKEN
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Seconds between polls
    #[arg(long, value_name = "SECS")]
    period: Option<u64>,

    /// Per-request timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// How many days back to ask for notifications
    #[arg(long, value_name = "DAYS")]
    lookback_days: Option<u64>,

    /// Show desktop toasts (needs the `desktop` feature)
    #[arg(long)]
    desktop: bool,

    /// Debug logging unless RUST_LOG says otherwise
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            token: self.token.clone(),
            lookback_days: self.lookback_days,
            timeout_secs: self.timeout,
            period_secs: self.period,
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_alerter(desktop: bool) -> Arc<dyn Alerter> {
    #[cfg(feature = "desktop")]
    if desktop {
        return Arc::new(alert::DesktopAlerter { timeout_ms: 8000 });
    }
    #[cfg(not(feature = "desktop"))]
    if desktop {
        tracing::warn!("built without the `desktop` feature, alerts go to the log");
    }
    Arc::new(LogAlerter)
}

// ---------------------------------------------------------------------------
// Poller wiring
// ---------------------------------------------------------------------------

/// Factory for one poller generation.  The predecessor's consumer, when
/// there is one, carries the accepted set over so a restart does not
/// re-announce known notifications.
fn poller_task(
    source: Arc<dyn NotificationSource>,
    config: PollConfig,
    alerter: Arc<dyn Alerter>,
    view: watch::Sender<Snapshot>,
) -> TaskFactory<InboxConsumer> {
    registry::factory(move |g: Generation<InboxConsumer>| async move {
        let consumer = match g.previous {
            Some(previous) => previous.into_generation(g.id),
            None => InboxConsumer::new(g.id, alerter, view),
        };
        let consumer = poll::run_loop(source, config, g.cancel, consumer).await;
        tracing::debug!(generation = consumer.generation(), "poller handing back its inbox");
        consumer
    })
}

/// Everything the console needs to act on commands.
struct Context {
    coordinator: Coordinator<InboxConsumer>,
    source: Arc<dyn NotificationSource>,
    alerter: Arc<dyn Alerter>,
    view_tx: watch::Sender<Snapshot>,
    view_rx: watch::Receiver<Snapshot>,
    settings: Settings,
    settings_path: PathBuf,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

impl Context {
    /// Start a fresh poller generation with the current settings.
    async fn restart_poller(&self) -> Result<u64> {
        let config = self.settings.to_poll_config()?;
        let task = poller_task(
            self.source.clone(),
            config,
            self.alerter.clone(),
            self.view_tx.clone(),
        );
        let generation = self.coordinator.restart(POLLER, task).await?;
        Ok(generation)
    }

    async fn dispatch(&mut self, command: Command) -> Result<Flow> {
        match command {
            Command::List => println!("{}", view::render(&self.view_rx.borrow())),
            Command::Refresh => {
                self.restart_poller().await?;
            }
            Command::MarkRead(id) => {
                let config = self.settings.to_poll_config()?;
                fetch::mark_read(self.source.as_ref(), &config, &id)
                    .await
                    .with_context(|| format!("failed to mark {id} as read"))?;
                tracing::info!(id = %id, "Mark as read success");
                self.restart_poller().await?;
            }
            Command::SetToken(token) => {
                if token == self.settings.token {
                    tracing::info!("token unchanged, poller left running");
                } else {
                    let mut updated = self.settings.clone();
                    updated.token = token;
                    updated.validate()?;
                    self.settings = updated;
                    if let Err(e) = self.settings.save(&self.settings_path) {
                        tracing::warn!("token not persisted: {e:#}");
                    }
                    self.restart_poller().await?;
                }
            }
            Command::Open => {
                open::that(NOTIFICATIONS_URL)
                    .with_context(|| format!("failed to open {NOTIFICATIONS_URL}"))?;
            }
            Command::Help => println!("{HELP}"),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}

/// Log the status line whenever a new snapshot is published.
fn spawn_status_logger(mut rx: watch::Receiver<Snapshot>) {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let (generation, line) = {
                let snapshot = rx.borrow_and_update();
                (snapshot.generation, view::status_line(&snapshot))
            };
            tracing::info!(generation, "{line}");
        }
    });
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // -- settings -------------------------------------------------------------
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let mut settings = Settings::load(&settings_path)?;
    settings.apply_env_token(std::env::var(TOKEN_ENV).ok());
    settings.apply_overrides(&cli.overrides());
    settings.validate()?;

    // -- collaborators --------------------------------------------------------
    let source: Arc<dyn NotificationSource> =
        Arc::new(GithubSource::new().context("failed to build HTTP client")?);
    let alerter = build_alerter(cli.desktop);
    let (view_tx, view_rx) = watch::channel(Snapshot::default());
    let (coordinator, coordinator_join) = Coordinator::spawn(Registry::new(DEFAULT_GRACE));

    let mut ctx = Context {
        coordinator,
        source,
        alerter,
        view_tx,
        view_rx: view_rx.clone(),
        settings,
        settings_path,
    };

    // -- start polling --------------------------------------------------------
    ctx.restart_poller().await?;
    spawn_status_logger(view_rx);
    tracing::info!("gh-notify running, type `help` for commands");

    // -- console loop ---------------------------------------------------------
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, shutting down");
                break;
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match input::parse_command(&line) {
                    Ok(Some(command)) => match ctx.dispatch(command).await {
                        Ok(Flow::Quit) => break,
                        Ok(Flow::Continue) => {}
                        Err(e) => tracing::warn!("{e:#}"),
                    },
                    Ok(None) => {}
                    Err(msg) => eprintln!("{msg}"),
                },
                // Detached from a terminal: keep polling until ctrl-c.
                Ok(None) => {
                    tracing::debug!("stdin closed");
                    stdin_open = false;
                }
                Err(e) => {
                    tracing::warn!("failed to read stdin: {e}");
                    stdin_open = false;
                }
            },
        }
    }

    if ctx.coordinator.stop(POLLER).await? {
        tracing::info!("poller stopped");
    }
    ctx.coordinator.shutdown().await?;
    coordinator_join.await?;
    Ok(())
}
