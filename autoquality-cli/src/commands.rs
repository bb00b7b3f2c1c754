//! CLI command implementations

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, bail};
use autoquality_core::discovery::QualityOption;
use autoquality_core::menu::{ElementHandle, QualityRow};
use autoquality_core::settings::{load_settings, save_settings};
use autoquality_core::{
    ActivationGate, AttemptOutcome, AutoQualityConfig, AutoQualityError, Configuration,
    JsonFileSettingsStore, Mode, PageWatcher, QualityAutomation, QualityId, TriggerReason,
    TriggerScheduler, select,
};
use autoquality_sim::{DEFAULT_QUALITIES, SimulatedPage, SimulatedPlayer};
use clap::Subcommand;
use tokio::sync::broadcast;

/// How long to wait for the engine to settle after each page event.
const OUTCOME_TIMEOUT: Duration = Duration::from_secs(15);

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Show the stored preferences after sanitation
    Show,
    /// Store new preferences
    Set {
        /// Selection mode: max or priority
        #[arg(short, long)]
        mode: Mode,
        /// Comma-separated priority list, e.g. 1080p_hbr,1080p,720p
        #[arg(short, long, value_delimiter = ',')]
        order: Vec<String>,
    },
    /// List every canonical quality id
    Ids,
    /// Show which menu row the stored preferences would pick
    Pick {
        /// Comma-separated menu labels in menu order
        #[arg(short, long, value_delimiter = ',')]
        labels: Vec<String>,
        /// Index of the currently active row
        #[arg(long)]
        active: Option<usize>,
    },
    /// Run the engine against a simulated player
    Simulate {
        /// Page location the automation is attached to
        #[arg(long, default_value = "https://www.youtube.com/watch?v=simulated")]
        url: String,
        /// Comma-separated menu labels offered by the player
        #[arg(short, long, value_delimiter = ',')]
        qualities: Vec<String>,
        /// Locations to navigate to after the first video
        #[arg(long)]
        navigate: Vec<String>,
        /// Unrelated mutation batches emitted after load
        #[arg(long, default_value = "20")]
        churn: usize,
        /// Settings menu render latency in milliseconds
        #[arg(long, default_value = "60")]
        render_latency_ms: u64,
        /// Maximum extra render latency in milliseconds
        #[arg(long, default_value = "0")]
        render_jitter_ms: u64,
        /// Seed for the simulated page and player
        #[arg(long, default_value = "42")]
        seed: u64,
        /// Request one more selection after the last page event
        #[arg(long)]
        reapply: bool,
    },
}

/// Handle the CLI command
///
/// # Errors
/// Returns the failing command's error with context
pub async fn handle_command(command: Commands, settings: Option<PathBuf>) -> anyhow::Result<()> {
    let mut config = AutoQualityConfig::from_env();
    if let Some(path) = settings {
        config.store.settings_path = path;
    }

    match command {
        Commands::Show => show_settings(&config).await,
        Commands::Set { mode, order } => set_settings(&config, mode, order).await,
        Commands::Ids => {
            list_ids();
            Ok(())
        }
        Commands::Pick { labels, active } => pick(&config, labels, active).await,
        Commands::Simulate {
            url,
            qualities,
            navigate,
            churn,
            render_latency_ms,
            render_jitter_ms,
            seed,
            reapply,
        } => {
            let params = SimulationParams {
                url,
                qualities,
                navigate,
                churn,
                render_latency: Duration::from_millis(render_latency_ms),
                render_jitter: Duration::from_millis(render_jitter_ms),
                seed,
                reapply,
            };
            run_simulation(&config, params).await
        }
    }
}

/// Print the sanitized stored preferences
///
/// # Errors
/// - Serialization of the configuration failed
pub async fn show_settings(config: &AutoQualityConfig) -> anyhow::Result<()> {
    let store = JsonFileSettingsStore::new(&config.store.settings_path);
    let configuration = load_settings(&store).await;

    println!("Settings file: {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&configuration.to_record())?);
    Ok(())
}

/// Validate and persist new preferences
///
/// # Errors
/// - An id in `order` is not a canonical quality id
/// - Writing the settings file failed
pub async fn set_settings(
    config: &AutoQualityConfig,
    mode: Mode,
    order: Vec<String>,
) -> anyhow::Result<()> {
    let ids = order
        .iter()
        .map(|token| token.trim().parse::<QualityId>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|reason| AutoQualityError::Configuration { reason })?;

    let configuration = if ids.is_empty() {
        Configuration {
            mode,
            ..Configuration::default()
        }
    } else {
        Configuration::new(mode, ids)
    };

    let store = JsonFileSettingsStore::new(&config.store.settings_path);
    save_settings(&store, &configuration)
        .await
        .map_err(AutoQualityError::from)
        .with_context(|| format!("saving {}", store.path().display()))?;

    println!("Saved settings to {}", store.path().display());
    println!("{}", serde_json::to_string_pretty(&configuration.to_record())?);
    Ok(())
}

fn list_ids() {
    for id in QualityId::ALL {
        let marker = if QualityId::DEFAULT_PRIORITY.contains(&id) {
            " (default priority)"
        } else {
            ""
        };
        println!("{:<10} {}{marker}", id.as_str(), id.display_label());
    }
}

/// Dry-run the selection policy over a list of menu labels
///
/// # Errors
/// - No labels were given
pub async fn pick(
    config: &AutoQualityConfig,
    labels: Vec<String>,
    active: Option<usize>,
) -> anyhow::Result<()> {
    if labels.is_empty() {
        bail!("at least one label is required");
    }

    let store = JsonFileSettingsStore::new(&config.store.settings_path);
    let configuration = load_settings(&store).await;

    let options: Vec<QualityOption> = labels
        .iter()
        .enumerate()
        .map(|(index, label)| {
            let row = QualityRow {
                element: ElementHandle(index as u64),
                text: label.clone(),
                aria_checked: Some((active == Some(index)).to_string()),
                classes: Vec::new(),
            };
            QualityOption::parse(&row, index)
        })
        .collect();

    for option in &options {
        println!(
            "  [{}] {:<12} rank={:<6} enhanced={:<5} {}",
            option.menu_index,
            option.id.to_string(),
            option.rank.map_or("-".to_string(), |rank| rank.to_string()),
            option.is_enhanced,
            option.label
        );
    }

    match select(&configuration, &options) {
        Some(selection) if selection.option.is_currently_selected => println!(
            "Mode {}: '{}' is already active ({})",
            configuration.mode, selection.option.label, selection.rule
        ),
        Some(selection) => println!(
            "Mode {}: would select '{}' ({})",
            configuration.mode, selection.option.label, selection.rule
        ),
        None => println!("No selectable options"),
    }

    Ok(())
}

/// Parameters for a simulated run.
pub struct SimulationParams {
    pub url: String,
    pub qualities: Vec<String>,
    pub navigate: Vec<String>,
    pub churn: usize,
    pub render_latency: Duration,
    pub render_jitter: Duration,
    pub seed: u64,
    pub reapply: bool,
}

/// Drive the whole engine against a simulated page
///
/// # Errors
/// - The simulated player could not be built
/// - The engine produced no outcome within the timeout
pub async fn run_simulation(
    config: &AutoQualityConfig,
    params: SimulationParams,
) -> anyhow::Result<()> {
    if !ActivationGate::default().is_video_page(&params.url) {
        println!("Not a video page, automation not attached: {}", params.url);
        return Ok(());
    }

    let labels: Vec<&str> = if params.qualities.is_empty() {
        DEFAULT_QUALITIES.to_vec()
    } else {
        params.qualities.iter().map(String::as_str).collect()
    };
    let mut builder = SimulatedPlayer::builder()
        .with_qualities(&labels)
        .with_seed(params.seed)
        .with_render_latency(params.render_latency)
        .with_render_jitter(params.render_jitter);
    if let Some(auto) = labels.iter().position(|label| label.starts_with("Auto")) {
        builder = builder.with_active(auto);
    }
    let player = Arc::new(builder.build()?);

    let store = Arc::new(JsonFileSettingsStore::new(&config.store.settings_path));
    let automation = QualityAutomation::new(player.clone(), store, config.menu.clone());
    let scheduler = TriggerScheduler::new(automation);
    let mut outcomes = scheduler.subscribe();

    let (mut page, events) = SimulatedPage::new(player.clone(), params.url.clone(), params.seed);
    let watcher = PageWatcher::new(scheduler.clone(), config.triggers.clone()).spawn(events);

    println!("Loading {}", page.location());
    page.load().await?;
    page.insert_video().await?;
    page.churn(params.churn).await?;
    report_outcome(&mut outcomes, &player).await?;

    for location in &params.navigate {
        println!("Navigating to {location}");
        page.navigate(location.clone(), &labels).await?;
        page.churn(params.churn).await?;
        report_outcome(&mut outcomes, &player).await?;
    }

    if params.reapply {
        println!("Reapplying preferences");
        scheduler.schedule_attempt(Duration::ZERO, TriggerReason::Manual);
        report_outcome(&mut outcomes, &player).await?;
    }

    drop(page);
    watcher.await?;

    let stats = scheduler.stats();
    println!(
        "Triggers: {} requested, {} attempts run, {} dropped while in flight",
        stats.requested, stats.executed, stats.skipped
    );
    Ok(())
}

async fn report_outcome(
    outcomes: &mut broadcast::Receiver<AttemptOutcome>,
    player: &SimulatedPlayer,
) -> anyhow::Result<()> {
    let outcome = tokio::time::timeout(OUTCOME_TIMEOUT, next_outcome(outcomes))
        .await
        .context("timed out waiting for a selection attempt")??;

    println!("  Attempt outcome: {outcome:?}");
    println!(
        "  Player now playing: {}",
        player.active_label().unwrap_or_else(|| "(none)".to_string())
    );
    Ok(())
}

async fn next_outcome(
    outcomes: &mut broadcast::Receiver<AttemptOutcome>,
) -> anyhow::Result<AttemptOutcome> {
    loop {
        match outcomes.recv().await {
            Ok(outcome) => return Ok(outcome),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::debug!(missed, "Outcome receiver lagged");
            }
            Err(broadcast::error::RecvError::Closed) => bail!("scheduler stopped"),
        }
    }
}
