//! Page events flowing through the watcher and scheduler into the player.

use std::sync::Arc;
use std::time::Duration;

use autoquality_core::settings::save_settings;
use autoquality_core::{
    AttemptOutcome, AutoQualityConfig, Configuration, JsonFileSettingsStore, MemorySettingsStore,
    Mode, PageWatcher, QualityAutomation, QualityId, SettingsStore, TriggerReason,
    TriggerScheduler,
};
use autoquality_sim::{PlayerEvent, SimulatedPage, SimulatedPlayer};
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::time::timeout;

const WATCH_URL: &str = "https://www.youtube.com/watch?v=first";
const NEXT_URL: &str = "https://www.youtube.com/watch?v=second";

struct Harness {
    player: Arc<SimulatedPlayer>,
    page: SimulatedPage,
    scheduler: TriggerScheduler,
    outcomes: broadcast::Receiver<AttemptOutcome>,
}

fn harness(
    player: SimulatedPlayer,
    store: Arc<dyn SettingsStore>,
    config: AutoQualityConfig,
) -> Harness {
    let player = Arc::new(player);
    let automation = QualityAutomation::new(player.clone(), store, config.menu);
    let scheduler = TriggerScheduler::new(automation);
    let outcomes = scheduler.subscribe();

    let (page, events) = SimulatedPage::new(player.clone(), WATCH_URL, 42);
    PageWatcher::new(scheduler.clone(), config.triggers).spawn(events);

    Harness {
        player,
        page,
        scheduler,
        outcomes,
    }
}

fn default_harness() -> Harness {
    harness(
        SimulatedPlayer::builder().build().unwrap(),
        Arc::new(MemorySettingsStore::new()),
        AutoQualityConfig::default(),
    )
}

async fn next_outcome(outcomes: &mut broadcast::Receiver<AttemptOutcome>) -> AttemptOutcome {
    timeout(Duration::from_secs(30), outcomes.recv())
        .await
        .expect("no attempt finished in time")
        .expect("outcome channel closed")
}

#[tokio::test(start_paused = true)]
async fn test_load_and_video_insert_collapse_into_one_attempt() {
    let mut h = default_harness();

    h.page.load().await.unwrap();
    h.page.insert_video().await.unwrap();
    h.page.churn(25).await.unwrap();

    let outcome = next_outcome(&mut h.outcomes).await;
    assert!(matches!(outcome, AttemptOutcome::Selected { .. }));
    assert_eq!(h.player.active_label().as_deref(), Some("2160p60 4K"));

    tokio::time::sleep(Duration::from_secs(5)).await;
    let stats = h.scheduler.stats();
    assert_eq!(stats.requested, 2);
    assert_eq!(stats.executed, 1);
    assert_eq!(stats.skipped, 0);
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_triggers_waits_for_latest_delay() {
    let mut h = default_harness();

    h.page.load().await.unwrap();
    for _ in 0..5 {
        h.page.insert_video().await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(h.scheduler.has_pending());
    assert_eq!(h.scheduler.stats().executed, 0);

    next_outcome(&mut h.outcomes).await;
    assert_eq!(h.scheduler.stats().requested, 6);
    assert_eq!(h.scheduler.stats().executed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_in_page_navigation_selects_again_for_new_video() {
    let mut h = default_harness();

    h.page.load().await.unwrap();
    next_outcome(&mut h.outcomes).await;
    assert_eq!(h.player.active_label().as_deref(), Some("2160p60 4K"));

    h.page
        .navigate(NEXT_URL, &["1080p60 HD", "720p60", "480p", "Auto"])
        .await
        .unwrap();
    assert_eq!(h.player.active_label().as_deref(), Some("Auto"));

    let outcome = next_outcome(&mut h.outcomes).await;
    assert_eq!(
        outcome,
        AttemptOutcome::Selected {
            label: "1080p60 HD".to_string(),
            rule: autoquality_core::SelectionRule::Maximum,
        }
    );
    assert_eq!(h.page.location(), NEXT_URL);
    assert_eq!(h.scheduler.stats().executed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_manual_reapply_finds_choice_already_active() {
    let mut h = default_harness();

    h.page.load().await.unwrap();
    next_outcome(&mut h.outcomes).await;
    tokio::time::sleep(Duration::from_secs(5)).await;

    h.scheduler.schedule_attempt(Duration::ZERO, TriggerReason::Manual);
    let outcome = next_outcome(&mut h.outcomes).await;

    assert!(matches!(outcome, AttemptOutcome::AlreadySelected { .. }));
    assert_eq!(h.player.active_label().as_deref(), Some("2160p60 4K"));
    assert_eq!(h.scheduler.stats().executed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unrelated_churn_never_triggers() {
    let mut h = default_harness();

    h.page.churn(50).await.unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    assert_eq!(h.scheduler.stats().requested, 0);
    assert!(h.player.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_player_never_sees_click_on_active_row() {
    let mut h = harness(
        SimulatedPlayer::builder()
            .with_qualities(&["1440p60 HD", "1080p60 HD", "Auto"])
            .with_active(0)
            .build()
            .unwrap(),
        Arc::new(MemorySettingsStore::new()),
        AutoQualityConfig::default(),
    );

    h.page.load().await.unwrap();
    h.page.insert_video().await.unwrap();
    let outcome = next_outcome(&mut h.outcomes).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(matches!(outcome, AttemptOutcome::AlreadySelected { .. }));
    assert!(!h.player.is_menu_open());
    assert!(
        !h.player
            .events()
            .iter()
            .any(|event| matches!(event, PlayerEvent::ActiveRowClicked { .. }))
    );
}

#[tokio::test]
async fn test_preferences_saved_to_file_drive_selection() {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(JsonFileSettingsStore::new(dir.path().join("settings.json")));
    save_settings(
        store.as_ref(),
        &Configuration::new(Mode::Priority, [QualityId::P720, QualityId::P1080]),
    )
    .await
    .unwrap();

    let mut h = harness(
        SimulatedPlayer::builder()
            .with_render_latency(Duration::from_millis(1))
            .build()
            .unwrap(),
        store,
        AutoQualityConfig::for_testing(),
    );

    h.page.load().await.unwrap();
    let outcome = next_outcome(&mut h.outcomes).await;

    assert_eq!(
        outcome,
        AttemptOutcome::Selected {
            label: "720p60".to_string(),
            rule: autoquality_core::SelectionRule::Priority(QualityId::P720),
        }
    );
    assert_eq!(h.player.active_label().as_deref(), Some("720p60"));
}
