//! Single attempts against the simulated player.

use std::sync::Arc;
use std::time::Duration;

use autoquality_core::settings::SETTINGS_KEY;
use autoquality_core::{
    AttemptOutcome, AutoQualityConfig, MemorySettingsStore, QualityAutomation, QualityId,
    SelectionRule, TriggerScheduler,
};
use autoquality_sim::{PlayerEvent, SimulatedPlayer};
use serde_json::json;

fn scheduler(player: &Arc<SimulatedPlayer>, store: MemorySettingsStore) -> TriggerScheduler {
    let automation = QualityAutomation::new(
        player.clone(),
        Arc::new(store),
        AutoQualityConfig::default().menu,
    );
    TriggerScheduler::new(automation)
}

fn priority_store(order: &[&str]) -> MemorySettingsStore {
    MemorySettingsStore::with_value(
        SETTINGS_KEY,
        json!({ "mode": "priority", "priorityOrder": order }),
    )
}

fn active_row_clicks(player: &SimulatedPlayer) -> usize {
    player
        .events()
        .iter()
        .filter(|event| matches!(event, PlayerEvent::ActiveRowClicked { .. }))
        .count()
}

#[tokio::test(start_paused = true)]
async fn test_maximum_mode_picks_highest_resolution() {
    let player = Arc::new(SimulatedPlayer::builder().build().unwrap());
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let mut report = scheduler.run_now().await;
    report.wait_for_cleanup().await;

    assert_eq!(
        report.outcome,
        AttemptOutcome::Selected {
            label: "2160p60 4K".to_string(),
            rule: SelectionRule::Maximum,
        }
    );
    assert_eq!(player.active_label().as_deref(), Some("2160p60 4K"));
    assert!(!player.is_menu_open());
}

#[tokio::test(start_paused = true)]
async fn test_priority_mode_prefers_enhanced_1080p() {
    let player = Arc::new(SimulatedPlayer::builder().build().unwrap());
    let scheduler = scheduler(&player, priority_store(&["1080p_hbr", "720p"]));

    let report = scheduler.run_now().await;

    assert_eq!(
        report.outcome,
        AttemptOutcome::Selected {
            label: "1080p Premium Enhanced bitrate".to_string(),
            rule: SelectionRule::Priority(QualityId::P1080Enhanced),
        }
    );
    assert_eq!(
        player.active_label().as_deref(),
        Some("1080p Premium Enhanced bitrate")
    );
}

#[tokio::test(start_paused = true)]
async fn test_priority_mode_falls_back_to_maximum_without_match() {
    let player = Arc::new(
        SimulatedPlayer::builder()
            .with_qualities(&["720p60", "480p", "Auto"])
            .with_active(2)
            .build()
            .unwrap(),
    );
    let scheduler = scheduler(&player, priority_store(&["4320p", "1440p"]));

    let report = scheduler.run_now().await;

    assert_eq!(
        report.outcome,
        AttemptOutcome::Selected {
            label: "720p60".to_string(),
            rule: SelectionRule::PriorityFallback,
        }
    );
}

#[tokio::test(start_paused = true)]
async fn test_already_active_target_is_not_clicked_and_menu_is_closed() {
    let player = Arc::new(
        SimulatedPlayer::builder()
            .with_qualities(&["1080p", "720p", "Auto"])
            .with_active(0)
            .build()
            .unwrap(),
    );
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let mut report = scheduler.run_now().await;
    assert_eq!(
        report.outcome,
        AttemptOutcome::AlreadySelected {
            label: "1080p".to_string()
        }
    );
    assert!(player.is_menu_open());

    report.wait_for_cleanup().await;

    assert!(!player.is_menu_open());
    assert_eq!(active_row_clicks(&player), 0);
    assert_eq!(player.active_label().as_deref(), Some("1080p"));
}

#[tokio::test(start_paused = true)]
async fn test_page_without_video_is_left_untouched() {
    let player = Arc::new(SimulatedPlayer::builder().without_video().build().unwrap());
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let report = scheduler.run_now().await;

    assert_eq!(report.outcome, AttemptOutcome::NoVideo);
    assert!(report.cleanup.is_none());
    assert!(player.events().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_missing_settings_button_ends_attempt() {
    let player = Arc::new(SimulatedPlayer::builder().build().unwrap());
    player.hide_settings_button();
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let report = scheduler.run_now().await;

    assert_eq!(report.outcome, AttemptOutcome::SettingsUnavailable);
    assert_eq!(player.active_label().as_deref(), Some("Auto"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_menu_render_exhausts_quality_item_search() {
    let player = Arc::new(
        SimulatedPlayer::builder()
            .with_render_latency(Duration::from_secs(5))
            .build()
            .unwrap(),
    );
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let mut report = scheduler.run_now().await;
    assert_eq!(report.outcome, AttemptOutcome::QualityItemUnavailable);

    report.wait_for_cleanup().await;
    assert!(!player.is_menu_open());
}

#[tokio::test(start_paused = true)]
async fn test_jittered_render_within_poll_budget_still_selects() {
    let player = Arc::new(
        SimulatedPlayer::builder()
            .with_seed(7)
            .with_render_latency(Duration::from_millis(150))
            .with_render_jitter(Duration::from_millis(400))
            .build()
            .unwrap(),
    );
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let report = scheduler.run_now().await;

    assert!(report.outcome.is_satisfied(), "outcome: {:?}", report.outcome);
    assert_eq!(player.active_label().as_deref(), Some("2160p60 4K"));
}

#[tokio::test(start_paused = true)]
async fn test_rerender_mid_attempt_fails_softly_and_next_attempt_recovers() {
    let player = Arc::new(SimulatedPlayer::builder().build().unwrap());
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let rerendering = player.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(60)).await;
        rerendering.rerender();
    });

    let mut first = scheduler.run_now().await;
    assert!(!first.outcome.is_satisfied(), "outcome: {:?}", first.outcome);
    assert!(!scheduler.is_in_flight());
    first.wait_for_cleanup().await;

    let second = scheduler.run_now().await;
    assert!(matches!(second.outcome, AttemptOutcome::Selected { .. }));
    assert_eq!(player.active_label().as_deref(), Some("2160p60 4K"));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_click_becomes_failed_outcome() {
    let player = Arc::new(SimulatedPlayer::builder().build().unwrap());
    player.fail_next_clicks(1);
    let scheduler = scheduler(&player, MemorySettingsStore::new());

    let mut first = scheduler.run_now().await;
    assert!(matches!(first.outcome, AttemptOutcome::Failed { .. }));
    first.wait_for_cleanup().await;
    assert!(
        player
            .events()
            .iter()
            .any(|event| matches!(event, PlayerEvent::ClickRejected { .. }))
    );

    let second = scheduler.run_now().await;
    assert!(second.outcome.is_satisfied());
    assert_eq!(scheduler.stats().executed, 2);
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_store_uses_default_maximum() {
    let player = Arc::new(SimulatedPlayer::builder().build().unwrap());
    let store = priority_store(&["144p"]);
    store.set_unavailable(true);
    let scheduler = scheduler(&player, store);

    let report = scheduler.run_now().await;

    assert_eq!(
        report.outcome,
        AttemptOutcome::Selected {
            label: "2160p60 4K".to_string(),
            rule: SelectionRule::Maximum,
        }
    );
}
