//! Centralized configuration for AutoQuality.
//!
//! All tunable timings and paths are defined here to avoid hard-coded
//! values scattered throughout the codebase.

use std::path::PathBuf;
use std::time::Duration;

/// Central configuration for all AutoQuality components.
///
/// Supports environment variable overrides for runtime customization.
#[derive(Debug, Clone, Default)]
pub struct AutoQualityConfig {
    pub menu: MenuTimings,
    pub triggers: TriggerDelays,
    pub store: StoreConfig,
}

/// Timings for driving the player's settings menu.
///
/// The player renders its menus asynchronously, so every click is followed
/// by a settle wait and lookups are polled.
#[derive(Debug, Clone)]
pub struct MenuTimings {
    /// Wait after clicking the settings button or the quality item
    pub settle: Duration,
    /// How many times to look for the quality item before giving up
    pub quality_poll_attempts: u32,
    /// Wait between quality item lookups
    pub quality_poll_interval: Duration,
    /// Offsets after an attempt at which an open settings menu is closed
    pub close_checks: Vec<Duration>,
}

impl Default for MenuTimings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(120),
            quality_poll_attempts: 8,
            quality_poll_interval: Duration::from_millis(120),
            close_checks: vec![Duration::from_millis(100), Duration::from_millis(300)],
        }
    }
}

/// Debounce delays per trigger source.
#[derive(Debug, Clone)]
pub struct TriggerDelays {
    /// Delay after the page first loads, giving the player time to construct
    pub initial_load: Duration,
    /// Delay after a video element is added to the document
    pub video_added: Duration,
    /// Delay after the page location changes
    pub location_changed: Duration,
}

impl Default for TriggerDelays {
    fn default() -> Self {
        Self {
            initial_load: Duration::from_millis(1000),
            video_added: Duration::from_millis(800),
            location_changed: Duration::from_millis(1000),
        }
    }
}

/// Settings persistence configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// JSON file holding the preference record
    pub settings_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("autoquality-settings.json"),
        }
    }
}

impl AutoQualityConfig {
    /// Creates configuration with environment variable overrides.
    ///
    /// Allows runtime configuration via environment variables while
    /// maintaining sensible defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(settle) = env_millis("AUTOQUALITY_SETTLE_MS") {
            config.menu.settle = settle;
        }

        if let Ok(attempts) = std::env::var("AUTOQUALITY_POLL_ATTEMPTS") {
            if let Ok(count) = attempts.parse::<u32>() {
                config.menu.quality_poll_attempts = count;
            }
        }

        if let Some(interval) = env_millis("AUTOQUALITY_POLL_INTERVAL_MS") {
            config.menu.quality_poll_interval = interval;
        }

        if let Some(delay) = env_millis("AUTOQUALITY_INITIAL_DELAY_MS") {
            config.triggers.initial_load = delay;
        }

        if let Some(delay) = env_millis("AUTOQUALITY_VIDEO_DELAY_MS") {
            config.triggers.video_added = delay;
        }

        if let Some(delay) = env_millis("AUTOQUALITY_NAVIGATION_DELAY_MS") {
            config.triggers.location_changed = delay;
        }

        if let Ok(path) = std::env::var("AUTOQUALITY_SETTINGS_PATH") {
            config.store.settings_path = PathBuf::from(path);
        }

        config
    }

    /// Creates a configuration with short timings for fast tests.
    pub fn for_testing() -> Self {
        Self {
            menu: MenuTimings {
                settle: Duration::from_millis(10),
                quality_poll_attempts: 3,
                quality_poll_interval: Duration::from_millis(10),
                close_checks: vec![Duration::from_millis(10), Duration::from_millis(30)],
            },
            triggers: TriggerDelays {
                initial_load: Duration::from_millis(100),
                video_added: Duration::from_millis(80),
                location_changed: Duration::from_millis(100),
            },
            ..Default::default()
        }
    }
}

fn env_millis(name: &str) -> Option<Duration> {
    std::env::var(name)
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_millis)
}
