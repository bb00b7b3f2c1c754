//! Simulated video player settings menu.
//!
//! Reproduces the player behaviors the engine has to cope with: the settings
//! menu renders its rows some time after opening, applying a quality
//! collapses the menu, and re-renders invalidate every element handle.

use std::time::Duration;

use async_trait::async_trait;
use autoquality_core::menu::{ACTIVE_ROW_CLASS, ElementHandle, MenuRow, MenuUi, QualityRow, UiError};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::time::Instant;

use crate::builder::SimulatedPlayerBuilder;

const SETTINGS_BUTTON: u64 = 1;
const SPEED_ITEM: u64 = 2;
const QUALITY_ITEM: u64 = 3;
const SUBTITLES_ITEM: u64 = 4;
const QUALITY_ROW_BASE: u64 = 100;

/// Something observable that happened inside the player.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum PlayerEvent {
    SettingsToggled { expanded: bool },
    QualityMenuOpened,
    QualityApplied { label: String },
    /// A click landed on the row that was already active.
    ActiveRowClicked { label: String },
    ClickRejected { element: ElementHandle },
    Rerendered { generation: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    Main,
    Quality,
}

struct PlayerState {
    has_video: bool,
    button_rendered: bool,
    expanded: bool,
    rows_ready_at: Option<Instant>,
    panel: Panel,
    qualities: Vec<String>,
    active: Option<usize>,
    generation: u64,
    rng: ChaCha8Rng,
    failing_clicks: u32,
    events: Vec<PlayerEvent>,
}

impl PlayerState {
    fn handle(&self, local: u64) -> ElementHandle {
        ElementHandle((self.generation << 32) | local)
    }

    /// Maps a handle back to its local id if it belongs to the current render.
    fn resolve(&self, element: ElementHandle) -> Result<u64, UiError> {
        if element.0 >> 32 != self.generation {
            return Err(UiError::Detached { element });
        }
        Ok(element.0 & 0xFFFF_FFFF)
    }

    fn collapse(&mut self) {
        self.expanded = false;
        self.panel = Panel::Main;
        self.rows_ready_at = None;
    }

    fn rows_rendered(&self) -> bool {
        self.rows_ready_at
            .is_some_and(|ready_at| Instant::now() >= ready_at)
    }
}

/// In-memory player implementing [`MenuUi`].
pub struct SimulatedPlayer {
    state: Mutex<PlayerState>,
    render_latency: Duration,
    render_jitter: Duration,
}

impl SimulatedPlayer {
    /// Starts building a player.
    pub fn builder() -> SimulatedPlayerBuilder {
        SimulatedPlayerBuilder::new()
    }

    pub(crate) fn from_parts(
        qualities: Vec<String>,
        active: Option<usize>,
        has_video: bool,
        seed: u64,
        render_latency: Duration,
        render_jitter: Duration,
    ) -> Self {
        Self {
            state: Mutex::new(PlayerState {
                has_video,
                button_rendered: true,
                expanded: false,
                rows_ready_at: None,
                panel: Panel::Main,
                qualities,
                active,
                generation: 1,
                rng: ChaCha8Rng::seed_from_u64(seed),
                failing_clicks: 0,
                events: Vec::new(),
            }),
            render_latency,
            render_jitter,
        }
    }

    /// Label of the quality currently playing.
    pub fn active_label(&self) -> Option<String> {
        let state = self.state.lock();
        state.active.map(|index| state.qualities[index].clone())
    }

    /// Whether the settings menu is expanded.
    pub fn is_menu_open(&self) -> bool {
        self.state.lock().expanded
    }

    /// Every event recorded since creation.
    pub fn events(&self) -> Vec<PlayerEvent> {
        self.state.lock().events.clone()
    }

    /// Replaces the video, as when navigating to another page.
    ///
    /// The player re-renders, so earlier handles become detached.
    pub fn load_video(&self, qualities: Vec<String>, active: Option<usize>) {
        let mut state = self.state.lock();
        let rows = qualities.len();
        state.has_video = true;
        state.qualities = qualities;
        state.active = active.filter(|index| *index < rows);
        Self::rerender_locked(&mut state);
    }

    /// Removes the video element, as on a non-video page.
    pub fn remove_video(&self) {
        let mut state = self.state.lock();
        state.has_video = false;
        Self::rerender_locked(&mut state);
    }

    /// Rebuilds the player's DOM; all outstanding handles become detached.
    pub fn rerender(&self) {
        Self::rerender_locked(&mut self.state.lock());
    }

    /// Stops rendering the settings button.
    pub fn hide_settings_button(&self) {
        self.state.lock().button_rendered = false;
    }

    /// Rejects the next `count` clicks.
    pub fn fail_next_clicks(&self, count: u32) {
        self.state.lock().failing_clicks = count;
    }

    fn rerender_locked(state: &mut PlayerState) {
        state.generation += 1;
        state.collapse();
        let generation = state.generation;
        state.events.push(PlayerEvent::Rerendered { generation });
        tracing::trace!(generation, "Simulated player re-rendered");
    }

    fn row_delay(&self, rng: &mut ChaCha8Rng) -> Duration {
        let jitter_ms = self.render_jitter.as_millis() as u64;
        let extra = if jitter_ms == 0 {
            0
        } else {
            rng.random_range(0..=jitter_ms)
        };
        self.render_latency + Duration::from_millis(extra)
    }
}

#[async_trait]
impl MenuUi for SimulatedPlayer {
    async fn has_video(&self) -> Result<bool, UiError> {
        Ok(self.state.lock().has_video)
    }

    async fn settings_button(&self) -> Result<Option<ElementHandle>, UiError> {
        let state = self.state.lock();
        let rendered = state.has_video && state.button_rendered;
        Ok(rendered.then(|| state.handle(SETTINGS_BUTTON)))
    }

    async fn is_expanded(&self, button: ElementHandle) -> Result<bool, UiError> {
        let state = self.state.lock();
        match state.resolve(button)? {
            SETTINGS_BUTTON if state.button_rendered => Ok(state.expanded),
            _ => Err(UiError::Detached { element: button }),
        }
    }

    async fn menu_rows(&self) -> Result<Vec<MenuRow>, UiError> {
        let state = self.state.lock();
        if !state.expanded || state.panel != Panel::Main || !state.rows_rendered() {
            return Ok(Vec::new());
        }

        let current = state
            .active
            .map(|index| state.qualities[index].as_str())
            .unwrap_or("Auto");

        Ok(vec![
            MenuRow {
                element: state.handle(SUBTITLES_ITEM),
                text: "Subtitles/CC Off".to_string(),
            },
            MenuRow {
                element: state.handle(SPEED_ITEM),
                text: "Playback speed\nNormal".to_string(),
            },
            MenuRow {
                element: state.handle(QUALITY_ITEM),
                text: format!("Quality\n{current}"),
            },
        ])
    }

    async fn quality_rows(&self) -> Result<Vec<QualityRow>, UiError> {
        let state = self.state.lock();
        if !state.expanded || state.panel != Panel::Quality {
            return Ok(Vec::new());
        }

        Ok(state
            .qualities
            .iter()
            .enumerate()
            .map(|(index, label)| {
                let mut classes = vec!["ytp-menuitem".to_string()];
                if state.active == Some(index) {
                    classes.push(ACTIVE_ROW_CLASS.to_string());
                }
                QualityRow {
                    element: state.handle(QUALITY_ROW_BASE + index as u64),
                    text: label.clone(),
                    aria_checked: None,
                    classes,
                }
            })
            .collect())
    }

    async fn click(&self, element: ElementHandle) -> Result<(), UiError> {
        let mut state = self.state.lock();
        let local = state.resolve(element)?;

        if state.failing_clicks > 0 {
            state.failing_clicks -= 1;
            state.events.push(PlayerEvent::ClickRejected { element });
            return Err(UiError::Interaction {
                reason: format!("simulated click rejection on {element}"),
            });
        }

        match local {
            SETTINGS_BUTTON if state.button_rendered => {
                if state.expanded {
                    state.collapse();
                } else {
                    let delay = self.row_delay(&mut state.rng);
                    state.expanded = true;
                    state.panel = Panel::Main;
                    state.rows_ready_at = Some(Instant::now() + delay);
                }
                let expanded = state.expanded;
                state.events.push(PlayerEvent::SettingsToggled { expanded });
            }
            QUALITY_ITEM if state.expanded && state.rows_rendered() => {
                state.panel = Panel::Quality;
                state.events.push(PlayerEvent::QualityMenuOpened);
            }
            SPEED_ITEM | SUBTITLES_ITEM => {}
            row if row >= QUALITY_ROW_BASE && state.panel == Panel::Quality => {
                let index = (row - QUALITY_ROW_BASE) as usize;
                let Some(label) = state.qualities.get(index).cloned() else {
                    return Err(UiError::Detached { element });
                };

                if state.active == Some(index) {
                    state.events.push(PlayerEvent::ActiveRowClicked { label });
                } else {
                    state.active = Some(index);
                    tracing::debug!(%label, "Simulated player applied quality");
                    state.events.push(PlayerEvent::QualityApplied { label });
                }
                state.collapse();
            }
            _ => return Err(UiError::Detached { element }),
        }

        Ok(())
    }
}
