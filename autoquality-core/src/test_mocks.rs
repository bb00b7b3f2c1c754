//! Mock menu implementation for testing the controller and pipeline.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::menu::{ElementHandle, MenuRow, MenuUi, QualityRow, UiError};

/// Handle offset for quality rows; row `i` is `ElementHandle(QUALITY_ROW_BASE + i)`.
const QUALITY_ROW_BASE: u64 = 100;

#[derive(Debug)]
struct ScriptedState {
    has_video: bool,
    button_present: bool,
    expanded: bool,
    quality_item_visible: bool,
    quality_page_open: bool,
    qualities: Vec<String>,
    selected: Option<usize>,
    clicks: Vec<ElementHandle>,
    menu_row_queries: u32,
    quality_row_queries: u32,
    failing_click: Option<ElementHandle>,
    panic_on_quality_rows: bool,
    panic_on_has_video: bool,
    query_delay: Duration,
}

/// Minimal in-memory player menu with call recording and fault injection.
///
/// Behaves like the real player: clicking a quality row applies it and
/// collapses the settings menu.
#[derive(Debug)]
pub struct ScriptedMenu {
    state: Mutex<ScriptedState>,
}

impl ScriptedMenu {
    pub const SETTINGS_BUTTON: ElementHandle = ElementHandle(1);
    pub const QUALITY_ITEM: ElementHandle = ElementHandle(2);
    pub const SPEED_ITEM: ElementHandle = ElementHandle(3);

    /// Creates a menu offering the given quality labels, none selected.
    pub fn with_qualities(labels: &[&str]) -> Self {
        Self {
            state: Mutex::new(ScriptedState {
                has_video: true,
                button_present: true,
                expanded: false,
                quality_item_visible: true,
                quality_page_open: false,
                qualities: labels.iter().map(|l| l.to_string()).collect(),
                selected: None,
                clicks: Vec::new(),
                menu_row_queries: 0,
                quality_row_queries: 0,
                failing_click: None,
                panic_on_quality_rows: false,
                panic_on_has_video: false,
                query_delay: Duration::ZERO,
            }),
        }
    }

    /// Handle of the quality row at `index`.
    pub fn quality_row(index: usize) -> ElementHandle {
        ElementHandle(QUALITY_ROW_BASE + index as u64)
    }

    pub fn set_has_video(&self, has_video: bool) {
        self.state.lock().has_video = has_video;
    }

    pub fn set_expanded(&self, expanded: bool) {
        self.state.lock().expanded = expanded;
    }

    pub fn set_selected(&self, index: usize) {
        self.state.lock().selected = Some(index);
    }

    pub fn remove_settings_button(&self) {
        self.state.lock().button_present = false;
    }

    pub fn hide_quality_item(&self) {
        self.state.lock().quality_item_visible = false;
    }

    /// Makes clicks on `element` fail with `UiError::Interaction`.
    pub fn fail_clicks_on(&self, element: ElementHandle) {
        self.state.lock().failing_click = Some(element);
    }

    /// Makes listing quality rows panic.
    pub fn panic_on_quality_rows(&self) {
        self.state.lock().panic_on_quality_rows = true;
    }

    /// Makes the video presence check panic.
    pub fn panic_on_has_video(&self) {
        self.state.lock().panic_on_has_video = true;
    }

    /// Delays every settings button lookup, keeping an attempt in flight.
    pub fn set_query_delay(&self, delay: Duration) {
        self.state.lock().query_delay = delay;
    }

    pub fn clicks(&self) -> Vec<ElementHandle> {
        self.state.lock().clicks.clone()
    }

    pub fn selected(&self) -> Option<usize> {
        self.state.lock().selected
    }

    pub fn is_settings_expanded(&self) -> bool {
        self.state.lock().expanded
    }

    pub fn menu_row_queries(&self) -> u32 {
        self.state.lock().menu_row_queries
    }

    pub fn quality_row_queries(&self) -> u32 {
        self.state.lock().quality_row_queries
    }
}

#[async_trait]
impl MenuUi for ScriptedMenu {
    async fn has_video(&self) -> Result<bool, UiError> {
        let state = self.state.lock();
        if state.panic_on_has_video {
            drop(state);
            panic!("scripted video lookup failure");
        }
        Ok(state.has_video)
    }

    async fn settings_button(&self) -> Result<Option<ElementHandle>, UiError> {
        let delay = self.state.lock().query_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let state = self.state.lock();
        Ok(state.button_present.then_some(Self::SETTINGS_BUTTON))
    }

    async fn is_expanded(&self, button: ElementHandle) -> Result<bool, UiError> {
        let state = self.state.lock();
        if button != Self::SETTINGS_BUTTON || !state.button_present {
            return Err(UiError::Detached { element: button });
        }
        Ok(state.expanded)
    }

    async fn menu_rows(&self) -> Result<Vec<MenuRow>, UiError> {
        let mut state = self.state.lock();
        state.menu_row_queries += 1;

        if !state.expanded || state.quality_page_open {
            return Ok(Vec::new());
        }

        let mut rows = vec![MenuRow {
            element: Self::SPEED_ITEM,
            text: "Playback speed Normal".to_string(),
        }];
        if state.quality_item_visible {
            rows.push(MenuRow {
                element: Self::QUALITY_ITEM,
                text: "Quality Auto".to_string(),
            });
        }
        Ok(rows)
    }

    async fn quality_rows(&self) -> Result<Vec<QualityRow>, UiError> {
        let mut state = self.state.lock();
        state.quality_row_queries += 1;

        if state.panic_on_quality_rows {
            drop(state);
            panic!("scripted quality row failure");
        }

        if !state.expanded || !state.quality_page_open {
            return Ok(Vec::new());
        }

        let selected = state.selected;
        Ok(state
            .qualities
            .iter()
            .enumerate()
            .map(|(index, label)| QualityRow {
                element: Self::quality_row(index),
                text: label.clone(),
                aria_checked: Some((selected == Some(index)).to_string()),
                classes: vec!["ytp-menuitem".to_string()],
            })
            .collect())
    }

    async fn click(&self, element: ElementHandle) -> Result<(), UiError> {
        let mut state = self.state.lock();
        if state.failing_click == Some(element) {
            return Err(UiError::Interaction {
                reason: format!("scripted click failure on {element}"),
            });
        }
        state.clicks.push(element);

        match element {
            Self::SETTINGS_BUTTON => {
                state.expanded = !state.expanded;
                state.quality_page_open = false;
            }
            Self::QUALITY_ITEM => state.quality_page_open = true,
            Self::SPEED_ITEM => {}
            ElementHandle(id) if id >= QUALITY_ROW_BASE => {
                state.selected = Some((id - QUALITY_ROW_BASE) as usize);
                state.expanded = false;
                state.quality_page_open = false;
            }
            other => return Err(UiError::Detached { element: other }),
        }

        Ok(())
    }
}
