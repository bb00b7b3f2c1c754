//! Per-attempt driver for the settings and quality menus.
//!
//! State progression for one attempt:
//! `Closed -> SettingsOpening -> SettingsOpen -> QualitySearching -> QualityOpen
//! -> Committed -> Closing`. A missing element moves the controller to
//! `Unavailable` instead; `close` runs from any state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::sleep;

use super::{ElementHandle, MenuUi, UiError};
use crate::config::MenuTimings;
use crate::discovery::QualityOption;

/// Where the controller is within one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Closed,
    SettingsOpening,
    SettingsOpen,
    QualitySearching,
    QualityOpen,
    Committed,
    Closing,
    /// A required element never appeared; the attempt ends here.
    Unavailable,
}

/// Result of trying to reach the quality sub-menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    QualityMenuOpen,
    SettingsButtonMissing,
    QualityItemMissing,
}

/// Result of committing a selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The target row was already active; no click was issued.
    AlreadySelected,
    Clicked,
}

/// Opens, commits within, and closes the player's quality menu.
///
/// One controller serves exactly one attempt. [`MenuController::close`]
/// consumes it, so cleanup can be scheduled at most once.
pub struct MenuController {
    ui: Arc<dyn MenuUi>,
    timings: MenuTimings,
    state: MenuState,
    visited: Vec<MenuState>,
}

impl MenuController {
    /// Creates a controller in the `Closed` state.
    pub fn new(ui: Arc<dyn MenuUi>, timings: MenuTimings) -> Self {
        Self {
            ui,
            timings,
            state: MenuState::Closed,
            visited: Vec::new(),
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    /// States entered so far, oldest first.
    pub fn visited(&self) -> &[MenuState] {
        &self.visited
    }

    fn transition(&mut self, next: MenuState) {
        tracing::trace!(from = ?self.state, to = ?next, "Menu state");
        self.state = next;
        self.visited.push(next);
    }

    /// Navigates to the quality sub-menu.
    ///
    /// Missing elements are reported through [`OpenOutcome`], not as errors.
    ///
    /// # Errors
    ///
    /// - `UiError` - Any query or click against the player failed
    pub async fn open(&mut self) -> Result<OpenOutcome, UiError> {
        let Some(button) = self.ui.settings_button().await? else {
            tracing::debug!("Settings button not found");
            self.transition(MenuState::Unavailable);
            return Ok(OpenOutcome::SettingsButtonMissing);
        };

        self.transition(MenuState::SettingsOpening);
        if !self.ui.is_expanded(button).await? {
            self.ui.click(button).await?;
            sleep(self.timings.settle).await;
        }
        self.transition(MenuState::SettingsOpen);

        self.transition(MenuState::QualitySearching);
        let Some(quality_item) = self.find_quality_item().await? else {
            tracing::debug!(
                attempts = self.timings.quality_poll_attempts,
                "Quality menu item not found"
            );
            self.transition(MenuState::Unavailable);
            return Ok(OpenOutcome::QualityItemMissing);
        };

        self.ui.click(quality_item).await?;
        sleep(self.timings.settle).await;
        self.transition(MenuState::QualityOpen);

        Ok(OpenOutcome::QualityMenuOpen)
    }

    /// Polls the settings menu for the row leading to the quality sub-menu.
    ///
    /// Returns `None` once the retry budget is spent.
    ///
    /// # Errors
    ///
    /// - `UiError` - Listing the menu rows failed
    pub async fn find_quality_item(&self) -> Result<Option<ElementHandle>, UiError> {
        for attempt in 0..self.timings.quality_poll_attempts {
            let rows = self.ui.menu_rows().await?;
            if let Some(row) = rows
                .into_iter()
                .find(|row| row.text.to_lowercase().contains("quality"))
            {
                return Ok(Some(row.element));
            }

            tracing::trace!(attempt, "Quality item not rendered yet");
            sleep(self.timings.quality_poll_interval).await;
        }

        Ok(None)
    }

    /// Activates the chosen option.
    ///
    /// Clicking a row that is already active can collapse the menu, so an
    /// already-selected target is reported without a click.
    ///
    /// # Errors
    ///
    /// - `UiError::InvalidState` - The quality menu is not open
    /// - `UiError` - The click failed
    pub async fn commit(&mut self, option: &QualityOption) -> Result<CommitOutcome, UiError> {
        if self.state != MenuState::QualityOpen {
            return Err(UiError::InvalidState {
                operation: "commit",
                state: self.state,
            });
        }

        if option.is_currently_selected {
            tracing::info!("Target quality already selected: {}", option.label);
            self.transition(MenuState::Committed);
            return Ok(CommitOutcome::AlreadySelected);
        }

        tracing::info!("Selecting quality: {}", option.label);
        self.ui.click(option.element).await?;
        self.transition(MenuState::Committed);
        Ok(CommitOutcome::Clicked)
    }

    /// Schedules the delayed checks that collapse a still-open settings menu.
    ///
    /// Each check looks the settings button up again, since the player may
    /// have re-rendered it since the attempt started.
    pub fn close(mut self) -> JoinHandle<()> {
        self.transition(MenuState::Closing);

        let ui = self.ui;
        let checks = self.timings.close_checks;

        tokio::spawn(async move {
            let mut elapsed = Duration::ZERO;
            for offset in checks {
                sleep(offset.saturating_sub(elapsed)).await;
                elapsed = elapsed.max(offset);

                if let Err(e) = close_if_expanded(ui.as_ref()).await {
                    tracing::debug!("Menu close check failed: {e}");
                }
            }
        })
    }
}

async fn close_if_expanded(ui: &dyn MenuUi) -> Result<(), UiError> {
    let Some(button) = ui.settings_button().await? else {
        return Ok(());
    };

    if ui.is_expanded(button).await? {
        tracing::trace!("Closing settings menu");
        ui.click(button).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover_options;
    use crate::test_mocks::ScriptedMenu;

    fn controller(menu: &Arc<ScriptedMenu>) -> MenuController {
        MenuController::new(menu.clone(), crate::AutoQualityConfig::for_testing().menu)
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_reaches_quality_menu() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p", "720p", "Auto"]));
        let mut controller = controller(&menu);

        assert_eq!(controller.open().await.unwrap(), OpenOutcome::QualityMenuOpen);
        assert_eq!(controller.state(), MenuState::QualityOpen);
        assert_eq!(menu.clicks(), vec![ScriptedMenu::SETTINGS_BUTTON, ScriptedMenu::QUALITY_ITEM]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_passes_through_every_intermediate_state() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        let mut controller = controller(&menu);

        controller.open().await.unwrap();
        assert_eq!(
            controller.visited(),
            [
                MenuState::SettingsOpening,
                MenuState::SettingsOpen,
                MenuState::QualitySearching,
                MenuState::QualityOpen,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_does_not_toggle_already_expanded_settings() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        menu.set_expanded(true);
        let mut controller = controller(&menu);

        controller.open().await.unwrap();
        assert_eq!(menu.clicks(), vec![ScriptedMenu::QUALITY_ITEM]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_settings_button_is_unavailable() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        menu.remove_settings_button();
        let mut controller = controller(&menu);

        assert_eq!(controller.open().await.unwrap(), OpenOutcome::SettingsButtonMissing);
        assert_eq!(controller.state(), MenuState::Unavailable);
        assert!(menu.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_quality_item_search_gives_up_after_retry_budget() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        menu.hide_quality_item();
        let mut controller = controller(&menu);

        assert_eq!(controller.open().await.unwrap(), OpenOutcome::QualityItemMissing);
        assert_eq!(menu.menu_row_queries(), 3);

        controller.close().await.unwrap();
        assert!(!menu.is_settings_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_skips_click_for_active_row() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p", "720p"]));
        menu.set_selected(0);
        let mut controller = controller(&menu);
        controller.open().await.unwrap();

        let options = discover_options(menu.as_ref()).await.unwrap();
        let clicks_before = menu.clicks().len();

        assert_eq!(
            controller.commit(&options[0]).await.unwrap(),
            CommitOutcome::AlreadySelected
        );
        assert_eq!(menu.clicks().len(), clicks_before);
        assert_eq!(controller.state(), MenuState::Committed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_commit_requires_open_quality_menu() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        controller(&menu).open().await.unwrap();
        let options = discover_options(menu.as_ref()).await.unwrap();

        let mut fresh = controller(&menu);
        let result = fresh.commit(&options[0]).await;
        assert!(matches!(result, Err(UiError::InvalidState { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_collapses_menu_left_open() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        let mut controller = controller(&menu);
        controller.open().await.unwrap();
        assert!(menu.is_settings_expanded());

        controller.close().await.unwrap();
        assert!(!menu.is_settings_expanded());
    }
}
