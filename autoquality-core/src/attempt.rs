//! One end-to-end selection attempt.
//!
//! Loads settings, opens the quality menu, discovers options, applies the
//! policy and commits. Every failure is contained here: the caller always
//! gets an [`AttemptOutcome`], and the menu close step is scheduled on every
//! path that created a controller.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::MenuTimings;
use crate::discovery::discover_options;
use crate::menu::{CommitOutcome, MenuController, MenuUi, OpenOutcome, UiError};
use crate::policy::{SelectionRule, select};
use crate::settings::{Configuration, SettingsStore, load_settings};

/// How an attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// No video element on the page; nothing was touched.
    NoVideo,
    /// Another attempt was already running.
    Skipped,
    /// The settings button was not rendered.
    SettingsUnavailable,
    /// The quality item never appeared in the settings menu.
    QualityItemUnavailable,
    /// The quality sub-menu was empty.
    NoOptions,
    /// The chosen quality was already active.
    AlreadySelected { label: String },
    /// The chosen quality was clicked.
    Selected { label: String, rule: SelectionRule },
    /// A menu interaction failed or panicked.
    Failed { reason: String },
}

impl AttemptOutcome {
    /// Whether the player ends up on the preferred quality.
    pub fn is_satisfied(&self) -> bool {
        matches!(
            self,
            AttemptOutcome::AlreadySelected { .. } | AttemptOutcome::Selected { .. }
        )
    }
}

/// Outcome plus the handle of the scheduled menu cleanup, if any.
#[derive(Debug)]
pub struct AttemptReport {
    pub number: u64,
    pub outcome: AttemptOutcome,
    /// Delayed close checks; `None` when the attempt never reached the menu.
    pub cleanup: Option<JoinHandle<()>>,
}

impl AttemptReport {
    /// Report for an attempt that never started.
    pub fn skipped(number: u64) -> Self {
        Self {
            number,
            outcome: AttemptOutcome::Skipped,
            cleanup: None,
        }
    }

    /// Waits for the delayed menu close checks to finish.
    pub async fn wait_for_cleanup(&mut self) {
        if let Some(cleanup) = self.cleanup.take() {
            if let Err(e) = cleanup.await {
                tracing::debug!("Menu cleanup task ended abnormally: {e}");
            }
        }
    }
}

/// Reasons an attempt stopped short of committing a selection.
///
/// Unreadable settings never appear here; they resolve to the defaults when
/// loading.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("settings button not found")]
    SettingsButtonMissing,

    #[error("quality menu item not found")]
    QualityItemMissing,

    #[error("unexpected menu behavior: {0}")]
    UnexpectedUi(#[from] UiError),

    #[error("menu interaction panicked: {reason}")]
    Panicked { reason: String },
}

impl AttemptError {
    /// Whether the menu simply was not there, as opposed to misbehaving.
    fn is_missing_element(&self) -> bool {
        matches!(
            self,
            AttemptError::SettingsButtonMissing | AttemptError::QualityItemMissing
        )
    }
}

impl From<AttemptError> for AttemptOutcome {
    fn from(error: AttemptError) -> Self {
        match error {
            AttemptError::SettingsButtonMissing => AttemptOutcome::SettingsUnavailable,
            AttemptError::QualityItemMissing => AttemptOutcome::QualityItemUnavailable,
            other => AttemptOutcome::Failed {
                reason: other.to_string(),
            },
        }
    }
}

/// The selection pipeline bound to one page's menu and a settings store.
pub struct QualityAutomation {
    ui: Arc<dyn MenuUi>,
    store: Arc<dyn SettingsStore>,
    timings: MenuTimings,
}

impl QualityAutomation {
    /// Creates a pipeline over the given collaborators.
    pub fn new(ui: Arc<dyn MenuUi>, store: Arc<dyn SettingsStore>, timings: MenuTimings) -> Self {
        Self { ui, store, timings }
    }

    /// Runs one attempt to completion.
    ///
    /// Never fails and never panics because of the menu: errors and panics
    /// from any collaborator become [`AttemptOutcome::Failed`] and are logged.
    pub async fn execute(&self, number: u64) -> AttemptReport {
        let span = tracing::info_span!("attempt", number);
        self.execute_inner(number).instrument(span).await
    }

    async fn execute_inner(&self, number: u64) -> AttemptReport {
        let mut controller = None;

        let result = AssertUnwindSafe(self.run(&mut controller))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(AttemptError::Panicked {
                    reason: panic_message(payload.as_ref()),
                })
            });

        // Only attempts that reached the menu have anything to close.
        let cleanup = controller.map(MenuController::close);

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(error) if error.is_missing_element() => {
                tracing::debug!("Attempt ended early: {error}");
                error.into()
            }
            Err(error) => {
                tracing::warn!("Quality selection failed: {error}");
                error.into()
            }
        };

        tracing::debug!(?outcome, "Attempt finished");
        AttemptReport {
            number,
            outcome,
            cleanup,
        }
    }

    /// The unwind-guarded body of an attempt.
    ///
    /// The controller is parked in `slot` before the menu is touched, so it
    /// survives a panic and still gets closed.
    async fn run(
        &self,
        slot: &mut Option<MenuController>,
    ) -> Result<AttemptOutcome, AttemptError> {
        if !self.ui.has_video().await? {
            tracing::debug!("No video element, skipping");
            return Ok(AttemptOutcome::NoVideo);
        }

        let configuration = load_settings(self.store.as_ref()).await;
        let controller = slot.insert(MenuController::new(self.ui.clone(), self.timings.clone()));
        drive(controller, self.ui.as_ref(), &configuration).await
    }
}

async fn drive(
    controller: &mut MenuController,
    ui: &dyn MenuUi,
    configuration: &Configuration,
) -> Result<AttemptOutcome, AttemptError> {
    match controller.open().await? {
        OpenOutcome::QualityMenuOpen => {}
        OpenOutcome::SettingsButtonMissing => return Err(AttemptError::SettingsButtonMissing),
        OpenOutcome::QualityItemMissing => return Err(AttemptError::QualityItemMissing),
    }

    let options = discover_options(ui).await?;
    let Some(selection) = select(configuration, &options) else {
        tracing::debug!("Quality menu has no options");
        return Ok(AttemptOutcome::NoOptions);
    };

    tracing::debug!(
        id = %selection.option.id,
        rule = %selection.rule,
        "Chose quality option"
    );

    let label = selection.option.label.clone();
    let outcome = match controller.commit(selection.option).await? {
        CommitOutcome::AlreadySelected => AttemptOutcome::AlreadySelected { label },
        CommitOutcome::Clicked => AttemptOutcome::Selected {
            label,
            rule: selection.rule,
        },
    };

    Ok(outcome)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::quality::QualityId;
    use crate::settings::{MemorySettingsStore, SETTINGS_KEY};
    use crate::test_mocks::ScriptedMenu;
    use crate::AutoQualityConfig;

    fn automation(menu: &Arc<ScriptedMenu>, store: MemorySettingsStore) -> QualityAutomation {
        QualityAutomation::new(
            menu.clone(),
            Arc::new(store),
            AutoQualityConfig::for_testing().menu,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_maximum_selection_end_to_end() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p Premium", "1080p", "720p", "Auto"]));
        let mut report = automation(&menu, MemorySettingsStore::new()).execute(1).await;
        report.wait_for_cleanup().await;

        assert_eq!(
            report.outcome,
            AttemptOutcome::Selected {
                label: "1080p Premium".to_string(),
                rule: SelectionRule::Maximum,
            }
        );
        assert_eq!(menu.selected(), Some(0));
        assert!(!menu.is_settings_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_priority_selection_uses_stored_settings() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p", "720p", "480p"]));
        let store = MemorySettingsStore::with_value(
            SETTINGS_KEY,
            json!({ "mode": "priority", "priorityOrder": ["720p", "1080p"] }),
        );

        let report = automation(&menu, store).execute(1).await;
        assert_eq!(
            report.outcome,
            AttemptOutcome::Selected {
                label: "720p".to_string(),
                rule: SelectionRule::Priority(QualityId::P720),
            }
        );
        assert_eq!(menu.selected(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_outage_uses_defaults() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p", "1440p"]));
        let store = MemorySettingsStore::with_value(SETTINGS_KEY, json!({ "mode": "priority" }));
        store.set_unavailable(true);

        let report = automation(&menu, store).execute(1).await;
        assert!(report.outcome.is_satisfied());
        assert_eq!(menu.selected(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_selected_issues_no_row_click() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p", "720p"]));
        menu.set_selected(0);

        let mut report = automation(&menu, MemorySettingsStore::new()).execute(1).await;
        report.wait_for_cleanup().await;

        assert_eq!(
            report.outcome,
            AttemptOutcome::AlreadySelected {
                label: "1080p".to_string()
            }
        );
        assert!(!menu.clicks().contains(&ScriptedMenu::quality_row(0)));
        // The menu stays open after a no-op commit, so cleanup collapses it.
        assert!(!menu.is_settings_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_video_touches_nothing() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        menu.set_has_video(false);

        let report = automation(&menu, MemorySettingsStore::new()).execute(1).await;
        assert_eq!(report.outcome, AttemptOutcome::NoVideo);
        assert!(report.cleanup.is_none());
        assert!(menu.clicks().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_quality_item_closes_settings() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        menu.hide_quality_item();

        let mut report = automation(&menu, MemorySettingsStore::new()).execute(1).await;
        assert_eq!(report.outcome, AttemptOutcome::QualityItemUnavailable);

        report.wait_for_cleanup().await;
        assert!(!menu.is_settings_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_failure_is_contained_and_cleaned_up() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p", "720p"]));
        menu.fail_clicks_on(ScriptedMenu::quality_row(0));

        let mut report = automation(&menu, MemorySettingsStore::new()).execute(1).await;
        assert!(matches!(report.outcome, AttemptOutcome::Failed { .. }));

        report.wait_for_cleanup().await;
        assert!(!menu.is_settings_expanded());
        assert_eq!(menu.selected(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_during_discovery_is_contained_and_cleaned_up() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p"]));
        menu.panic_on_quality_rows();

        let mut report = automation(&menu, MemorySettingsStore::new()).execute(1).await;
        assert_eq!(
            report.outcome,
            AttemptOutcome::Failed {
                reason: "menu interaction panicked: scripted quality row failure".to_string()
            }
        );

        report.wait_for_cleanup().await;
        assert!(!menu.is_settings_expanded());
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_in_video_check_is_contained() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["1080p"]));
        menu.panic_on_has_video();

        let report = tokio::spawn(async move {
            automation(&menu, MemorySettingsStore::new()).execute(1).await
        })
        .await
        .expect("panic escaped the attempt");

        assert_eq!(
            report.outcome,
            AttemptOutcome::Failed {
                reason: "menu interaction panicked: scripted video lookup failure".to_string()
            }
        );
        assert!(report.cleanup.is_none());
    }

    #[test]
    fn test_missing_elements_map_to_distinct_outcomes() {
        assert_eq!(
            AttemptOutcome::from(AttemptError::SettingsButtonMissing),
            AttemptOutcome::SettingsUnavailable
        );
        assert_eq!(
            AttemptOutcome::from(AttemptError::QualityItemMissing),
            AttemptOutcome::QualityItemUnavailable
        );
        assert!(matches!(
            AttemptOutcome::from(AttemptError::UnexpectedUi(UiError::Interaction {
                reason: "rejected".to_string()
            })),
            AttemptOutcome::Failed { .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_settings_button_has_nothing_to_reopen() {
        let menu = Arc::new(ScriptedMenu::with_qualities(&["720p"]));
        menu.remove_settings_button();

        let mut report = automation(&menu, MemorySettingsStore::new()).execute(1).await;
        assert_eq!(report.outcome, AttemptOutcome::SettingsUnavailable);

        report.wait_for_cleanup().await;
        assert!(menu.clicks().is_empty());
    }
}
