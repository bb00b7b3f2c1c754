//! AutoQuality Core - Automatic playback quality selection
//!
//! This crate drives a third-party video player's settings menu to pick a
//! playback resolution from user preferences: settings sanitation, option
//! discovery, the selection policy, the menu controller, and the debounced
//! single-flight scheduler that decides when to attempt a selection.

pub mod activation;
pub mod attempt;
pub mod config;
pub mod discovery;
pub mod menu;
pub mod policy;
pub mod quality;
pub mod scheduler;
pub mod settings;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_mocks;
pub mod tracing_setup;
pub mod watcher;

// Re-export main types for convenient access
pub use activation::ActivationGate;
pub use attempt::{AttemptError, AttemptOutcome, AttemptReport, QualityAutomation};
pub use config::AutoQualityConfig;
pub use discovery::{QualityOption, discover_options};
pub use menu::{ElementHandle, MenuController, MenuRow, MenuUi, QualityRow, UiError};
pub use policy::{Selection, SelectionRule, choose_best, select};
pub use quality::{OptionId, QualityId};
pub use scheduler::{TriggerReason, TriggerScheduler};
pub use settings::{
    Configuration, JsonFileSettingsStore, MemorySettingsStore, Mode, SettingsStore, StoreError,
};
pub use watcher::{AddedNode, PageEvent, PageWatcher};

/// Errors that can surface from AutoQuality's editing and setup paths.
///
/// The selection pipeline itself never returns these; it degrades to
/// "no selection made" and logs instead.
#[derive(Debug, thiserror::Error)]
pub enum AutoQualityError {
    #[error("Settings store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {reason}")]
    Configuration { reason: String },
}

impl AutoQualityError {
    /// Returns a user-friendly error message suitable for display.
    pub fn user_message(&self) -> String {
        match self {
            AutoQualityError::Store(StoreError::Unavailable { reason }) => {
                format!("Settings storage unavailable: {reason}")
            }
            AutoQualityError::Store(_) => "Settings could not be saved".to_string(),
            AutoQualityError::Configuration { reason } => format!("Invalid configuration: {reason}"),
        }
    }

    /// Checks if this error is due to user input validation.
    pub fn is_user_error(&self) -> bool {
        matches!(self, AutoQualityError::Configuration { .. })
    }
}

pub type Result<T> = std::result::Result<T, AutoQualityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_messages() {
        let invalid = AutoQualityError::Configuration {
            reason: "Unknown quality id: '8k'".to_string(),
        };
        assert!(invalid.is_user_error());
        assert_eq!(invalid.user_message(), "Invalid configuration: Unknown quality id: '8k'");

        let outage = AutoQualityError::from(StoreError::Unavailable {
            reason: "disk full".to_string(),
        });
        assert!(!outage.is_user_error());
        assert_eq!(outage.user_message(), "Settings storage unavailable: disk full");
    }
}
