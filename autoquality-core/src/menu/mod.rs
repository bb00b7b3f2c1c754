//! Capability-scoped access to the player's settings menu.
//!
//! The menu tree is owned and rebuilt by the player at any time. The engine
//! only queries and clicks through [`MenuUi`], and never keeps an
//! [`ElementHandle`] past the attempt that obtained it.

pub mod controller;

use std::fmt;

use async_trait::async_trait;
pub use controller::{CommitOutcome, MenuController, MenuState, OpenOutcome};
use thiserror::Error;

/// Class the player puts on the currently active quality row.
pub const ACTIVE_ROW_CLASS: &str = "ytp-menuitem-active";

/// Opaque reference to a live element, assigned by the [`MenuUi`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub u64);

impl fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element#{}", self.0)
    }
}

/// A row in the settings menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuRow {
    pub element: ElementHandle,
    /// Rendered text content of the row.
    pub text: String,
}

/// A row in the quality sub-menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityRow {
    pub element: ElementHandle,
    /// Rendered text content of the row.
    pub text: String,
    /// Raw value of the row's `aria-checked` attribute, if present.
    pub aria_checked: Option<String>,
    /// Class list of the row.
    pub classes: Vec<String>,
}

impl QualityRow {
    /// Whether the player reports this row as the active quality.
    pub fn is_checked(&self) -> bool {
        self.aria_checked.as_deref() == Some("true")
            || self.classes.iter().any(|class| class == ACTIVE_ROW_CLASS)
    }
}

/// Query and click access to the externally rendered player menu.
///
/// Every call may fail if the player is mid re-render; callers treat any
/// error as the end of the current attempt.
#[async_trait]
pub trait MenuUi: Send + Sync {
    /// Whether a video element is present in the page.
    async fn has_video(&self) -> Result<bool, UiError>;

    /// Locates the settings toggle button.
    async fn settings_button(&self) -> Result<Option<ElementHandle>, UiError>;

    /// Reads the toggle's expanded/collapsed state.
    ///
    /// # Errors
    ///
    /// - `UiError::Detached` - The element is no longer in the tree
    async fn is_expanded(&self, button: ElementHandle) -> Result<bool, UiError>;

    /// Lists the rows currently rendered in the settings menu.
    async fn menu_rows(&self) -> Result<Vec<MenuRow>, UiError>;

    /// Lists the rows currently rendered in the quality sub-menu.
    async fn quality_rows(&self) -> Result<Vec<QualityRow>, UiError>;

    /// Clicks an element.
    ///
    /// # Errors
    ///
    /// - `UiError::Detached` - The element is no longer in the tree
    /// - `UiError::Interaction` - The player rejected the click
    async fn click(&self, element: ElementHandle) -> Result<(), UiError>;
}

/// Errors raised while interacting with the player menu.
#[derive(Debug, Error)]
pub enum UiError {
    /// The element was removed by a player re-render.
    #[error("{element} is no longer attached")]
    Detached { element: ElementHandle },

    /// The interaction failed for another reason.
    #[error("menu interaction failed: {reason}")]
    Interaction { reason: String },

    /// An operation was attempted in the wrong controller state.
    #[error("cannot {operation} while menu is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: MenuState,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(aria_checked: Option<&str>, classes: &[&str]) -> QualityRow {
        QualityRow {
            element: ElementHandle(1),
            text: "720p".to_string(),
            aria_checked: aria_checked.map(str::to_string),
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_checked_from_aria_attribute_or_active_class() {
        assert!(row(Some("true"), &[]).is_checked());
        assert!(row(None, &["ytp-menuitem", ACTIVE_ROW_CLASS]).is_checked());
        assert!(!row(Some("false"), &["ytp-menuitem"]).is_checked());
        assert!(!row(Some("TRUE"), &[]).is_checked());
        assert!(!row(None, &[]).is_checked());
    }
}
