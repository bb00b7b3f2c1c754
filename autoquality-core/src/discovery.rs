//! Parsing of the quality sub-menu into structured options.

use std::sync::LazyLock;

use regex::Regex;

use crate::menu::{ElementHandle, MenuUi, QualityRow, UiError};
use crate::quality::OptionId;

/// Label fragments that mark an enhanced-bitrate variant.
pub const ENHANCED_KEYWORDS: [&str; 4] = [
    "premium",
    "enhanced bitrate",
    "high bitrate",
    "higher picture quality",
];

static RESOLUTION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3,4})p").expect("resolution pattern is valid"));

/// One quality row as seen during a single attempt.
///
/// Rebuilt from scratch on every attempt; `element` is only valid while the
/// menu that produced it is still rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QualityOption {
    pub id: OptionId,
    /// Vertical resolution parsed from the label, `None` when absent.
    pub rank: Option<u32>,
    pub is_enhanced: bool,
    pub is_currently_selected: bool,
    /// Trimmed, whitespace-collapsed label.
    pub label: String,
    /// Position in the rendered menu, used as the final tie-breaker.
    pub menu_index: usize,
    pub element: ElementHandle,
}

impl QualityOption {
    /// Parses a rendered quality row.
    pub fn parse(row: &QualityRow, menu_index: usize) -> Self {
        let label = normalize_label(&row.text);
        let lower = label.to_lowercase();

        let rank = RESOLUTION_PATTERN
            .captures(&lower)
            .and_then(|captures| captures[1].parse::<u32>().ok());
        let is_enhanced = ENHANCED_KEYWORDS
            .iter()
            .any(|keyword| lower.contains(keyword));

        Self {
            id: OptionId::from_parsed(rank, is_enhanced, menu_index),
            rank,
            is_enhanced,
            is_currently_selected: row.is_checked(),
            label,
            menu_index,
            element: row.element,
        }
    }
}

fn normalize_label(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Reads every row of the open quality sub-menu, in menu order.
///
/// # Errors
///
/// - `UiError` - Listing the quality rows failed
pub async fn discover_options(ui: &dyn MenuUi) -> Result<Vec<QualityOption>, UiError> {
    let rows = ui.quality_rows().await?;
    let options: Vec<QualityOption> = rows
        .iter()
        .enumerate()
        .map(|(index, row)| QualityOption::parse(row, index))
        .collect();

    tracing::debug!(
        count = options.len(),
        ids = ?options.iter().map(|o| o.id.to_string()).collect::<Vec<_>>(),
        "Discovered quality options"
    );

    Ok(options)
}
