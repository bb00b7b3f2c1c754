//! AutoQuality Simulation - Deterministic player and page doubles.

#![warn(missing_docs)]
#![warn(clippy::missing_errors_doc)]
//!
//! This crate provides a simulated video player that implements the engine's
//! menu contract, and a simulated page that emits document change events, so
//! the full trigger-to-click path can be exercised without a browser.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use autoquality_sim::SimulatedPlayer;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let player = SimulatedPlayer::builder()
//!     .with_qualities(&["1080p Premium", "1080p", "720p", "Auto"])
//!     .with_active(3)
//!     .with_render_latency(Duration::from_millis(150))
//!     .build()?;
//! let player = Arc::new(player);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod page;
pub mod player;

pub use builder::{DEFAULT_QUALITIES, SimulatedPlayerBuilder};
pub use page::SimulatedPage;
pub use player::{PlayerEvent, SimulatedPlayer};

/// Errors raised by the simulation harness.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The builder was asked to mark a row that does not exist.
    #[error("active row {index} out of range for {rows} rows")]
    InvalidActiveRow {
        /// Requested active index.
        index: usize,
        /// Number of configured rows.
        rows: usize,
    },

    /// The page's event receiver was dropped.
    #[error("page event receiver closed")]
    PageClosed,
}
