//! Builder pattern for creating customized simulated players.

use std::time::Duration;

use crate::SimError;
use crate::player::SimulatedPlayer;

/// Quality ladder of a typical high-resolution upload, highest first.
pub const DEFAULT_QUALITIES: [&str; 10] = [
    "2160p60 4K",
    "1440p60 HD",
    "1080p Premium Enhanced bitrate",
    "1080p60 HD",
    "720p60",
    "480p",
    "360p",
    "240p",
    "144p",
    "Auto",
];

/// Builder for creating customized simulated players.
pub struct SimulatedPlayerBuilder {
    qualities: Vec<String>,
    active: Option<usize>,
    has_video: bool,
    seed: u64,
    render_latency: Duration,
    render_jitter: Duration,
}

impl SimulatedPlayerBuilder {
    /// Creates new builder with the default quality ladder, playing "Auto".
    pub fn new() -> Self {
        Self {
            qualities: DEFAULT_QUALITIES.iter().map(|q| q.to_string()).collect(),
            active: Some(DEFAULT_QUALITIES.len() - 1),
            has_video: true,
            seed: 42,
            render_latency: Duration::from_millis(60),
            render_jitter: Duration::ZERO,
        }
    }

    /// Sets the quality rows offered by the player, in menu order.
    ///
    /// Clears the active row; use [`Self::with_active`] to set one.
    pub fn with_qualities(mut self, labels: &[&str]) -> Self {
        self.qualities = labels.iter().map(|label| label.to_string()).collect();
        self.active = None;
        self
    }

    /// Marks the row at `index` as currently playing.
    pub fn with_active(mut self, index: usize) -> Self {
        self.active = Some(index);
        self
    }

    /// Starts without a video element.
    pub fn without_video(mut self) -> Self {
        self.has_video = false;
        self
    }

    /// Sets deterministic seed for reproducible render jitter.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets how long the settings menu takes to render its rows.
    pub fn with_render_latency(mut self, latency: Duration) -> Self {
        self.render_latency = latency;
        self
    }

    /// Adds up to `jitter` of seeded random extra render latency per open.
    pub fn with_render_jitter(mut self, jitter: Duration) -> Self {
        self.render_jitter = jitter;
        self
    }

    /// Builds the configured player.
    ///
    /// # Errors
    ///
    /// - `SimError::InvalidActiveRow` - The active index is out of range
    pub fn build(self) -> Result<SimulatedPlayer, SimError> {
        if let Some(index) = self.active {
            if index >= self.qualities.len() {
                return Err(SimError::InvalidActiveRow {
                    index,
                    rows: self.qualities.len(),
                });
            }
        }

        Ok(SimulatedPlayer::from_parts(
            self.qualities,
            self.active,
            self.has_video,
            self.seed,
            self.render_latency,
            self.render_jitter,
        ))
    }
}

impl Default for SimulatedPlayerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_active_row() {
        let result = SimulatedPlayerBuilder::new()
            .with_qualities(&["720p"])
            .with_active(3)
            .build();
        assert!(matches!(result, Err(SimError::InvalidActiveRow { index: 3, rows: 1 })));
    }

    #[test]
    fn test_defaults_play_auto() {
        let player = SimulatedPlayerBuilder::new().build().unwrap();
        assert_eq!(player.active_label().as_deref(), Some("Auto"));
    }
}
