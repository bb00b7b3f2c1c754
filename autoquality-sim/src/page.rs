//! Simulated page hosting the player.
//!
//! Emits the same [`PageEvent`] stream a real document would, so the page
//! watcher and scheduler can be driven end to end.

use std::sync::Arc;

use autoquality_core::watcher::{AddedNode, PageEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::mpsc;

use crate::SimError;
use crate::player::SimulatedPlayer;

/// Tags used for unrelated DOM churn.
const CHURN_TAGS: [&str; 5] = ["div", "span", "ytd-comment-renderer", "img", "a"];

/// A page whose structural changes feed a page watcher.
pub struct SimulatedPage {
    player: Arc<SimulatedPlayer>,
    events: mpsc::Sender<PageEvent>,
    location: String,
    rng: ChaCha8Rng,
}

impl SimulatedPage {
    /// Creates a page at `location` and the receiving end for its events.
    pub fn new(
        player: Arc<SimulatedPlayer>,
        location: impl Into<String>,
        seed: u64,
    ) -> (Self, mpsc::Receiver<PageEvent>) {
        let (events, receiver) = mpsc::channel(256);
        let page = Self {
            player,
            events,
            location: location.into(),
            rng: ChaCha8Rng::seed_from_u64(seed),
        };
        (page, receiver)
    }

    /// Current page location.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// The player embedded in this page.
    pub fn player(&self) -> &Arc<SimulatedPlayer> {
        &self.player
    }

    /// Announces the initial page load.
    ///
    /// # Errors
    ///
    /// - `SimError::PageClosed` - The watcher stopped listening
    pub async fn load(&self) -> Result<(), SimError> {
        self.emit(PageEvent::Loaded {
            location: self.location.clone(),
        })
        .await
    }

    /// Navigates in-page to another video, reusing the player element.
    ///
    /// # Errors
    ///
    /// - `SimError::PageClosed` - The watcher stopped listening
    pub async fn navigate(
        &mut self,
        location: impl Into<String>,
        qualities: &[&str],
    ) -> Result<(), SimError> {
        self.location = location.into();
        self.player.load_video(
            qualities.iter().map(|q| q.to_string()).collect(),
            qualities.iter().position(|q| q.starts_with("Auto")),
        );
        self.emit(PageEvent::Mutations {
            location: self.location.clone(),
            added: vec![AddedNode::element("ytd-watch-metadata"), AddedNode::text()],
        })
        .await
    }

    /// Inserts a player container holding a fresh video element.
    ///
    /// # Errors
    ///
    /// - `SimError::PageClosed` - The watcher stopped listening
    pub async fn insert_video(&self) -> Result<(), SimError> {
        self.emit(PageEvent::Mutations {
            location: self.location.clone(),
            added: vec![AddedNode::container_with_video("div")],
        })
        .await
    }

    /// Emits `batches` mutation batches of unrelated nodes.
    ///
    /// # Errors
    ///
    /// - `SimError::PageClosed` - The watcher stopped listening
    pub async fn churn(&mut self, batches: usize) -> Result<(), SimError> {
        for _ in 0..batches {
            let count = self.rng.random_range(1..=4);
            let added = (0..count)
                .map(|_| {
                    if self.rng.random_bool(0.3) {
                        AddedNode::text()
                    } else {
                        let tag = CHURN_TAGS[self.rng.random_range(0..CHURN_TAGS.len())];
                        AddedNode::element(tag)
                    }
                })
                .collect();

            self.emit(PageEvent::Mutations {
                location: self.location.clone(),
                added,
            })
            .await?;
        }
        Ok(())
    }

    async fn emit(&self, event: PageEvent) -> Result<(), SimError> {
        self.events
            .send(event)
            .await
            .map_err(|_| SimError::PageClosed)
    }
}
