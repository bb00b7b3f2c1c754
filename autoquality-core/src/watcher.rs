//! Page observers that turn document changes into scheduled attempts.
//!
//! Observers are level-triggered: every matching batch re-arms the
//! scheduler's single timer, so bursts collapse into one attempt.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::TriggerDelays;
use crate::scheduler::{TriggerReason, TriggerScheduler};

/// DOM node type of an added node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Element,
    Text,
    Comment,
}

/// A node inserted somewhere in the document subtree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddedNode {
    pub kind: NodeKind,
    /// Upper-case tag name for elements, empty otherwise.
    pub tag: String,
    /// Whether the node's subtree contains a video element.
    pub contains_video: bool,
}

impl AddedNode {
    pub fn element(tag: &str) -> Self {
        Self {
            kind: NodeKind::Element,
            tag: tag.to_ascii_uppercase(),
            contains_video: false,
        }
    }

    /// An element whose subtree includes a video element.
    pub fn container_with_video(tag: &str) -> Self {
        Self {
            contains_video: true,
            ..Self::element(tag)
        }
    }

    pub fn text() -> Self {
        Self {
            kind: NodeKind::Text,
            tag: String::new(),
            contains_video: false,
        }
    }

    fn is_or_contains_video(&self) -> bool {
        self.kind == NodeKind::Element && (self.tag == "VIDEO" || self.contains_video)
    }
}

/// A change notification from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageEvent {
    /// The automation was attached to a freshly loaded page.
    Loaded { location: String },
    /// A batch of structural mutations, with the location at delivery time.
    Mutations {
        location: String,
        added: Vec<AddedNode>,
    },
}

/// Watches page events and schedules attempts on the scheduler.
pub struct PageWatcher {
    scheduler: TriggerScheduler,
    delays: TriggerDelays,
    last_location: Option<String>,
}

impl PageWatcher {
    pub fn new(scheduler: TriggerScheduler, delays: TriggerDelays) -> Self {
        Self {
            scheduler,
            delays,
            last_location: None,
        }
    }

    /// Applies both observers to one event.
    pub fn handle_event(&mut self, event: PageEvent) {
        match event {
            PageEvent::Loaded { location } => {
                tracing::debug!(%location, "Page loaded");
                self.last_location = Some(location);
                self.scheduler
                    .schedule_attempt(self.delays.initial_load, TriggerReason::InitialLoad);
            }
            PageEvent::Mutations { location, added } => {
                if added.iter().any(AddedNode::is_or_contains_video) {
                    self.scheduler
                        .schedule_attempt(self.delays.video_added, TriggerReason::VideoAdded);
                }
                self.observe_location(location);
            }
        }
    }

    fn observe_location(&mut self, location: String) {
        match &self.last_location {
            Some(last) if *last == location => {}
            None => self.last_location = Some(location),
            Some(_) => {
                tracing::debug!(%location, "Location changed");
                self.last_location = Some(location.clone());
                self.scheduler.schedule_attempt(
                    self.delays.location_changed,
                    TriggerReason::LocationChanged { location },
                );
            }
        }
    }

    /// Processes events until the sender side closes.
    pub async fn run(mut self, mut events: mpsc::Receiver<PageEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        tracing::debug!("Page event channel closed, watcher stopping");
    }

    /// Runs the watcher on a background task.
    pub fn spawn(self, events: mpsc::Receiver<PageEvent>) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }
}
