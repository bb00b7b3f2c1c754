//! Integration tests for AutoQuality
//!
//! These tests drive the engine end to end against the simulated player and
//! page, and exercise settings persistence through the real file store.

#[path = "integration/settings_persistence.rs"]
mod settings_persistence;

#[path = "integration/sim_selection.rs"]
mod sim_selection;

#[path = "integration/page_triggers.rs"]
mod page_triggers;
