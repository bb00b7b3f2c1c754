//! User quality preferences.
//!
//! Raw records come from an external store and may have any shape. They are
//! sanitized into a well-formed [`Configuration`] before the selection policy
//! ever sees them, and written back only in the canonical shape.

pub mod store;

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
pub use store::{JsonFileSettingsStore, MemorySettingsStore};

use crate::quality::QualityId;

/// Storage key the preference record lives under.
pub const SETTINGS_KEY: &str = "ytQualitySettings";

/// Selection policy chosen by the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum Mode {
    /// Always pick the highest resolution on offer.
    #[default]
    #[serde(rename = "max")]
    Maximum,
    /// Walk the user's ordered preference list.
    #[serde(rename = "priority")]
    Priority,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Maximum => "max",
            Mode::Priority => "priority",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "max" | "maximum" => Ok(Mode::Maximum),
            "priority" => Ok(Mode::Priority),
            _ => Err(format!(
                "Invalid mode: '{s}'. Valid options are: max, priority"
            )),
        }
    }
}

/// Sanitized selection preferences.
///
/// `priority_order` holds unique canonical ids and is never empty once it has
/// passed through [`Configuration::sanitize`]. Serializes to the persisted
/// record shape `{ "mode": ..., "priorityOrder": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Configuration {
    pub mode: Mode,
    #[serde(rename = "priorityOrder")]
    pub priority_order: Vec<QualityId>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            mode: Mode::Maximum,
            priority_order: QualityId::DEFAULT_PRIORITY.to_vec(),
        }
    }
}

impl Configuration {
    /// Creates a configuration from typed parts, applying the same
    /// deduplication and non-empty guarantees as [`Configuration::sanitize`].
    pub fn new(mode: Mode, priority_order: impl IntoIterator<Item = QualityId>) -> Self {
        Self {
            mode,
            priority_order: dedupe_or_default(priority_order),
        }
    }

    /// Normalizes an arbitrary external value into a well-formed configuration.
    ///
    /// Never fails: non-object input yields the defaults, an unrecognized mode
    /// becomes `Maximum`, unknown and duplicate ids are dropped in first-seen
    /// order, and a missing or non-list `priorityOrder` falls back to the
    /// default list.
    pub fn sanitize(raw: &Value) -> Self {
        let Value::Object(fields) = raw else {
            return Self::default();
        };

        let mode = match fields.get("mode") {
            Some(Value::String(token)) if token == Mode::Priority.as_str() => Mode::Priority,
            _ => Mode::Maximum,
        };

        let priority_order = match fields.get("priorityOrder") {
            Some(Value::Array(entries)) => dedupe_or_default(
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .filter_map(|token| token.parse::<QualityId>().ok()),
            ),
            _ => QualityId::DEFAULT_PRIORITY.to_vec(),
        };

        Self {
            mode,
            priority_order,
        }
    }

    /// Canonical persisted form of this configuration.
    pub fn to_record(&self) -> Value {
        serde_json::json!({
            "mode": self.mode.as_str(),
            "priorityOrder": self
                .priority_order
                .iter()
                .map(|id| id.as_str())
                .collect::<Vec<_>>(),
        })
    }
}

/// Keeps first occurrences only; an empty result becomes the first default id.
fn dedupe_or_default(ids: impl IntoIterator<Item = QualityId>) -> Vec<QualityId> {
    let mut seen = HashSet::new();
    let mut ordered: Vec<QualityId> = ids.into_iter().filter(|id| seen.insert(*id)).collect();

    if ordered.is_empty() {
        ordered.push(QualityId::DEFAULT_PRIORITY[0]);
    }

    ordered
}

/// Asynchronous key/value persistence for the preference record.
///
/// Implementations may fail; callers on the selection path treat failure the
/// same as an absent record.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Reads the raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Unavailable` - Backend could not be reached
    /// - `StoreError::Io` - Underlying file operation failed
    /// - `StoreError::Serialization` - Stored data is not valid JSON
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the value stored under `key`.
    ///
    /// # Errors
    ///
    /// - `StoreError::Unavailable` - Backend could not be reached
    /// - `StoreError::Io` - Underlying file operation failed
    /// - `StoreError::Serialization` - Value could not be encoded
    async fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
}

/// Errors from settings persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("settings store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("settings I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("settings serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Loads and sanitizes the stored preferences.
///
/// Store failures and missing records both resolve to the defaults; this
/// never fails.
pub async fn load_settings(store: &dyn SettingsStore) -> Configuration {
    match store.get(SETTINGS_KEY).await {
        Ok(Some(raw)) => Configuration::sanitize(&raw),
        Ok(None) => {
            tracing::debug!("No stored settings, using defaults");
            Configuration::default()
        }
        Err(e) => {
            tracing::warn!("Failed loading settings, using defaults: {e}");
            Configuration::default()
        }
    }
}

/// Persists preferences in the canonical record shape.
///
/// # Errors
///
/// - `StoreError` - Propagated from the backing store
pub async fn save_settings(
    store: &dyn SettingsStore,
    configuration: &Configuration,
) -> Result<(), StoreError> {
    let canonical = Configuration::sanitize(&configuration.to_record());
    store.set(SETTINGS_KEY, canonical.to_record()).await?;
    tracing::info!(
        mode = %canonical.mode,
        entries = canonical.priority_order.len(),
        "Saved quality settings"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_non_object_input_yields_defaults() {
        for raw in [json!(null), json!(42), json!("priority"), json!(true)] {
            assert_eq!(Configuration::sanitize(&raw), Configuration::default());
        }
    }

    #[test]
    fn test_mode_requires_exact_priority_token() {
        let priority = Configuration::sanitize(&json!({ "mode": "priority" }));
        assert_eq!(priority.mode, Mode::Priority);

        for token in [json!("Priority"), json!("PRIORITY"), json!(1), json!(null)] {
            let config = Configuration::sanitize(&json!({ "mode": token }));
            assert_eq!(config.mode, Mode::Maximum);
        }
    }

    #[test]
    fn test_priority_order_filters_and_dedupes_in_first_seen_order() {
        let config = Configuration::sanitize(&json!({
            "mode": "priority",
            "priorityOrder": ["720p", "bogus", "1080p_hbr", 1080, "720p", "1440p"]
        }));

        assert_eq!(
            config.priority_order,
            vec![QualityId::P720, QualityId::P1080Enhanced, QualityId::P1440]
        );
    }

    #[test]
    fn test_missing_or_non_list_order_falls_back_to_default_list() {
        let missing = Configuration::sanitize(&json!({ "mode": "priority" }));
        assert_eq!(missing.priority_order, QualityId::DEFAULT_PRIORITY.to_vec());

        let scalar = Configuration::sanitize(&json!({ "priorityOrder": "1080p" }));
        assert_eq!(scalar.priority_order, QualityId::DEFAULT_PRIORITY.to_vec());
    }

    #[test]
    fn test_list_without_canonical_ids_keeps_first_default() {
        let config = Configuration::sanitize(&json!({ "priorityOrder": ["8k", null] }));
        assert_eq!(config.priority_order, vec![QualityId::P1080Enhanced]);
    }

    #[test]
    fn test_record_shape_matches_persisted_format() {
        let config = Configuration::new(Mode::Priority, [QualityId::P720, QualityId::P1080]);
        assert_eq!(
            config.to_record(),
            json!({ "mode": "priority", "priorityOrder": ["720p", "1080p"] })
        );
        assert_eq!(serde_json::to_value(&config).unwrap(), config.to_record());
    }

    #[test]
    fn test_records_are_read_back_through_sanitize() {
        let config = Configuration::new(Mode::Priority, [QualityId::P720, QualityId::P1080]);
        assert_eq!(Configuration::sanitize(&config.to_record()), config);

        let edited = json!({ "mode": "priority", "priorityOrder": ["720p", "720p", "8k"] });
        assert_eq!(
            Configuration::sanitize(&edited).priority_order,
            vec![QualityId::P720]
        );
    }

    fn arbitrary_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            prop_oneof![
                Just("max".to_string()),
                Just("priority".to_string()),
                Just("1080p_hbr".to_string()),
                Just("720p".to_string()),
                Just("144p".to_string()),
                "[a-z0-9_]{0,8}",
            ]
            .prop_map(Value::String),
        ];

        leaf.prop_recursive(3, 24, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                (inner.clone(), prop::collection::vec(inner, 0..6)).prop_map(|(mode, order)| {
                    json!({ "mode": mode, "priorityOrder": order })
                }),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_sanitize_always_yields_well_formed_configuration(raw in arbitrary_json()) {
            let config = Configuration::sanitize(&raw);

            prop_assert!(!config.priority_order.is_empty());
            let unique: HashSet<_> = config.priority_order.iter().collect();
            prop_assert_eq!(unique.len(), config.priority_order.len());
            prop_assert!(config.priority_order.iter().all(|id| QualityId::ALL.contains(id)));
        }

        #[test]
        fn prop_sanitize_is_idempotent_over_records(raw in arbitrary_json()) {
            let once = Configuration::sanitize(&raw);
            let twice = Configuration::sanitize(&once.to_record());
            prop_assert_eq!(once, twice);
        }
    }
}
