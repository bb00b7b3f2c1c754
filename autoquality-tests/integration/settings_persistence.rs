//! Settings round trips through the JSON file store.

use autoquality_core::settings::{SETTINGS_KEY, load_settings, save_settings};
use autoquality_core::{Configuration, JsonFileSettingsStore, Mode, QualityId, SettingsStore};
use serde_json::json;
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> JsonFileSettingsStore {
    JsonFileSettingsStore::new(dir.path().join("settings.json"))
}

#[tokio::test]
async fn test_saved_settings_survive_a_new_store_instance() {
    let dir = TempDir::new().unwrap();
    let configuration = Configuration::new(
        Mode::Priority,
        [QualityId::P1440, QualityId::P1080Enhanced, QualityId::P720],
    );

    save_settings(&store_in(&dir), &configuration).await.unwrap();
    let loaded = load_settings(&store_in(&dir)).await;

    assert_eq!(loaded, configuration);
}

#[tokio::test]
async fn test_file_holds_canonical_record_under_settings_key() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let configuration = Configuration::new(Mode::Priority, [QualityId::P720Enhanced, QualityId::P720]);

    save_settings(&store, &configuration).await.unwrap();

    let contents = std::fs::read_to_string(store.path()).unwrap();
    let on_disk: serde_json::Value = serde_json::from_str(&contents).unwrap();
    assert_eq!(
        on_disk[SETTINGS_KEY],
        json!({ "mode": "priority", "priorityOrder": ["720p_hbr", "720p"] })
    );
}

#[tokio::test]
async fn test_missing_file_loads_defaults() {
    let dir = TempDir::new().unwrap();

    let loaded = load_settings(&store_in(&dir)).await;

    assert_eq!(loaded, Configuration::default());
    assert_eq!(loaded.mode, Mode::Maximum);
    assert_eq!(loaded.priority_order, QualityId::DEFAULT_PRIORITY.to_vec());
}

#[tokio::test]
async fn test_corrupt_file_loads_defaults_and_is_replaced_on_save() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    std::fs::write(store.path(), "{ not json").unwrap();

    assert_eq!(load_settings(&store).await, Configuration::default());

    let configuration = Configuration::new(Mode::Priority, [QualityId::P480]);
    save_settings(&store, &configuration).await.unwrap();
    assert_eq!(load_settings(&store).await, configuration);
}

#[tokio::test]
async fn test_hand_edited_record_is_sanitized_on_load() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .set(
            SETTINGS_KEY,
            json!({
                "mode": "priority",
                "priorityOrder": ["720p", "999p", 1080, "720p", "1080p_hbr"],
            }),
        )
        .await
        .unwrap();

    let loaded = load_settings(&store).await;

    assert_eq!(loaded.mode, Mode::Priority);
    assert_eq!(
        loaded.priority_order,
        vec![QualityId::P720, QualityId::P1080Enhanced]
    );
}

#[tokio::test]
async fn test_list_without_canonical_ids_collapses_to_enhanced_1080p() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store
        .set(
            SETTINGS_KEY,
            json!({ "mode": "priority", "priorityOrder": ["8k", "best"] }),
        )
        .await
        .unwrap();

    let loaded = load_settings(&store).await;

    assert_eq!(loaded.priority_order, vec![QualityId::P1080Enhanced]);
}

#[tokio::test]
async fn test_other_keys_in_file_are_preserved() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    store.set("unrelated", json!({ "volume": 40 })).await.unwrap();

    save_settings(&store, &Configuration::default()).await.unwrap();

    assert_eq!(
        store.get("unrelated").await.unwrap(),
        Some(json!({ "volume": 40 }))
    );
}
