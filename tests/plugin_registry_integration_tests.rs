//! Integration tests for the pipeline plugin registry
//!
//! These tests verify:
//! - Merging of machine-wide and user plugins with the stored display order
//! - Saving, pruning and draft handling through Settings on YAML-backed layers
//! - Records edited and written back keep their identity
//! - A user record shadows a machine-wide record with the same id
//! - Versions derived from payloads are never written back

use camino::Utf8PathBuf;
use copypath_settings::config::LayerSource;
use copypath_settings::models::{PluginChanges, PluginOrigin, child_path};
use copypath_settings::plugins::{
    DESCRIPTION_VALUE, DISPLAY_ORDER_VALUE, DecodeError, OpaquePayloadDecoder,
    PIPELINE_PLUGINS_NODE, PayloadDecoder, PersistError, REQUIRED_VERSION_VALUE,
    TEMP_PIPELINE_PLUGINS_NODE,
};
use copypath_settings::{PluginId, PluginRecord, Settings, SettingsPaths, Version};
use mockall::mock;
use std::fs;
use tempfile::TempDir;

mock! {
    Decoder {}

    impl PayloadDecoder for Decoder {
        fn required_version(&self, payload: &str) -> Result<Version, DecodeError>;
    }
}

fn id(n: u128) -> PluginId {
    PluginId::from_uuid(uuid::Uuid::from_u128(n))
}

fn create_test_paths() -> (TempDir, SettingsPaths) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    let paths = SettingsPaths::new(&config_path).unwrap();
    (temp_dir, paths)
}

/// Global layer shipping plugins A (id 1) and B (id 2), no display order.
fn write_global_plugins(paths: &SettingsPaths) {
    let yaml = format!(
        r#"
Nodes:
  PipelinePlugins:
    Nodes:
      "{a}":
        Values:
          Description: A
          "": payload-a
      "{b}":
        Values:
          Description: B
          "": payload-b
"#,
        a = id(1),
        b = id(2)
    );
    fs::write(paths.global_layer_path(), yaml).unwrap();
}

fn user_plugin(n: u128, description: &str) -> PluginRecord {
    PluginRecord::new(id(n), description, format!("payload-{n}"), PluginOrigin::User)
}

fn ids(records: &[PluginRecord]) -> Vec<PluginId> {
    records.iter().map(PluginRecord::id).collect()
}

fn open(paths: &SettingsPaths) -> Settings {
    paths.open_settings()
}

#[test]
fn test_user_order_places_unknown_global_plugin_last() {
    let (_temp_dir, paths) = create_test_paths();
    write_global_plugins(&paths);

    {
        let mut settings = open(&paths);
        // C (id 3) first, then A; B is never mentioned
        settings
            .save_pipeline_plugins(&[
                user_plugin(3, "C"),
                PluginRecord::new(id(1), "A", "payload-a", PluginOrigin::Global),
            ])
            .unwrap();
    }

    let settings = open(&paths);
    let records = settings.pipeline_plugins(&OpaquePayloadDecoder);

    assert_eq!(ids(&records), vec![id(3), id(1), id(2)]);
    assert_eq!(records[0].origin(), PluginOrigin::User);
    assert_eq!(records[1].origin(), PluginOrigin::Global);
    assert_eq!(records[2].description(), "B");
}

#[test]
fn test_pruning_never_touches_global_plugins() {
    let (_temp_dir, paths) = create_test_paths();
    write_global_plugins(&paths);
    let mut settings = open(&paths);

    settings
        .save_pipeline_plugins(&[user_plugin(3, "C"), user_plugin(4, "D")])
        .unwrap();
    settings.save_pipeline_plugins(&[user_plugin(4, "D")]).unwrap();

    let records = settings.pipeline_plugins(&OpaquePayloadDecoder);
    assert_eq!(ids(&records), vec![id(4), id(1), id(2)]);
    assert!(records.iter().all(|r| r.id() != id(3)));
}

#[test]
fn test_edited_record_round_trips_through_yaml() {
    let (_temp_dir, paths) = create_test_paths();
    {
        let mut settings = open(&paths);
        settings.save_pipeline_plugins(&[user_plugin(7, "Before")]).unwrap();
    }

    {
        let mut settings = open(&paths);
        let records = settings.pipeline_plugins(&OpaquePayloadDecoder);
        let edited = records[0].update(PluginChanges {
            description: Some("After".to_string()),
            icon_file: Some(Some("icons/after.ico".to_string())),
            ..Default::default()
        });
        settings.save_pipeline_plugins(&[edited]).unwrap();
    }

    let settings = open(&paths);
    let records = settings.pipeline_plugins(&OpaquePayloadDecoder);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), id(7));
    assert_eq!(records[0].description(), "After");
    assert_eq!(records[0].icon_file(), Some("icons/after.ico"));
    assert_eq!(records[0].payload(), "payload-7");
}

#[test]
fn test_drafts_are_kept_apart() {
    let (_temp_dir, paths) = create_test_paths();
    let mut settings = open(&paths);
    settings.save_pipeline_plugins(&[user_plugin(1, "Durable")]).unwrap();

    settings.save_temp_pipeline_plugins(&[user_plugin(9, "Draft")]).unwrap();

    assert_eq!(ids(&settings.pipeline_plugins(&OpaquePayloadDecoder)), vec![id(1)]);
    assert_eq!(ids(&settings.temp_pipeline_plugins(&OpaquePayloadDecoder)), vec![id(9)]);

    let user = settings.store().user_layer();
    assert_eq!(user.read(TEMP_PIPELINE_PLUGINS_NODE, DISPLAY_ORDER_VALUE), None);
    assert!(user.read(PIPELINE_PLUGINS_NODE, DISPLAY_ORDER_VALUE).is_some());
}

#[test]
fn test_remove_pipeline_plugin() {
    let (_temp_dir, paths) = create_test_paths();
    let mut settings = open(&paths);
    settings
        .save_pipeline_plugins(&[user_plugin(1, "A"), user_plugin(2, "B")])
        .unwrap();

    assert!(settings.remove_pipeline_plugin(id(1)).unwrap());
    assert!(!settings.remove_pipeline_plugin(id(1)).unwrap());

    let user = settings.store().user_layer();
    let path = child_path(PIPELINE_PLUGINS_NODE, &id(1).to_string());
    assert_eq!(user.read(&path, DESCRIPTION_VALUE), None);
    assert_eq!(ids(&settings.pipeline_plugins(&OpaquePayloadDecoder)), vec![id(2)]);
}

#[test]
fn test_duplicate_ids_rejected() {
    let (_temp_dir, paths) = create_test_paths();
    let mut settings = open(&paths);

    let result = settings.save_pipeline_plugins(&[user_plugin(1, "A"), user_plugin(1, "A")]);

    assert!(matches!(result, Err(PersistError::DuplicateId(dup)) if dup == id(1)));
    assert!(settings.pipeline_plugins(&OpaquePayloadDecoder).is_empty());
}

#[test]
fn test_same_plugin_in_both_layers_loads_once_and_saves() {
    let (_temp_dir, paths) = create_test_paths();
    write_global_plugins(&paths);
    let user_yaml = format!(
        "Nodes:\n  PipelinePlugins:\n    Nodes:\n      \"{a}\":\n        Values:\n          Description: A (mine)\n          \"\": payload-a\n",
        a = id(1)
    );
    fs::write(paths.user_layer_path(), user_yaml).unwrap();

    let mut settings = open(&paths);
    let records = settings.pipeline_plugins(&OpaquePayloadDecoder);

    assert_eq!(ids(&records), vec![id(2), id(1)]);
    assert_eq!(records[1].description(), "A (mine)");
    assert_eq!(records[1].origin(), PluginOrigin::User);
    settings.save_pipeline_plugins(&records).unwrap();
}

#[test]
fn test_numeric_fields_in_global_layer_read_as_text() {
    let (_temp_dir, paths) = create_test_paths();
    let yaml = format!(
        "Nodes:\n  PipelinePlugins:\n    Nodes:\n      \"{a}\":\n        Values:\n          Description: 2024\n          \"\": 12345\n",
        a = id(1)
    );
    fs::write(paths.global_layer_path(), yaml).unwrap();

    let records = open(&paths).pipeline_plugins(&OpaquePayloadDecoder);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].description(), "2024");
    assert_eq!(records[0].payload(), "12345");
}

#[test]
fn test_derived_required_version_not_persisted() {
    let (_temp_dir, paths) = create_test_paths();
    let mut decoder = MockDecoder::new();
    decoder
        .expect_required_version()
        .returning(|_| Ok(Version::new(18, 0, 0, 0)));

    let mut settings = open(&paths);
    settings.save_pipeline_plugins(&[user_plugin(1, "A")]).unwrap();

    let records = settings.pipeline_plugins(&decoder);
    assert_eq!(records[0].required_version(), Some(Version::new(18, 0, 0, 0)));
    settings.save_pipeline_plugins(&records).unwrap();

    let path = child_path(PIPELINE_PLUGINS_NODE, &id(1).to_string());
    assert_eq!(settings.store().user_layer().read(&path, REQUIRED_VERSION_VALUE), None);
}
