//! Integration tests for SettingsPaths, LayeredConfigStore and Settings
//!
//! These tests verify:
//! - Layer resolution against real YAML files (user over global, portable mode)
//! - Persistence of user values across reopen
//! - Change events emitted on writes
//! - Id lists and "new plugin" detection

use camino::Utf8PathBuf;
use copypath_settings::config::{ChangeKind, IdList, LayerScope, SettingChange, names};
use copypath_settings::models::SettingValue;
use copypath_settings::{PluginId, SettingsPaths};
use std::fs;
use tempfile::TempDir;
use tokio::time::{Duration, timeout};

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

fn write_global(config_path: &Utf8PathBuf, yaml: &str) {
    fs::write(config_path.join("Global.yaml"), yaml).unwrap();
}

fn id(n: u128) -> PluginId {
    PluginId::from_uuid(uuid::Uuid::from_u128(n))
}

const GLOBAL_YAML: &str = r#"
Values:
  AddQuotes: 1
  InstallSource: MSI
  UpdateChannel: NONE
  EditingDisabled: 1
  PathsSeparator: ";"
"#;

#[test]
fn test_defaults_without_any_files() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let settings = SettingsPaths::new(&config_path).unwrap().open_settings();

    assert!(settings.store().is_portable());
    assert!(!settings.add_quotes());
    assert!(settings.always_show_submenu());
    assert!(settings.use_icon_for_submenu());
    assert_eq!(settings.paths_separator(), None);
    assert_eq!(settings.install_source(), None);
    assert!(!settings.editing_disabled());
}

#[test]
fn test_global_values_apply_until_user_overrides() {
    let (_temp_dir, config_path) = create_test_config_dir();
    write_global(&config_path, GLOBAL_YAML);
    let paths = SettingsPaths::new(&config_path).unwrap();

    let mut settings = paths.open_settings();
    assert!(!settings.store().is_portable());
    assert!(settings.add_quotes());
    assert_eq!(settings.install_source().as_deref(), Some("MSI"));
    assert!(settings.editing_disabled());
    assert_eq!(settings.update_channel(), "NONE");

    settings.set_add_quotes(false).unwrap();
    settings.set_paths_separator(Some(" ")).unwrap();
    assert!(!settings.add_quotes());
    assert_eq!(settings.paths_separator().as_deref(), Some(" "));

    settings.set_paths_separator(None).unwrap();
    assert_eq!(settings.paths_separator().as_deref(), Some(";"));
}

#[test]
fn test_global_file_never_rewritten() {
    let (_temp_dir, config_path) = create_test_config_dir();
    write_global(&config_path, GLOBAL_YAML);
    let paths = SettingsPaths::new(&config_path).unwrap();

    {
        let mut settings = paths.open_settings();
        settings.set_use_fqdn(true).unwrap();
        settings.flush().unwrap();
    }

    let global_text = fs::read_to_string(paths.global_layer_path()).unwrap();
    assert_eq!(global_text, GLOBAL_YAML);
    assert!(paths.user_layer_path().exists());
}

#[test]
fn test_user_values_survive_reopen() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let paths = SettingsPaths::new(&config_path).unwrap();

    {
        let mut settings = paths.open_settings();
        settings.set_make_email_links(true).unwrap();
        settings.set_id_list(IdList::KnownPlugins, Some(&[id(1), id(2)])).unwrap();
        settings.set_ctrl_key_plugin(Some(id(2))).unwrap();
    }

    let settings = paths.open_settings();
    assert!(settings.make_email_links());
    assert_eq!(settings.id_list(IdList::KnownPlugins), Some(vec![id(1), id(2)]));
    assert_eq!(settings.ctrl_key_plugin(), Some(id(2)));
    assert_eq!(
        settings.store().resolve("", names::MAKE_EMAIL_LINKS),
        Some((LayerScope::User, SettingValue::Integer(1)))
    );
}

#[test]
fn test_new_plugins_relative_to_known_list() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let mut settings = SettingsPaths::new(&config_path).unwrap().open_settings();
    let available = [id(3), id(1), id(2)];

    // No known list yet: nothing counts as new
    assert!(settings.new_plugins(&available).is_empty());

    settings.set_id_list(IdList::KnownPlugins, Some(&[id(1)])).unwrap();
    assert_eq!(settings.new_plugins(&available), vec![id(3), id(2)]);
}

#[tokio::test]
async fn test_change_events_emitted_on_write() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let mut settings = SettingsPaths::new(&config_path).unwrap().open_settings();
    let mut rx = settings.store().subscribe();

    settings.set_drop_redundant_words(true).unwrap();

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");

    assert_eq!(
        event,
        SettingChange {
            node: String::new(),
            name: names::DROP_REDUNDANT_WORDS.to_string(),
            kind: ChangeKind::Set(SettingValue::Integer(1)),
        }
    );
}

#[tokio::test]
async fn test_delete_emits_deleted_event() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let mut settings = SettingsPaths::new(&config_path).unwrap().open_settings();
    settings.set_paths_separator(Some(",")).unwrap();
    let mut rx = settings.store().subscribe();

    settings.set_paths_separator(None).unwrap();

    let event = timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed");
    assert_eq!(event.kind, ChangeKind::Deleted);
    assert_eq!(event.name, names::PATHS_SEPARATOR);
}

#[test]
fn test_unusual_values_in_global_layer_still_load() {
    let (_temp_dir, config_path) = create_test_config_dir();
    write_global(&config_path, "Values:\n  IgnoredUpdate: 1.3\n  AddQuotes: 1\n  Description: [a, b]\n");

    let settings = SettingsPaths::new(&config_path).unwrap().open_settings();

    assert!(settings.add_quotes());
    assert_eq!(settings.ignored_update(), Some(copypath_settings::Version::new(1, 3, 0, 0)));
}

#[test]
fn test_corrupt_user_layer_is_backed_up_on_save() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let paths = SettingsPaths::new(&config_path).unwrap();
    fs::write(paths.user_layer_path(), "Values: [oops").unwrap();

    {
        let mut settings = paths.open_settings();
        assert!(!settings.add_quotes());
        settings.set_add_quotes(true).unwrap();
        settings.flush().unwrap();
    }

    let backup = config_path.join("User.yaml.bak");
    assert_eq!(fs::read_to_string(&backup).unwrap(), "Values: [oops");
    assert!(paths.open_settings().add_quotes());
}
