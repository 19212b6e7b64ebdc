use crate::collections::OrderedKeyedCollection;
use crate::config::{LayerSource, StoreError, WritableLayer};
use crate::models::{PluginId, PluginRecord, SettingValue, child_path};
use crate::plugins::{
    DESCRIPTION_VALUE, DISPLAY_ORDER_VALUE, EDIT_MODE_VALUE, ICON_FILE_VALUE, PAYLOAD_VALUE,
    PIPELINE_PLUGINS_NODE, REQUIRED_VERSION_VALUE, TEMP_PIPELINE_PLUGINS_NODE,
};
use thiserror::Error;

/// Errors that can occur while saving plugin records
#[derive(Error, Debug)]
pub enum PersistError {
    #[error("Plugin record has a nil id")]
    NilId,

    #[error("Plugin {0} appears more than once in the list being saved")]
    DuplicateId(PluginId),

    #[error("Failed to write plugin records: {0}")]
    Store(#[from] StoreError),
}

/// A plugin node found in the layer before saving, keyed by its parsed id.
type StoredNode = (PluginId, String);

/// Write `records` under `node` in `layer`.
///
/// - `save_display_order`: store the ids of all `records`, in the given order, as the
///   display order, replacing any previous one.
/// - `prune_obsolete`: delete every plugin node whose id is not in `records`.
///
/// Only user records are written; global records take part in the display order and
/// protect nothing from pruning, since they never live in the writable layer. The list is
/// validated before anything is written. Writes are not atomic as a whole.
pub fn save<L>(
    records: &[PluginRecord],
    layer: &mut L,
    node: &str,
    save_display_order: bool,
    prune_obsolete: bool,
) -> Result<(), PersistError>
where
    L: WritableLayer + ?Sized,
{
    let incoming = validate(records)?;

    let mut stored: OrderedKeyedCollection<PluginId, StoredNode> =
        OrderedKeyedCollection::new(|entry: &StoredNode| entry.0);
    for name in layer.child_names(node) {
        if let Some(id) = PluginId::parse(&name) {
            stored.insert((id, name));
        }
    }

    if save_display_order {
        let order: Vec<PluginId> = records.iter().map(PluginRecord::id).collect();
        layer.write(
            node,
            DISPLAY_ORDER_VALUE,
            SettingValue::Text(PluginId::format_list(&order)),
        )?;
    }

    for record in records.iter().filter(|r| !r.is_global()) {
        let canonical = record.id().to_string();
        if let Some((_, existing)) = stored.find(&record.id()) {
            if *existing != canonical {
                layer.delete_node(&child_path(node, existing))?;
            }
        }
        write_record(layer, &child_path(node, &canonical), record)?;
    }

    if prune_obsolete {
        stored.except_keys(incoming.keys());
        for (id, name) in stored.iter() {
            layer.delete_node(&child_path(node, name))?;
            tracing::info!("Removed obsolete plugin {}", id);
        }
    }

    tracing::debug!(
        "Saved {} plugins under {} (order: {}, prune: {})",
        records.len(),
        node,
        save_display_order,
        prune_obsolete
    );
    Ok(())
}

/// Save the durable plugin list: persists its order and prunes removed plugins.
pub fn save_plugins<L>(records: &[PluginRecord], layer: &mut L) -> Result<(), PersistError>
where
    L: WritableLayer + ?Sized,
{
    save(records, layer, PIPELINE_PLUGINS_NODE, true, true)
}

/// Save draft plugins without touching the durable list or any display order.
pub fn save_temp_plugins<L>(records: &[PluginRecord], layer: &mut L) -> Result<(), PersistError>
where
    L: WritableLayer + ?Sized,
{
    save(records, layer, TEMP_PIPELINE_PLUGINS_NODE, false, false)
}

/// Delete the whole record of plugin `id` under `node`. Returns whether it existed.
pub fn remove_plugin<L>(id: PluginId, layer: &mut L, node: &str) -> Result<bool, PersistError>
where
    L: WritableLayer + ?Sized,
{
    if id.is_nil() {
        return Err(PersistError::NilId);
    }

    let mut removed = false;
    for name in layer.child_names(node) {
        if PluginId::parse(&name) == Some(id) {
            removed |= layer.delete_node(&child_path(node, &name))?;
        }
    }

    if removed {
        tracing::info!("Removed plugin {}", id);
    }
    Ok(removed)
}

fn validate(records: &[PluginRecord]) -> Result<OrderedKeyedCollection<PluginId, PluginId>, PersistError> {
    let mut ids = OrderedKeyedCollection::<PluginId, PluginId>::keyed();
    for record in records {
        if record.id().is_nil() {
            return Err(PersistError::NilId);
        }
        if !ids.insert(record.id()) {
            return Err(PersistError::DuplicateId(record.id()));
        }
    }
    Ok(ids)
}

fn write_record<L>(layer: &mut L, path: &str, record: &PluginRecord) -> Result<(), StoreError>
where
    L: WritableLayer + ?Sized,
{
    layer.write(path, DESCRIPTION_VALUE, record.description().into())?;
    layer.write(path, PAYLOAD_VALUE, record.payload().into())?;

    // Absent optional fields must be removed, not left at their previous value
    match record.icon_file() {
        Some(icon) => layer.write(path, ICON_FILE_VALUE, icon.into())?,
        None => {
            layer.delete_value(path, ICON_FILE_VALUE)?;
        }
    }
    match record.stored_required_version() {
        Some(version) => layer.write(path, REQUIRED_VERSION_VALUE, version.to_string().into())?,
        None => {
            layer.delete_value(path, REQUIRED_VERSION_VALUE)?;
        }
    }
    match record.edit_mode() {
        Some(mode) => layer.write(path, EDIT_MODE_VALUE, mode.as_str().into())?,
        None => {
            layer.delete_value(path, EDIT_MODE_VALUE)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryLayer;
    use crate::models::{EditMode, PluginOrigin, Version};

    fn id(n: u128) -> PluginId {
        PluginId::from_uuid(uuid::Uuid::from_u128(n))
    }

    fn user_plugin(n: u128, description: &str) -> PluginRecord {
        PluginRecord::new(id(n), description, format!("payload-{n}"), PluginOrigin::User)
    }

    fn plugin_path(n: u128) -> String {
        child_path(PIPELINE_PLUGINS_NODE, &id(n).to_string())
    }

    #[test]
    fn test_save_writes_user_records_and_order() {
        let mut layer = MemoryLayer::new();
        let records = vec![
            user_plugin(2, "Second"),
            PluginRecord::new(id(1), "Global", "g", PluginOrigin::Global),
        ];

        save_plugins(&records, &mut layer).unwrap();

        assert_eq!(
            layer.read(&plugin_path(2), DESCRIPTION_VALUE),
            Some(SettingValue::Text("Second".into()))
        );
        assert_eq!(
            layer.read(&plugin_path(2), PAYLOAD_VALUE),
            Some(SettingValue::Text("payload-2".into()))
        );
        assert!(!layer.has_node(&plugin_path(1)));
        assert_eq!(
            layer.read(PIPELINE_PLUGINS_NODE, DISPLAY_ORDER_VALUE),
            Some(SettingValue::Text(PluginId::format_list(&[id(2), id(1)])))
        );
    }

    #[test]
    fn test_cleared_optional_fields_are_deleted() {
        let mut layer = MemoryLayer::new();
        let full = user_plugin(1, "A")
            .with_icon_file(Some("a.ico".into()))
            .with_required_version(Some(Version::new(18, 0, 0, 0)))
            .with_edit_mode(Some(EditMode::Simple));
        save_plugins(&[full.clone()], &mut layer).unwrap();
        assert!(layer.read(&plugin_path(1), ICON_FILE_VALUE).is_some());

        let cleared = full
            .with_icon_file(None)
            .with_required_version(None)
            .with_edit_mode(None);
        save_plugins(&[cleared], &mut layer).unwrap();

        assert_eq!(layer.read(&plugin_path(1), ICON_FILE_VALUE), None);
        assert_eq!(layer.read(&plugin_path(1), REQUIRED_VERSION_VALUE), None);
        assert_eq!(layer.read(&plugin_path(1), EDIT_MODE_VALUE), None);
    }

    #[test]
    fn test_prune_removes_omitted_records() {
        let mut layer = MemoryLayer::new();
        save_plugins(&[user_plugin(1, "A"), user_plugin(2, "B")], &mut layer).unwrap();

        save_plugins(&[user_plugin(2, "B")], &mut layer).unwrap();

        assert!(!layer.has_node(&plugin_path(1)));
        assert!(layer.has_node(&plugin_path(2)));
    }

    #[test]
    fn test_without_prune_records_survive() {
        let mut layer = MemoryLayer::new();
        save(&[user_plugin(1, "A")], &mut layer, PIPELINE_PLUGINS_NODE, false, false).unwrap();
        save(&[user_plugin(2, "B")], &mut layer, PIPELINE_PLUGINS_NODE, false, false).unwrap();

        assert!(layer.has_node(&plugin_path(1)));
        assert!(layer.has_node(&plugin_path(2)));
        assert_eq!(layer.read(PIPELINE_PLUGINS_NODE, DISPLAY_ORDER_VALUE), None);
    }

    #[test]
    fn test_temp_plugins_do_not_touch_durable_list() {
        let mut layer = MemoryLayer::new();
        save_plugins(&[user_plugin(1, "A")], &mut layer).unwrap();
        let order_before = layer.read(PIPELINE_PLUGINS_NODE, DISPLAY_ORDER_VALUE);

        save_temp_plugins(&[user_plugin(5, "Draft")], &mut layer).unwrap();

        assert!(layer.has_node(&plugin_path(1)));
        assert_eq!(layer.read(PIPELINE_PLUGINS_NODE, DISPLAY_ORDER_VALUE), order_before);
        assert!(layer.has_node(&child_path(TEMP_PIPELINE_PLUGINS_NODE, &id(5).to_string())));
        assert_eq!(layer.read(TEMP_PIPELINE_PLUGINS_NODE, DISPLAY_ORDER_VALUE), None);
    }

    #[test]
    fn test_invalid_lists_rejected_before_writing() {
        let mut layer = MemoryLayer::new();

        let nil = PluginRecord::new(PluginId::from_uuid(uuid::Uuid::nil()), "x", "", PluginOrigin::User);
        assert!(matches!(
            save_plugins(&[nil], &mut layer),
            Err(PersistError::NilId)
        ));

        let duplicate = [user_plugin(1, "A"), user_plugin(1, "A again")];
        assert!(matches!(
            save_plugins(&duplicate, &mut layer),
            Err(PersistError::DuplicateId(dup)) if dup == id(1)
        ));
        assert!(!layer.has_node(PIPELINE_PLUGINS_NODE));
    }

    #[test]
    fn test_non_canonical_node_name_is_rewritten() {
        let lower = id(1).to_string().to_lowercase();
        let mut layer = MemoryLayer::new().with_value(
            &child_path(PIPELINE_PLUGINS_NODE, &lower),
            DESCRIPTION_VALUE,
            "old",
        );

        save_plugins(&[user_plugin(1, "new")], &mut layer).unwrap();

        assert_eq!(layer.child_names(PIPELINE_PLUGINS_NODE), vec![id(1).to_string()]);
    }

    #[test]
    fn test_remove_plugin() {
        let mut layer = MemoryLayer::new();
        save_plugins(&[user_plugin(1, "A")], &mut layer).unwrap();

        assert!(remove_plugin(id(1), &mut layer, PIPELINE_PLUGINS_NODE).unwrap());
        assert!(!remove_plugin(id(1), &mut layer, PIPELINE_PLUGINS_NODE).unwrap());
        assert!(!layer.has_node(&plugin_path(1)));
    }

    #[test]
    fn test_derived_required_version_is_not_written() {
        let mut layer = MemoryLayer::new()
            .with_value(&plugin_path(1), REQUIRED_VERSION_VALUE, "17.0.0.0");
        let record = user_plugin(1, "A").with_derived_required_version(Some(Version::new(18, 0, 0, 0)));

        save_plugins(&[record], &mut layer).unwrap();

        assert_eq!(layer.read(&plugin_path(1), REQUIRED_VERSION_VALUE), None);
    }
}
