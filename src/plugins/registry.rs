use crate::collections::OrderedSet;
use crate::config::LayerSource;
use crate::models::{EditMode, PluginId, PluginOrigin, PluginRecord, Version, child_path};
use crate::plugins::{
    DESCRIPTION_VALUE, DISPLAY_ORDER_VALUE, EDIT_MODE_VALUE, ICON_FILE_VALUE, PAYLOAD_VALUE,
    PayloadDecoder, REQUIRED_VERSION_VALUE,
};
use std::collections::HashMap;

/// Load the plugins stored under `node` in both layers, in display order.
///
/// Global records come first, then user records, each in storage order. If a display
/// order is stored (user layer first, then global) the list is stable-sorted by it and
/// plugins it does not mention keep their relative order at the end. Without a stored
/// order the discovery order is returned as is.
///
/// Ids are unique in the result: a user record shadows a machine-wide record with the
/// same id, and within one layer the first node spelling an id wins. Nodes whose name
/// is not a valid id are skipped.
pub fn load_plugins<G, U>(
    global: Option<&G>,
    user: &U,
    node: &str,
    decoder: &dyn PayloadDecoder,
) -> Vec<PluginRecord>
where
    G: LayerSource + ?Sized,
    U: LayerSource + ?Sized,
{
    let user_records = read_records(user, node, PluginOrigin::User, decoder);
    let user_ids: OrderedSet<PluginId> = user_records.iter().map(PluginRecord::id).collect();

    let mut records = Vec::new();
    if let Some(global) = global {
        for record in read_records(global, node, PluginOrigin::Global, decoder) {
            if user_ids.contains_key(&record.id()) {
                tracing::debug!("User plugin {} shadows the machine-wide record", record.id());
                continue;
            }
            records.push(record);
        }
    }
    records.extend(user_records);

    let display_order =
        read_display_order(user, node).or_else(|| global.and_then(|g| read_display_order(g, node)));

    match display_order {
        Some(order) => {
            apply_display_order(&mut records, &order);
            tracing::debug!(
                "Loaded {} plugins from {}, ordered by a {}-entry display order",
                records.len(),
                node,
                order.len()
            );
        }
        None => {
            tracing::debug!("Loaded {} plugins from {} in discovery order", records.len(), node);
        }
    }

    records
}

/// Stored display order under `node`, or `None` if never saved.
pub fn read_display_order<L>(layer: &L, node: &str) -> Option<Vec<PluginId>>
where
    L: LayerSource + ?Sized,
{
    layer
        .read(node, DISPLAY_ORDER_VALUE)
        .map(|value| PluginId::parse_list(&value.to_text()))
}

/// Stable-sort `records` by position in `order`. Records missing from `order` go last.
///
/// If an id appears more than once in `order`, its first position is used.
pub fn apply_display_order(records: &mut [PluginRecord], order: &[PluginId]) {
    let mut positions: HashMap<PluginId, usize> = HashMap::with_capacity(order.len());
    for (index, id) in order.iter().enumerate() {
        positions.entry(*id).or_insert(index);
    }

    records.sort_by_key(|record| positions.get(&record.id()).copied().unwrap_or(usize::MAX));
}

fn read_records<L>(
    layer: &L,
    node: &str,
    origin: PluginOrigin,
    decoder: &dyn PayloadDecoder,
) -> Vec<PluginRecord>
where
    L: LayerSource + ?Sized,
{
    let mut seen = OrderedSet::<PluginId>::identity();
    layer
        .child_names(node)
        .into_iter()
        .filter_map(|name| {
            let Some(id) = PluginId::parse(&name) else {
                tracing::debug!("Skipping plugin node with malformed id: {}", name);
                return None;
            };
            if !seen.insert(id) {
                tracing::warn!("Skipping plugin node {}: id {} already loaded", name, id);
                return None;
            }
            Some(read_record(layer, &child_path(node, &name), id, origin, decoder))
        })
        .collect()
}

fn read_record<L>(
    layer: &L,
    path: &str,
    id: PluginId,
    origin: PluginOrigin,
    decoder: &dyn PayloadDecoder,
) -> PluginRecord
where
    L: LayerSource + ?Sized,
{
    let text = |name: &str| layer.read(path, name).map(|value| value.to_text());

    let payload = text(PAYLOAD_VALUE).unwrap_or_default();
    let icon_file = text(ICON_FILE_VALUE).filter(|icon| !icon.is_empty());
    let edit_mode = text(EDIT_MODE_VALUE).and_then(|mode| EditMode::from_name(&mode));
    let stored_version = text(REQUIRED_VERSION_VALUE).and_then(|version| Version::parse_lenient(&version));

    let record = PluginRecord::new(id, text(DESCRIPTION_VALUE).unwrap_or_default(), payload, origin)
        .with_icon_file(icon_file)
        .with_edit_mode(edit_mode);

    if stored_version.is_some() {
        return record.with_required_version(stored_version);
    }
    match decoder.required_version(record.payload()) {
        Ok(version) => record.with_derived_required_version(Some(version)),
        Err(e) => {
            tracing::debug!("Could not derive required version for plugin {}: {}", id, e);
            record
        }
    }
}
