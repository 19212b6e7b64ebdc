//! Typed access to the persisted settings.
//!
//! Every accessor is best effort: a missing or unreadable value yields the documented
//! default so that a corrupted preference never keeps the editor from opening.

use crate::collections::OrderedKeyedCollection;
use crate::config::layer::LayerSource;
use crate::config::store::{LayerScope, LayeredConfigStore, ROOT_NODE, StoreError};
use crate::models::{PluginId, PluginRecord, Version};
use crate::plugins::{self, PayloadDecoder, PersistError};

/// Persisted setting names.
pub mod names {
    pub const USE_HIDDEN_SHARES: &str = "UseHiddenShares";
    pub const USE_FQDN: &str = "UseFQDN";
    pub const ADD_QUOTES: &str = "AddQuotes";
    pub const ARE_QUOTES_OPTIONAL: &str = "AreQuotesOptional";
    pub const MAKE_EMAIL_LINKS: &str = "MakeEmailLinks";
    pub const ENCODE_PARAM: &str = "EncodeParam";
    pub const APPEND_SEPARATOR_FOR_DIRECTORIES: &str = "AppendSeparatorForDirectories";
    pub const USE_ICON_FOR_DEFAULT_PLUGIN: &str = "UseIconForDefaultPlugin";
    pub const USE_ICON_FOR_SUBMENU: &str = "UseIconForSubmenu";
    pub const USE_PREVIEW_MODE: &str = "UsePreviewMode";
    pub const USE_PREVIEW_MODE_IN_MAIN_MENU: &str = "UsePreviewModeInMainMenu";
    pub const DROP_REDUNDANT_WORDS: &str = "DropRedundantWords";
    pub const ALWAYS_SHOW_SUBMENU: &str = "AlwaysShowSubmenu";
    pub const PATHS_SEPARATOR: &str = "PathsSeparator";
    pub const DISABLE_SOFTWARE_UPDATE: &str = "DisableSoftwareUpdate";
    pub const INSTALL_SOURCE: &str = "InstallSource";
    pub const IGNORED_UPDATE: &str = "IgnoredUpdate";
    pub const EDITING_DISABLED: &str = "EditingDisabled";
    pub const UPDATE_CHANNEL: &str = "UpdateChannel";
    pub const CTRL_KEY_PLUGIN: &str = "CtrlKeyPlugin";
    pub const MAIN_MENU_DISPLAY_ORDER: &str = "MainMenuDisplayOrder";
    pub const SUBMENU_DISPLAY_ORDER: &str = "SubmenuDisplayOrder";
    pub const UI_DISPLAY_ORDER: &str = "UIDisplayOrder";
    pub const KNOWN_PLUGINS: &str = "KnownPlugins";
}

/// Channel polled for updates when the machine-wide layer does not name one.
pub const DEFAULT_UPDATE_CHANNEL: &str = "https://copypath.example.org/updates/stable.xml";

/// How parameters are encoded when a path is turned into a link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum EncodeParam {
    #[default]
    None,
    Whitespace,
    All,
}

impl EncodeParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodeParam::None => "None",
            EncodeParam::Whitespace => "Whitespace",
            EncodeParam::All => "All",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [EncodeParam::None, EncodeParam::Whitespace, EncodeParam::All]
            .into_iter()
            .find(|candidate| candidate.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

/// Persisted id lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IdList {
    MainMenuDisplayOrder,
    SubmenuDisplayOrder,
    UiDisplayOrder,
    KnownPlugins,
}

impl IdList {
    pub fn setting_name(&self) -> &'static str {
        match self {
            IdList::MainMenuDisplayOrder => names::MAIN_MENU_DISPLAY_ORDER,
            IdList::SubmenuDisplayOrder => names::SUBMENU_DISPLAY_ORDER,
            IdList::UiDisplayOrder => names::UI_DISPLAY_ORDER,
            IdList::KnownPlugins => names::KNOWN_PLUGINS,
        }
    }
}

/// Saved position and size of an editor window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormGeometry {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

macro_rules! bool_setting {
    ($(#[$doc:meta])* $getter:ident, $setter:ident, $name:expr, $default:expr) => {
        $(#[$doc])*
        pub fn $getter(&self) -> bool {
            self.bool_value($name, $default)
        }

        pub fn $setter(&mut self, value: bool) -> Result<(), StoreError> {
            self.store.set_value($name, value)
        }
    };
}

/// Typed facade over a [`LayeredConfigStore`].
#[derive(Debug)]
pub struct Settings {
    store: LayeredConfigStore,
}

impl Settings {
    pub fn new(store: LayeredConfigStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &LayeredConfigStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut LayeredConfigStore {
        &mut self.store
    }

    pub fn into_store(self) -> LayeredConfigStore {
        self.store
    }

    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.store.flush()
    }

    bool_setting!(use_hidden_shares, set_use_hidden_shares, names::USE_HIDDEN_SHARES, false);
    bool_setting!(use_fqdn, set_use_fqdn, names::USE_FQDN, false);
    bool_setting!(add_quotes, set_add_quotes, names::ADD_QUOTES, false);
    bool_setting!(
        /// Only meaningful when [`add_quotes`](Self::add_quotes) is on.
        are_quotes_optional,
        set_are_quotes_optional,
        names::ARE_QUOTES_OPTIONAL,
        false
    );
    bool_setting!(make_email_links, set_make_email_links, names::MAKE_EMAIL_LINKS, false);
    bool_setting!(
        append_separator_for_directories,
        set_append_separator_for_directories,
        names::APPEND_SEPARATOR_FOR_DIRECTORIES,
        false
    );
    bool_setting!(
        use_icon_for_default_plugin,
        set_use_icon_for_default_plugin,
        names::USE_ICON_FOR_DEFAULT_PLUGIN,
        false
    );
    bool_setting!(use_icon_for_submenu, set_use_icon_for_submenu, names::USE_ICON_FOR_SUBMENU, true);
    bool_setting!(use_preview_mode, set_use_preview_mode, names::USE_PREVIEW_MODE, false);
    bool_setting!(
        use_preview_mode_in_main_menu,
        set_use_preview_mode_in_main_menu,
        names::USE_PREVIEW_MODE_IN_MAIN_MENU,
        false
    );
    bool_setting!(drop_redundant_words, set_drop_redundant_words, names::DROP_REDUNDANT_WORDS, false);
    bool_setting!(always_show_submenu, set_always_show_submenu, names::ALWAYS_SHOW_SUBMENU, true);
    bool_setting!(
        disable_software_update,
        set_disable_software_update,
        names::DISABLE_SOFTWARE_UPDATE,
        false
    );

    /// Unknown names fall back to [`EncodeParam::None`].
    pub fn encode_param(&self) -> EncodeParam {
        match self.store.get_value(names::ENCODE_PARAM) {
            Some(value) => EncodeParam::from_name(&value.to_text()).unwrap_or_else(|| {
                tracing::warn!("Unrecognized {} value {:?}, using default", names::ENCODE_PARAM, value);
                EncodeParam::default()
            }),
            None => EncodeParam::default(),
        }
    }

    pub fn set_encode_param(&mut self, value: EncodeParam) -> Result<(), StoreError> {
        self.store.set_value(names::ENCODE_PARAM, value.as_str())
    }

    /// Separator between multiple copied paths. `None` means the built-in behaviour,
    /// which differs from an explicit empty separator.
    pub fn paths_separator(&self) -> Option<String> {
        self.text_value(names::PATHS_SEPARATOR)
    }

    /// `None` deletes the user value, restoring the default behaviour.
    pub fn set_paths_separator(&mut self, separator: Option<&str>) -> Result<(), StoreError> {
        match separator {
            Some(separator) => self.store.set_value(names::PATHS_SEPARATOR, separator),
            None => self.store.delete_value(names::PATHS_SEPARATOR).map(|_| ()),
        }
    }

    /// Where this installation came from (installer flavour). Machine-wide only.
    pub fn install_source(&self) -> Option<String> {
        self.store
            .read_from(LayerScope::Global, ROOT_NODE, names::INSTALL_SOURCE)
            .map(|value| value.to_text())
    }

    /// Set by the administrator to lock the editor. Machine-wide only.
    pub fn editing_disabled(&self) -> bool {
        self.store
            .read_from(LayerScope::Global, ROOT_NODE, names::EDITING_DISABLED)
            .and_then(|value| value.as_bool())
            .unwrap_or(false)
    }

    /// Update feed URL, or the `NONE` sentinel. Machine-wide only.
    pub fn update_channel(&self) -> String {
        self.store
            .read_from(LayerScope::Global, ROOT_NODE, names::UPDATE_CHANNEL)
            .map(|value| value.to_text())
            .filter(|channel| !channel.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_UPDATE_CHANNEL.to_string())
    }

    /// Version the user chose to skip. Unparsable markers read as unset.
    pub fn ignored_update(&self) -> Option<Version> {
        self.text_value(names::IGNORED_UPDATE)
            .and_then(|text| Version::parse_lenient(&text))
    }

    pub fn set_ignored_update(&mut self, version: Version) -> Result<(), StoreError> {
        self.store
            .set_value(names::IGNORED_UPDATE, version.to_string())
    }

    /// Plugin used when the Ctrl key is held while invoking the menu.
    pub fn ctrl_key_plugin(&self) -> Option<PluginId> {
        self.text_value(names::CTRL_KEY_PLUGIN)
            .and_then(|text| PluginId::parse(&text))
    }

    pub fn set_ctrl_key_plugin(&mut self, id: Option<PluginId>) -> Result<(), StoreError> {
        match id {
            Some(id) => self.store.set_value(names::CTRL_KEY_PLUGIN, id.to_string()),
            None => self.store.delete_value(names::CTRL_KEY_PLUGIN).map(|_| ()),
        }
    }

    /// Stored id list, or `None` when the list was never saved (use the default order).
    /// An explicit empty list is `Some(vec![])`.
    pub fn id_list(&self, list: IdList) -> Option<Vec<PluginId>> {
        self.text_value(list.setting_name())
            .map(|text| PluginId::parse_list(&text))
    }

    /// Save `ids`, or delete the list with `None`.
    pub fn set_id_list(&mut self, list: IdList, ids: Option<&[PluginId]>) -> Result<(), StoreError> {
        match ids {
            Some(ids) => self
                .store
                .set_value(list.setting_name(), PluginId::format_list(ids)),
            None => self.store.delete_value(list.setting_name()).map(|_| ()),
        }
    }

    /// Ids in `available` that are missing from the known-plugins list.
    ///
    /// Without a known-plugins list nothing is reported as new.
    pub fn new_plugins(&self, available: &[PluginId]) -> Vec<PluginId> {
        let Some(known) = self.id_list(IdList::KnownPlugins) else {
            return Vec::new();
        };

        let mut fresh: OrderedKeyedCollection<PluginId, PluginId> = available.iter().copied().collect();
        fresh.except_with(&known);

        // Keep the caller's order
        available
            .iter()
            .filter(|id| fresh.contains_key(*id))
            .copied()
            .collect()
    }

    pub fn form_geometry(&self, form: &str) -> Option<FormGeometry> {
        let part = |suffix: &str| {
            self.store
                .get_value(&format!("{}{}", form, suffix))
                .and_then(|value| value.as_integer())
                .and_then(|n| i32::try_from(n).ok())
        };

        Some(FormGeometry {
            x: part("X")?,
            y: part("Y")?,
            width: part("Width")?,
            height: part("Height")?,
        })
    }

    pub fn set_form_geometry(&mut self, form: &str, geometry: FormGeometry) -> Result<(), StoreError> {
        self.store.set_value(&format!("{}X", form), geometry.x)?;
        self.store.set_value(&format!("{}Y", form), geometry.y)?;
        self.store.set_value(&format!("{}Width", form), geometry.width)?;
        self.store.set_value(&format!("{}Height", form), geometry.height)
    }

    /// Durable pipeline plugin list, global plugins first, in display order.
    pub fn pipeline_plugins(&self, decoder: &dyn PayloadDecoder) -> Vec<PluginRecord> {
        plugins::load_plugins(
            self.store.global_layer(),
            self.store.user_layer(),
            plugins::PIPELINE_PLUGINS_NODE,
            decoder,
        )
    }

    /// Save the durable plugin list, including its order, pruning removed plugins.
    pub fn save_pipeline_plugins(&mut self, records: &[PluginRecord]) -> Result<(), PersistError> {
        plugins::save_plugins(records, self.store.user_layer_mut())
    }

    /// Draft plugins being edited; never affects the durable list or its order.
    pub fn temp_pipeline_plugins(&self, decoder: &dyn PayloadDecoder) -> Vec<PluginRecord> {
        plugins::load_plugins(
            None::<&dyn LayerSource>,
            self.store.user_layer(),
            plugins::TEMP_PIPELINE_PLUGINS_NODE,
            decoder,
        )
    }

    pub fn save_temp_pipeline_plugins(&mut self, records: &[PluginRecord]) -> Result<(), PersistError> {
        plugins::save_temp_plugins(records, self.store.user_layer_mut())
    }

    pub fn remove_pipeline_plugin(&mut self, id: PluginId) -> Result<bool, PersistError> {
        plugins::remove_plugin(id, self.store.user_layer_mut(), plugins::PIPELINE_PLUGINS_NODE)
    }

    fn bool_value(&self, name: &str, default: bool) -> bool {
        match self.store.get_value(name) {
            Some(value) => value.as_bool().unwrap_or_else(|| {
                tracing::warn!("Unreadable boolean setting {}, using default", name);
                default
            }),
            None => default,
        }
    }

    /// Effective value as text; numbers and flags read as their textual form.
    fn text_value(&self, name: &str) -> Option<String> {
        self.store.get_value(name).map(|value| value.to_text())
    }
}
