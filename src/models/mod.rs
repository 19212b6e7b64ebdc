//! Data models for the settings layer.
//!
//! - [`LayerNode`] / [`SettingValue`]: the tree of named scalars a configuration layer stores
//! - [`PluginRecord`]: immutable snapshot of one pipeline plugin, keyed by [`PluginId`]
//! - [`Version`]: four-part build version used by plugins and the update feed
//! - [`SoftwareUpdateInfo`] / [`SoftwareUpdateCollection`]: entries of an update manifest
//!
//! # Architecture Note
//!
//! Layer documents derive `Serialize` and read YAML leniently through
//! `serde_yaml_ng::Value`, keeping whatever scalars they can. Plugin records
//! and update entries are never serialized directly; the plugin code maps them onto layer
//! values and the update code builds them from the XML manifest.

pub mod layer;
pub mod plugin;
pub mod update;
pub mod version;

pub use layer::{LayerNode, NODE_PATH_SEPARATOR, SettingValue, child_path};
pub use plugin::{EditMode, PluginChanges, PluginId, PluginOrigin, PluginRecord};
pub use update::{SoftwareUpdateCollection, SoftwareUpdateInfo};
pub use version::{Version, VersionParseError};
