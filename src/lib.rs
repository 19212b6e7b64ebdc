// CopyPath Settings - configuration layer of the CopyPath shell extension
//
// Layered settings (machine-wide over per-user), the pipeline plugin registry and
// software update checks. The binary crate (main.rs) prints the effective settings.

pub mod collections;
pub mod config;
pub mod logging;
pub mod models;
pub mod plugins;
pub mod updates;

// Re-export commonly used types for convenience
pub use collections::{Keyed, OrderedKeyedCollection, OrderedSet};
pub use config::{LayeredConfigStore, Settings, SettingsPaths};
pub use models::{PluginId, PluginRecord, SoftwareUpdateInfo, Version};
pub use updates::{UpdateChannelResolver, UpdateCheck, UpdateContext};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
