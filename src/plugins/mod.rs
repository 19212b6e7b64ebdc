//! Pipeline plugin registry.
//!
//! Pipeline plugins are user-composable processing chains stored as one node per plugin
//! id under [`PIPELINE_PLUGINS_NODE`]. The machine-wide layer may ship plugins of its own;
//! those are read-only here. This module turns both layers into one ordered list and
//! writes the user's list back.
//!
//! # Components
//!
//! - [`load_plugins`]: merges global and user records and applies the stored display
//!   order, appending plugins the order does not know about
//! - [`save`], [`save_plugins`], [`save_temp_plugins`], [`remove_plugin`]: write user
//!   records back, optionally persisting the order and pruning removed plugins
//! - [`PayloadDecoder`]: derives a plugin's required version from its encoded payload
//!   when the record does not store one
//!
//! # Storage Layout
//!
//! ```text
//! PipelinePlugins/
//!     DisplayOrder = "{id},{id},..."
//!     {id}/
//!         ""              = encoded payload
//!         Description     = display name
//!         IconFile        = optional icon path
//!         RequiredVersion = optional minimum version
//!         EditMode        = optional "Simple" | "Expert"
//! ```
//!
//! Drafts live under [`TEMP_PIPELINE_PLUGINS_NODE`] with the same layout; saving drafts
//! never touches the durable list or its order.

pub mod persistence;
pub mod registry;

pub use persistence::{PersistError, remove_plugin, save, save_plugins, save_temp_plugins};
pub use registry::{apply_display_order, load_plugins, read_display_order};

use crate::models::Version;
use thiserror::Error;

/// Node holding the durable pipeline plugins.
pub const PIPELINE_PLUGINS_NODE: &str = "PipelinePlugins";

/// Node holding draft pipeline plugins.
pub const TEMP_PIPELINE_PLUGINS_NODE: &str = "TempPipelinePlugins";

/// Value names inside a plugin node.
pub const DISPLAY_ORDER_VALUE: &str = "DisplayOrder";
pub const DESCRIPTION_VALUE: &str = "Description";
pub const PAYLOAD_VALUE: &str = "";
pub const ICON_FILE_VALUE: &str = "IconFile";
pub const REQUIRED_VERSION_VALUE: &str = "RequiredVersion";
pub const EDIT_MODE_VALUE: &str = "EditMode";

/// Failure to decode a plugin payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Unrecognized payload format")]
    Unrecognized,

    #[error("Corrupt payload: {0}")]
    Corrupt(String),
}

/// Reads the minimum host version a pipeline payload needs.
#[cfg_attr(test, mockall::automock)]
pub trait PayloadDecoder: Send + Sync {
    fn required_version(&self, payload: &str) -> Result<Version, DecodeError>;
}

/// Decoder for hosts that cannot interpret payloads; every payload is unrecognized,
/// so only explicitly stored required versions are reported.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaquePayloadDecoder;

impl PayloadDecoder for OpaquePayloadDecoder {
    fn required_version(&self, _payload: &str) -> Result<Version, DecodeError> {
        Err(DecodeError::Unrecognized)
    }
}
