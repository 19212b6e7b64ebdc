//! Two-tier settings resolution.
//!
//! [`LayeredConfigStore`] reads a setting from each layer in its precedence list and
//! returns the first hit. The default precedence is user, then global; writes and deletes
//! only ever touch the user layer.

use crate::config::layer::{LayerSource, MemoryLayer, WritableLayer};
use crate::models::SettingValue;
use camino::Utf8PathBuf;
use thiserror::Error;
use tokio::sync::broadcast;

/// Root node of a layer, where scalar settings live.
pub const ROOT_NODE: &str = "";

/// Errors raised while writing to a configuration layer.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize settings layer: {0}")]
    Serialize(#[from] serde_yaml_ng::Error),
}

/// The two configuration scopes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerScope {
    /// Machine-wide, administrator-controlled, read-only.
    Global,
    /// Per-user, read-write.
    User,
}

/// What happened to a setting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Set(SettingValue),
    Deleted,
}

/// Event broadcast after a successful write or delete in the user layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    pub node: String,
    pub name: String,
    pub kind: ChangeKind,
}

/// Resolves settings across a writable user layer and an optional read-only global layer.
///
/// # Precedence
///
/// Lookups consult the scopes listed in [`precedence`](Self::precedence) in order. The
/// default is `[User, Global]`: a user value overrides the machine-wide one, and deleting
/// the user value makes the global value (or the caller's default) visible again.
///
/// # Lifecycle
///
/// Layers are opened by the caller and handed over at construction. Pending user-layer
/// changes are flushed by [`flush`](Self::flush) and, best effort, when the store drops.
pub struct LayeredConfigStore {
    user: Box<dyn WritableLayer>,
    global: Option<Box<dyn LayerSource>>,
    precedence: Vec<LayerScope>,
    change_tx: broadcast::Sender<SettingChange>,
}

impl LayeredConfigStore {
    /// Create a store over `user` and, unless running portable, `global`.
    pub fn new(user: Box<dyn WritableLayer>, global: Option<Box<dyn LayerSource>>) -> Self {
        let (change_tx, _) = broadcast::channel(100);
        Self {
            user,
            global,
            precedence: vec![LayerScope::User, LayerScope::Global],
            change_tx,
        }
    }

    /// Store backed by empty in-memory layers.
    pub fn in_memory(global: Option<MemoryLayer>) -> Self {
        Self::new(
            Box::new(MemoryLayer::new()),
            global.map(|layer| Box::new(layer) as Box<dyn LayerSource>),
        )
    }

    /// Replace the lookup order. Scopes missing from `order` are never consulted.
    pub fn with_precedence(mut self, order: Vec<LayerScope>) -> Self {
        self.precedence = order;
        self
    }

    pub fn precedence(&self) -> &[LayerScope] {
        &self.precedence
    }

    /// True when there is no machine-wide layer.
    pub fn is_portable(&self) -> bool {
        self.global.is_none()
    }

    pub fn user_layer(&self) -> &dyn WritableLayer {
        self.user.as_ref()
    }

    pub fn user_layer_mut(&mut self) -> &mut dyn WritableLayer {
        self.user.as_mut()
    }

    pub fn global_layer(&self) -> Option<&dyn LayerSource> {
        self.global.as_deref()
    }

    /// Value of `name` at the layer root, following the precedence list.
    pub fn get_value(&self, name: &str) -> Option<SettingValue> {
        self.resolve(ROOT_NODE, name).map(|(_, value)| value)
    }

    /// Like [`get_value`](Self::get_value), substituting `default` when unset.
    pub fn get_value_or(&self, name: &str, default: impl Into<SettingValue>) -> SettingValue {
        self.get_value(name).unwrap_or_else(|| default.into())
    }

    /// Value of `name` under `node`, together with the scope it came from.
    pub fn resolve(&self, node: &str, name: &str) -> Option<(LayerScope, SettingValue)> {
        self.precedence
            .iter()
            .find_map(|scope| self.read_from(*scope, node, name).map(|v| (*scope, v)))
    }

    /// Read from one scope only, ignoring precedence.
    pub fn read_from(&self, scope: LayerScope, node: &str, name: &str) -> Option<SettingValue> {
        match scope {
            LayerScope::User => self.user.read(node, name),
            LayerScope::Global => self.global.as_ref()?.read(node, name),
        }
    }

    /// Write `name` to the user layer.
    pub fn set_value(
        &mut self,
        name: &str,
        value: impl Into<SettingValue>,
    ) -> Result<(), StoreError> {
        self.set_node_value(ROOT_NODE, name, value.into())
    }

    /// Write `name` under `node` in the user layer.
    pub fn set_node_value(
        &mut self,
        node: &str,
        name: &str,
        value: SettingValue,
    ) -> Result<(), StoreError> {
        self.user.write(node, name, value.clone())?;
        tracing::debug!("Setting {} updated in user layer", name);
        self.notify(node, name, ChangeKind::Set(value));
        Ok(())
    }

    /// Remove `name` from the user layer. Returns whether a user value existed.
    pub fn delete_value(&mut self, name: &str) -> Result<bool, StoreError> {
        self.delete_node_value(ROOT_NODE, name)
    }

    pub fn delete_node_value(&mut self, node: &str, name: &str) -> Result<bool, StoreError> {
        let existed = self.user.delete_value(node, name)?;
        if existed {
            tracing::debug!("Setting {} removed from user layer", name);
            self.notify(node, name, ChangeKind::Deleted);
        }
        Ok(existed)
    }

    /// Listen for user-layer changes made through this store.
    pub fn subscribe(&self) -> broadcast::Receiver<SettingChange> {
        self.change_tx.subscribe()
    }

    /// Persist pending user-layer changes.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        self.user.flush()
    }

    fn notify(&self, node: &str, name: &str, kind: ChangeKind) {
        // Nobody listening is fine
        let _ = self.change_tx.send(SettingChange {
            node: node.to_string(),
            name: name.to_string(),
            kind,
        });
    }
}

impl Drop for LayeredConfigStore {
    fn drop(&mut self) {
        if let Err(e) = self.user.flush() {
            tracing::error!("Failed to save user settings on close: {}", e);
        }
    }
}

impl std::fmt::Debug for LayeredConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayeredConfigStore")
            .field("user", &self.user)
            .field("global", &self.global)
            .field("precedence", &self.precedence)
            .finish()
    }
}
