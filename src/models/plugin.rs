use crate::collections::Keyed;
use crate::models::Version;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Separator between ids in a persisted id list.
pub const ID_LIST_SEPARATOR: &str = ",";

/// Unique identifier of a plugin.
///
/// Persisted in canonical braced form, e.g. `{5F5D3F1B-0E3A-4C8D-9A3B-6A2E1C0D7B11}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PluginId(Uuid);

impl PluginId {
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Fresh random id for a newly defined pipeline plugin.
    pub fn new_random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Parse an id in braced, hyphenated or simple form. Returns `None` if malformed.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text.trim()).ok().map(Self)
    }

    /// Parse a delimited id list, silently dropping malformed entries.
    ///
    /// An empty string is an explicit empty list.
    pub fn parse_list(text: &str) -> Vec<Self> {
        text.split(ID_LIST_SEPARATOR)
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .filter_map(|part| {
                let id = Self::parse(part);
                if id.is_none() {
                    tracing::debug!("Skipping malformed plugin id in list: {}", part);
                }
                id
            })
            .collect()
    }

    /// Serialize ids into the delimited form read by [`PluginId::parse_list`].
    pub fn format_list<'a, I>(ids: I) -> String
    where
        I: IntoIterator<Item = &'a PluginId>,
    {
        ids.into_iter()
            .map(PluginId::to_string)
            .collect::<Vec<_>>()
            .join(ID_LIST_SEPARATOR)
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.braced().to_string().to_uppercase())
    }
}

impl FromStr for PluginId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Layer a plugin record was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PluginOrigin {
    /// Shipped in the machine-wide layer, read-only here.
    Global,
    /// Defined by the current user.
    User,
}

/// Editor surface last used to edit a pipeline plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditMode {
    Simple,
    Expert,
}

impl EditMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EditMode::Simple => "Simple",
            EditMode::Expert => "Expert",
        }
    }

    /// Symbolic names are matched case-insensitively; anything else is `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("Simple") {
            Some(EditMode::Simple)
        } else if name.eq_ignore_ascii_case("Expert") {
            Some(EditMode::Expert)
        } else {
            None
        }
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one pipeline plugin.
///
/// Records are immutable; edits go through [`PluginRecord::update`] or the `with_*`
/// helpers, which return a new record. The origin never changes.
///
/// A required version either comes from storage or an explicit edit, or is derived from
/// the payload at load time. Only the former is written back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginRecord {
    id: PluginId,
    description: String,
    payload: String,
    icon_file: Option<String>,
    required_version: Option<Version>,
    required_version_derived: bool,
    edit_mode: Option<EditMode>,
    origin: PluginOrigin,
}

/// Field changes applied by [`PluginRecord::update`]. `None` leaves a field as is;
/// `Some(None)` on an optional field clears it.
#[derive(Debug, Clone, Default)]
pub struct PluginChanges {
    pub description: Option<String>,
    pub payload: Option<String>,
    pub icon_file: Option<Option<String>>,
    pub required_version: Option<Option<Version>>,
    pub edit_mode: Option<Option<EditMode>>,
}

impl PluginRecord {
    pub fn new(
        id: PluginId,
        description: impl Into<String>,
        payload: impl Into<String>,
        origin: PluginOrigin,
    ) -> Self {
        Self {
            id,
            description: description.into(),
            payload: payload.into(),
            icon_file: None,
            required_version: None,
            required_version_derived: false,
            edit_mode: None,
            origin,
        }
    }

    /// New user-defined plugin with a random id.
    pub fn new_user(description: impl Into<String>, payload: impl Into<String>) -> Self {
        Self::new(
            PluginId::new_random(),
            description,
            payload,
            PluginOrigin::User,
        )
    }

    pub fn id(&self) -> PluginId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn icon_file(&self) -> Option<&str> {
        self.icon_file.as_deref()
    }

    pub fn required_version(&self) -> Option<Version> {
        self.required_version
    }

    /// Required version to persist: `None` when the version was derived from the payload.
    pub fn stored_required_version(&self) -> Option<Version> {
        self.required_version.filter(|_| !self.required_version_derived)
    }

    pub fn is_required_version_derived(&self) -> bool {
        self.required_version_derived
    }

    pub fn edit_mode(&self) -> Option<EditMode> {
        self.edit_mode
    }

    pub fn origin(&self) -> PluginOrigin {
        self.origin
    }

    pub fn is_global(&self) -> bool {
        self.origin == PluginOrigin::Global
    }

    /// Apply `changes`, returning the edited snapshot.
    pub fn update(&self, changes: PluginChanges) -> Self {
        let mut next = self.clone();
        if let Some(description) = changes.description {
            next.description = description;
        }
        if let Some(payload) = changes.payload {
            if next.required_version_derived && payload != next.payload {
                next.required_version = None;
                next.required_version_derived = false;
            }
            next.payload = payload;
        }
        if let Some(icon_file) = changes.icon_file {
            next.icon_file = icon_file.filter(|path| !path.is_empty());
        }
        if let Some(required_version) = changes.required_version {
            next.required_version = required_version;
            next.required_version_derived = false;
        }
        if let Some(edit_mode) = changes.edit_mode {
            next.edit_mode = edit_mode;
        }
        next
    }

    pub fn with_description(&self, description: impl Into<String>) -> Self {
        self.update(PluginChanges {
            description: Some(description.into()),
            ..Default::default()
        })
    }

    pub fn with_payload(&self, payload: impl Into<String>) -> Self {
        self.update(PluginChanges {
            payload: Some(payload.into()),
            ..Default::default()
        })
    }

    pub fn with_icon_file(&self, icon_file: Option<String>) -> Self {
        self.update(PluginChanges {
            icon_file: Some(icon_file),
            ..Default::default()
        })
    }

    pub fn with_required_version(&self, required_version: Option<Version>) -> Self {
        self.update(PluginChanges {
            required_version: Some(required_version),
            ..Default::default()
        })
    }

    /// Attach a version derived from the payload; it is dropped again if the payload changes.
    pub fn with_derived_required_version(&self, required_version: Option<Version>) -> Self {
        Self {
            required_version,
            required_version_derived: required_version.is_some(),
            ..self.clone()
        }
    }

    pub fn with_edit_mode(&self, edit_mode: Option<EditMode>) -> Self {
        self.update(PluginChanges {
            edit_mode: Some(edit_mode),
            ..Default::default()
        })
    }
}

impl Keyed for PluginRecord {
    type Key = PluginId;

    fn key(&self) -> PluginId {
        self.id
    }
}

impl Keyed for PluginId {
    type Key = PluginId;

    fn key(&self) -> PluginId {
        *self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "{5F5D3F1B-0E3A-4C8D-9A3B-6A2E1C0D7B11}";

    #[test]
    fn test_plugin_id_round_trips_braced_uppercase() {
        let id = PluginId::parse(&SAMPLE.to_lowercase()).unwrap();
        assert_eq!(id.to_string(), SAMPLE);
    }

    #[test]
    fn test_parse_list_skips_malformed_entries() {
        let text = format!("{SAMPLE}, not-a-guid ,,{{00000000-0000-0000-0000-000000000001}}");
        let ids = PluginId::parse_list(&text);

        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0].to_string(), SAMPLE);
    }

    #[test]
    fn test_empty_list_is_explicitly_empty() {
        assert!(PluginId::parse_list("").is_empty());
        assert_eq!(PluginId::format_list(&[]), "");
    }

    #[test]
    fn test_edit_mode_names() {
        assert_eq!(EditMode::from_name("expert"), Some(EditMode::Expert));
        assert_eq!(EditMode::from_name(" Simple "), Some(EditMode::Simple));
        assert_eq!(EditMode::from_name("Wizard"), None);
        assert_eq!(EditMode::Expert.to_string(), "Expert");
    }

    #[test]
    fn test_update_returns_new_snapshot() {
        let original = PluginRecord::new_user("Unix path", "payload-v1");
        let edited = original
            .with_description("Unix path (quoted)")
            .with_icon_file(Some("C:\\icons\\unix.ico".to_string()));

        assert_eq!(original.description(), "Unix path");
        assert_eq!(original.icon_file(), None);
        assert_eq!(edited.description(), "Unix path (quoted)");
        assert_eq!(edited.icon_file(), Some("C:\\icons\\unix.ico"));
        assert_eq!(edited.id(), original.id());
        assert_eq!(edited.origin(), PluginOrigin::User);
    }

    #[test]
    fn test_empty_icon_path_clears_icon() {
        let record = PluginRecord::new_user("a", "b").with_icon_file(Some("x.ico".into()));
        let cleared = record.with_icon_file(Some(String::new()));
        assert_eq!(cleared.icon_file(), None);
    }

    #[test]
    fn test_derived_version_is_not_stored_and_follows_payload() {
        let v18 = Version::new(18, 0, 0, 0);
        let derived = PluginRecord::new_user("a", "v2:abc").with_derived_required_version(Some(v18));

        assert_eq!(derived.required_version(), Some(v18));
        assert_eq!(derived.stored_required_version(), None);
        assert_eq!(derived.with_description("b").required_version(), Some(v18));
        assert_eq!(derived.with_payload("v3:xyz").required_version(), None);

        let explicit = derived.with_required_version(Some(v18));
        assert!(!explicit.is_required_version_derived());
        assert_eq!(explicit.stored_required_version(), Some(v18));
        assert_eq!(explicit.with_payload("v3:xyz").required_version(), Some(v18));
    }
}
