use crate::models::Version;

/// One entry of an update manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftwareUpdateInfo {
    pub version: Version,
    pub required_os_version: Version,
    pub install_sources: Vec<String>,
    pub name: String,
    pub url: String,
    pub release_notes: Vec<String>,
}

impl SoftwareUpdateInfo {
    /// Whether this build can be installed on `os_version` by an installation
    /// that came from `install_source`.
    pub fn is_usable(&self, os_version: Version, install_source: &str) -> bool {
        self.required_os_version <= os_version
            && self
                .install_sources
                .iter()
                .any(|source| source.eq_ignore_ascii_case(install_source))
    }
}

/// Manifest entries in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SoftwareUpdateCollection {
    pub updates: Vec<SoftwareUpdateInfo>,
}

impl SoftwareUpdateCollection {
    /// First usable entry in document order; later entries are never considered.
    pub fn first_usable(&self, os_version: Version, install_source: &str) -> Option<&SoftwareUpdateInfo> {
        self.updates
            .iter()
            .find(|update| update.is_usable(os_version, install_source))
    }

    pub fn len(&self) -> usize {
        self.updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.updates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(version: &str, os: &str, sources: &[&str]) -> SoftwareUpdateInfo {
        SoftwareUpdateInfo {
            version: version.parse().unwrap(),
            required_os_version: os.parse().unwrap(),
            install_sources: sources.iter().map(|s| s.to_string()).collect(),
            name: format!("CopyPath {version}"),
            url: "https://example.invalid/download".to_string(),
            release_notes: Vec::new(),
        }
    }

    #[test]
    fn test_first_usable_is_first_match_not_best_match() {
        let collection = SoftwareUpdateCollection {
            updates: vec![
                entry("2.0.0.0", "10.0", &["MSI"]),
                entry("1.5.0.0", "6.1", &["MSI", "ZIP"]),
                entry("1.9.0.0", "6.1", &["MSI"]),
            ],
        };

        let found = collection
            .first_usable("6.1".parse().unwrap(), "msi")
            .unwrap();
        assert_eq!(found.version, Version::new(1, 5, 0, 0));
    }

    #[test]
    fn test_unmatched_install_source() {
        let update = entry("1.0", "6.0", &["MSI"]);
        assert!(!update.is_usable("10.0".parse().unwrap(), "ZIP"));
    }
}
