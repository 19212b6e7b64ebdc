//! Update manifest parsing.
//!
//! The manifest is a namespaced XML document:
//!
//! ```xml
//! <SoftwareUpdates xmlns="urn:copypath:updates">
//!   <SoftwareUpdate>
//!     <Version>1.4.0.0</Version>
//!     <RequiredOSVersion>6.1</RequiredOSVersion>
//!     <InstallSources>
//!       <InstallSource>MSI</InstallSource>
//!       <InstallSource>ZIP</InstallSource>
//!     </InstallSources>
//!     <Name>CopyPath 1.4</Name>
//!     <Url>https://example.org/download/1.4</Url>
//!     <ReleaseNotes>
//!       <Line>Faster menu</Line>
//!     </ReleaseNotes>
//!   </SoftwareUpdate>
//! </SoftwareUpdates>
//! ```
//!
//! Elements are matched by local name, so older feeds without the namespace still parse.
//! Entries with an unreadable version are skipped; a document that is not well-formed XML
//! or has the wrong root is an error.

use crate::models::{SoftwareUpdateCollection, SoftwareUpdateInfo, Version};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;
use xot::{Node, Xot};

/// Namespace of current manifests.
pub const MANIFEST_NAMESPACE: &str = "urn:copypath:updates";

const ROOT_ELEMENT: &str = "SoftwareUpdates";
const ENTRY_ELEMENT: &str = "SoftwareUpdate";
const VERSION_ELEMENT: &str = "Version";
const REQUIRED_OS_ELEMENT: &str = "RequiredOSVersion";
const INSTALL_SOURCES_ELEMENT: &str = "InstallSources";
const NAME_ELEMENT: &str = "Name";
const URL_ELEMENT: &str = "Url";
const RELEASE_NOTES_ELEMENT: &str = "ReleaseNotes";

static MANIFEST_PARSER: Lazy<ManifestParser> = Lazy::new(ManifestParser::new);

#[cfg(test)]
static PARSERS_BUILT: std::sync::atomic::AtomicUsize = std::sync::atomic::AtomicUsize::new(0);

/// Errors raised for a manifest that cannot be used at all.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    #[error("Manifest is not well-formed XML: {0}")]
    Xml(String),

    #[error("Unexpected manifest root element {0:?}")]
    UnexpectedRoot(String),
}

/// Process-wide manifest parser, built on first use.
pub fn manifest_parser() -> &'static ManifestParser {
    &MANIFEST_PARSER
}

/// Parse `text` with the shared parser.
pub fn parse_manifest(text: &str) -> Result<SoftwareUpdateCollection, ManifestError> {
    manifest_parser().parse(text)
}

/// Turns manifest documents into [`SoftwareUpdateCollection`]s.
pub struct ManifestParser {
    /// Splits a flat `InstallSources` text ("MSI, ZIP") into tags
    source_separator: Regex,
}

impl ManifestParser {
    fn new() -> Self {
        tracing::debug!("Initializing update manifest parser");
        #[cfg(test)]
        PARSERS_BUILT.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Self {
            source_separator: Regex::new(r"[\s,;]+").expect("Invalid install source regex"),
        }
    }

    pub fn parse(&self, text: &str) -> Result<SoftwareUpdateCollection, ManifestError> {
        let mut xot = Xot::new();
        let document = xot
            .parse(text)
            .map_err(|e| ManifestError::Xml(e.to_string()))?;
        let root = xot
            .document_element(document)
            .map_err(|e| ManifestError::Xml(e.to_string()))?;

        let root_name = local_name(&xot, root).unwrap_or_default();
        if root_name != ROOT_ELEMENT {
            return Err(ManifestError::UnexpectedRoot(root_name.to_string()));
        }

        let updates = child_elements(&xot, root)
            .filter(|node| local_name(&xot, *node) == Some(ENTRY_ELEMENT))
            .filter_map(|entry| self.parse_entry(&xot, entry))
            .collect::<Vec<_>>();

        tracing::debug!("Parsed update manifest with {} entries", updates.len());
        Ok(SoftwareUpdateCollection { updates })
    }

    fn parse_entry(&self, xot: &Xot, entry: Node) -> Option<SoftwareUpdateInfo> {
        let field = |name: &str| -> Option<Node> {
            child_elements(xot, entry).find(|node| local_name(xot, *node) == Some(name))
        };
        let text_of = |name: &str| field(name).map(|node| text(xot, node)).unwrap_or_default();

        let raw_version = text_of(VERSION_ELEMENT);
        let Some(version) = Version::parse_lenient(&raw_version) else {
            tracing::warn!("Skipping manifest entry with invalid version {:?}", raw_version);
            return None;
        };

        let raw_os = text_of(REQUIRED_OS_ELEMENT);
        let required_os_version = if raw_os.trim().is_empty() {
            Version::default()
        } else {
            match Version::parse_lenient(&raw_os) {
                Some(os) => os,
                None => {
                    tracing::warn!(
                        "Skipping manifest entry {} with invalid OS version {:?}",
                        version,
                        raw_os
                    );
                    return None;
                }
            }
        };

        let install_sources = field(INSTALL_SOURCES_ELEMENT)
            .map(|node| self.install_sources(xot, node))
            .unwrap_or_default();

        let release_notes: Vec<String> = field(RELEASE_NOTES_ELEMENT)
            .map(|node| child_elements(xot, node).map(|line| text(xot, line)).collect())
            .unwrap_or_default();

        Some(SoftwareUpdateInfo {
            version,
            required_os_version,
            install_sources,
            name: text_of(NAME_ELEMENT).trim().to_string(),
            url: text_of(URL_ELEMENT).trim().to_string(),
            release_notes,
        })
    }

    fn install_sources(&self, xot: &Xot, node: Node) -> Vec<String> {
        let children: Vec<String> = child_elements(xot, node)
            .map(|child| text(xot, child).trim().to_string())
            .filter(|source| !source.is_empty())
            .collect();
        if !children.is_empty() {
            return children;
        }

        self.source_separator
            .split(&text(xot, node))
            .filter(|source| !source.is_empty())
            .map(str::to_string)
            .collect()
    }
}

fn child_elements<'a>(xot: &'a Xot, node: Node) -> impl Iterator<Item = Node> + 'a {
    xot.children(node).filter(move |child| xot.is_element(*child))
}

fn local_name(xot: &Xot, node: Node) -> Option<&str> {
    xot.element(node).map(|element| xot.local_name_str(element.name()))
}

fn text(xot: &Xot, node: Node) -> String {
    xot.text_content_str(node).unwrap_or_default().to_string()
}
