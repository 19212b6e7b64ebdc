//! Software update checks.
//!
//! An installation learns about new builds from an XML manifest published on its update
//! channel (a URL read from the machine-wide layer). The channel `NONE` or the
//! `DisableSoftwareUpdate` switch turns checks off without any network access.
//!
//! The first manifest entry usable on this OS and install source is the only candidate.
//! It is offered when it is newer than both the running version and the version the
//! user last chose to ignore.

pub mod fetch;
pub mod manifest;
pub mod resolver;

pub use fetch::{FETCH_TIMEOUT, FetchError, HttpManifestFetcher, ManifestFetcher};
pub use manifest::{MANIFEST_NAMESPACE, ManifestError, ManifestParser, manifest_parser, parse_manifest};
pub use resolver::{
    CheckPhase, DISABLED_CHANNEL, UpdateChannelResolver, UpdateCheck, UpdateContext, UpdateError,
    UpdatePresenter, UpdateResponse, evaluate, ignore_update,
};
