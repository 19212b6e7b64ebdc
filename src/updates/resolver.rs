use crate::config::{Settings, StoreError};
use crate::models::{SoftwareUpdateCollection, SoftwareUpdateInfo, Version};
use crate::updates::fetch::{FetchError, ManifestFetcher};
use crate::updates::manifest::{ManifestError, parse_manifest};
use std::fmt;
use thiserror::Error;

/// Channel value that turns update checks off.
pub const DISABLED_CHANNEL: &str = "NONE";

/// Errors that can occur while checking for updates
#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("Failed to fetch update manifest from {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid update manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("Failed to record ignored update: {0}")]
    Store(#[from] StoreError),
}

/// Steps of a single update check.
///
/// ```text
/// Idle -> ChannelCheck -> Disabled
///                      -> Fetching -> Parsed -> Evaluating -> NoUpdate | UpdateFound
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckPhase {
    Idle,
    ChannelCheck,
    Disabled,
    Fetching,
    Parsed,
    Evaluating,
    NoUpdate,
    UpdateFound,
}

impl fmt::Display for CheckPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Outcome of an update check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateCheck {
    Disabled,
    NoUpdate,
    UpdateFound(SoftwareUpdateInfo),
}

impl UpdateCheck {
    pub fn phase(&self) -> CheckPhase {
        match self {
            UpdateCheck::Disabled => CheckPhase::Disabled,
            UpdateCheck::NoUpdate => CheckPhase::NoUpdate,
            UpdateCheck::UpdateFound(_) => CheckPhase::UpdateFound,
        }
    }
}

/// What the user decided about an offered update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateResponse {
    /// Download or remind later; nothing is recorded.
    Accept,
    Postpone,
    /// Never offer this version (or anything older) again.
    Ignore,
}

/// UI side of an update offer.
#[cfg_attr(test, mockall::automock)]
pub trait UpdatePresenter {
    fn present(&self, update: &SoftwareUpdateInfo) -> UpdateResponse;
}

/// Everything a check needs to know about the running installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateContext {
    pub channel: String,
    pub running_version: Version,
    pub ignored_version: Option<Version>,
    pub os_version: Version,
    /// `None` matches no manifest entry.
    pub install_source: Option<String>,
    pub updates_disabled: bool,
    /// Offer a build equal to the current version (used by pre-release builds to move
    /// onto the release of the same number).
    pub accept_same_version: bool,
}

impl UpdateContext {
    pub fn new(channel: impl Into<String>, running_version: Version, os_version: Version) -> Self {
        Self {
            channel: channel.into(),
            running_version,
            ignored_version: None,
            os_version,
            install_source: None,
            updates_disabled: false,
            accept_same_version: false,
        }
    }

    /// Read channel, install source, ignored version and the disable switch from `settings`.
    pub fn from_settings(settings: &Settings, running_version: Version, os_version: Version) -> Self {
        Self {
            channel: settings.update_channel(),
            running_version,
            ignored_version: settings.ignored_update(),
            os_version,
            install_source: settings.install_source(),
            updates_disabled: settings.disable_software_update(),
            accept_same_version: false,
        }
    }

    pub fn with_install_source(mut self, source: impl Into<String>) -> Self {
        self.install_source = Some(source.into());
        self
    }

    pub fn with_ignored_version(mut self, version: Option<Version>) -> Self {
        self.ignored_version = version;
        self
    }

    pub fn with_same_version_offers(mut self, accept: bool) -> Self {
        self.accept_same_version = accept;
        self
    }

    /// The running version, or the ignored version if that is newer.
    pub fn current_version(&self) -> Version {
        match self.ignored_version {
            Some(ignored) => self.running_version.max(ignored),
            None => self.running_version,
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.updates_disabled || self.channel.trim().eq_ignore_ascii_case(DISABLED_CHANNEL)
    }

    fn is_newer(&self, candidate: Version) -> bool {
        let current = self.current_version();
        if self.accept_same_version {
            candidate >= current
        } else {
            candidate > current
        }
    }
}

/// Decides whether a newer build is available on the configured channel.
pub struct UpdateChannelResolver<F> {
    fetcher: F,
}

impl<F: ManifestFetcher> UpdateChannelResolver<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Run one check. Only fetch and manifest failures are errors.
    pub fn check(&self, context: &UpdateContext) -> Result<UpdateCheck, UpdateError> {
        enter(CheckPhase::Idle);
        enter(CheckPhase::ChannelCheck);
        if context.is_disabled() {
            enter(CheckPhase::Disabled);
            tracing::info!("Update check skipped: updates are disabled");
            return Ok(UpdateCheck::Disabled);
        }

        enter(CheckPhase::Fetching);
        let text = self
            .fetcher
            .fetch(&context.channel)
            .map_err(|source| UpdateError::Fetch {
                url: context.channel.clone(),
                source,
            })?;

        let collection = parse_manifest(&text)?;
        enter(CheckPhase::Parsed);

        let outcome = evaluate(&collection, context);
        enter(outcome.phase());
        match &outcome {
            UpdateCheck::UpdateFound(update) => tracing::info!(
                "Update {} available (current {})",
                update.version,
                context.current_version()
            ),
            _ => tracing::info!("No update newer than {}", context.current_version()),
        }
        Ok(outcome)
    }

    /// Check, and if an update is found hand it to `presenter`. An `Ignore` answer is
    /// persisted through `settings`.
    pub fn check_and_present<P>(
        &self,
        settings: &mut Settings,
        context: &UpdateContext,
        presenter: &P,
    ) -> Result<UpdateCheck, UpdateError>
    where
        P: UpdatePresenter + ?Sized,
    {
        let outcome = self.check(context)?;
        if let UpdateCheck::UpdateFound(update) = &outcome {
            match presenter.present(update) {
                UpdateResponse::Ignore => ignore_update(settings, update)?,
                response => tracing::debug!("Update {} answered with {:?}", update.version, response),
            }
        }
        Ok(outcome)
    }
}

/// Pick the offer for `context` from a parsed manifest.
///
/// Only the first entry usable on this OS and install source is considered; if it is not
/// newer than the current version there is no update, even if a later entry would be.
pub fn evaluate(collection: &SoftwareUpdateCollection, context: &UpdateContext) -> UpdateCheck {
    enter(CheckPhase::Evaluating);
    let Some(source) = context.install_source.as_deref() else {
        tracing::debug!("No install source recorded, no manifest entry applies");
        return UpdateCheck::NoUpdate;
    };

    match collection.first_usable(context.os_version, source) {
        Some(candidate) if context.is_newer(candidate.version) => {
            UpdateCheck::UpdateFound(candidate.clone())
        }
        Some(candidate) => {
            tracing::debug!("First usable entry {} is not newer", candidate.version);
            UpdateCheck::NoUpdate
        }
        None => UpdateCheck::NoUpdate,
    }
}

/// Remember `update` as ignored so it and older builds are no longer offered.
pub fn ignore_update(settings: &mut Settings, update: &SoftwareUpdateInfo) -> Result<(), StoreError> {
    settings.set_ignored_update(update.version)?;
    tracing::info!("Ignoring update {}", update.version);
    Ok(())
}

fn enter(phase: CheckPhase) {
    tracing::trace!(%phase, "Update check phase");
}
