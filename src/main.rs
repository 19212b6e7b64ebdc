//! CopyPath Settings - inspect the effective configuration of an installation.
//!
//! # Overview
//!
//! Opens the settings layers in `CopyPath Data/`, then reports:
//! - Effective values of the common settings (user layer over global layer)
//! - Pipeline plugins in display order, and the ones the user has not seen yet
//! - With `--check-updates`, the result of an update check on the configured channel
//!
//! # Configuration Files
//!
//! Expected in `CopyPath Data/`:
//! - `Global.yaml`: machine-wide settings (optional; absent means a portable install)
//! - `User.yaml`: per-user settings, created when first saved
//!
//! # Flags
//!
//! - `--debug`: debug-level logging
//! - `--check-updates`: query the update channel

use anyhow::Result;
use copypath_settings::config::IdList;
use copypath_settings::logging::{LoggingOptions, init_logging};
use copypath_settings::plugins::OpaquePayloadDecoder;
use copypath_settings::updates::{HttpManifestFetcher, UpdateChannelResolver, UpdateCheck, UpdateContext};
use copypath_settings::{APP_NAME, PluginId, Settings, SettingsPaths, VERSION, Version};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let debug = args.iter().any(|arg| arg == "--debug");
    let check_updates = args.iter().any(|arg| arg == "--check-updates");

    let _guard = init_logging(&LoggingOptions::new("logs").debug(debug).console(true))?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let paths = SettingsPaths::new("CopyPath Data")?;
    let mut settings = paths.open_settings();

    report_settings(&settings);
    report_plugins(&settings);

    if check_updates {
        run_update_check(&settings)?;
    }

    settings.flush()?;
    tracing::info!("Done");
    Ok(())
}

fn report_settings(settings: &Settings) {
    tracing::info!(
        "Portable: {}, editing disabled: {}",
        settings.store().is_portable(),
        settings.editing_disabled()
    );
    tracing::info!(
        "Quotes: {} (optional: {}), FQDN: {}, hidden shares: {}, encode: {:?}",
        settings.add_quotes(),
        settings.are_quotes_optional(),
        settings.use_fqdn(),
        settings.use_hidden_shares(),
        settings.encode_param()
    );
    tracing::info!(
        "Submenu always shown: {}, submenu icon: {}, paths separator: {:?}",
        settings.always_show_submenu(),
        settings.use_icon_for_submenu(),
        settings.paths_separator()
    );
}

fn report_plugins(settings: &Settings) {
    let plugins = settings.pipeline_plugins(&OpaquePayloadDecoder);
    tracing::info!("{} pipeline plugins", plugins.len());
    for plugin in &plugins {
        tracing::info!(
            "  {} {} ({:?})",
            plugin.id(),
            plugin.description(),
            plugin.origin()
        );
    }

    let available: Vec<PluginId> = plugins.iter().map(|plugin| plugin.id()).collect();
    let fresh = settings.new_plugins(&available);
    if !fresh.is_empty() {
        tracing::info!("New since last visit: {}", PluginId::format_list(&fresh));
    }
    if let Some(order) = settings.id_list(IdList::MainMenuDisplayOrder) {
        tracing::debug!("Main menu order has {} entries", order.len());
    }
}

fn run_update_check(settings: &Settings) -> Result<()> {
    let running: Version = VERSION.parse()?;
    let context = UpdateContext::from_settings(settings, running, host_os_version());
    let resolver = UpdateChannelResolver::new(HttpManifestFetcher::new()?);

    match resolver.check(&context)? {
        UpdateCheck::Disabled => tracing::info!("Update checks are disabled"),
        UpdateCheck::NoUpdate => tracing::info!("{} is up to date", APP_NAME),
        UpdateCheck::UpdateFound(update) => {
            tracing::info!("Update available: {} {} at {}", update.name, update.version, update.url);
            for line in &update.release_notes {
                tracing::info!("  - {}", line);
            }
        }
    }
    Ok(())
}

/// Host OS version from `COPYPATH_OS_VERSION`, else zero (only entries without an OS
/// requirement match).
fn host_os_version() -> Version {
    std::env::var("COPYPATH_OS_VERSION")
        .ok()
        .and_then(|text| Version::parse_lenient(&text))
        .unwrap_or_default()
}
