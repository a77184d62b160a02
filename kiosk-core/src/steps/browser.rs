//! Browser profile and the dashboard extension's settings store.

use super::{ensure_owned_path, system, StepContext};
use crate::assets;
use crate::scoped_writer::{self, Owner};
use crate::sequencer::StepOutcome;
use kiosk_error::{KioskError, KioskResult};
use kiosk_hal::SystemHal;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const INSTALLATION_NAME_KEY: &str = "installationName";
pub const SERVER_ADDRESS_KEY: &str = "serverAddress";

const STAGING_DIR: &str = ".kiosk-profile-staging";

/// Scratch directory the archive is unpacked into; removed however the step ends.
struct StagingDir {
    path: PathBuf,
}

impl StagingDir {
    fn create(path: PathBuf) -> KioskResult<Self> {
        match fs::remove_dir_all(&path) {
            Ok(()) => log::warn!("removed stale staging directory {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(KioskError::io(&path, err)),
        }
        scoped_writer::ensure_directory(&path, 0o700)?;
        Ok(Self { path })
    }
}

impl Drop for StagingDir {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_dir_all(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!("failed to remove {}: {}", self.path.display(), err);
            }
        }
    }
}

fn config_dir<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<Option<PathBuf>> {
    Ok(ctx
        .probe()
        .lookup_user(&ctx.config.dashboard_username)?
        .map(|account| ctx.home_of(&account).join(".config")))
}

pub fn profile_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    match config_dir(ctx)? {
        Some(dir) => ctx
            .probe()
            .path_exists(&dir.join(&ctx.config.browser_profile_dir)),
        None => Ok(false),
    }
}

/// Download the profile archive, hand it to the dashboard account and move it into place.
///
/// The archive is unpacked next to its destination first, so a failed download or a bad
/// archive leaves no half-installed profile behind.
pub fn install_profile<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let account = ctx.require_account(&ctx.config.dashboard_username)?;
    let owner = Owner::from(&account);
    let config = ensure_owned_path(
        &ctx.home_of(&account),
        Path::new(".config"),
        assets::CONFIG_DIR_MODE,
        owner,
    )?;

    let staging = StagingDir::create(config.join(STAGING_DIR))?;
    log::info!("Downloading profile from {}", ctx.config.browser_profile_url);
    ctx.hal
        .fetch_and_extract(&ctx.config.browser_profile_url, &staging.path)?;

    let extracted = staging.path.join(&ctx.config.browser_profile_dir);
    if !extracted.is_dir() {
        return Err(KioskError::conflict(
            &extracted,
            format!(
                "profile archive has no top-level '{}' directory",
                ctx.config.browser_profile_dir
            ),
        ));
    }

    let entries = scoped_writer::chown_tree(&extracted, owner)?;
    log::debug!("handed {entries} profile entries to {}", account.name);

    let target = config.join(&ctx.config.browser_profile_dir);
    fs::rename(&extracted, &target).map_err(|e| KioskError::io(&target, e))?;
    log::info!("Installed browser profile at {}", target.display());
    Ok(StepOutcome::Applied)
}

type Setting = (&'static str, String);

fn desired_settings<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<[Setting; 2]> {
    Ok([
        (INSTALLATION_NAME_KEY, system::current_hostname(ctx)?),
        (SERVER_ADDRESS_KEY, ctx.config.extension_server_address.clone()),
    ])
}

fn extension_store<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<Option<PathBuf>> {
    Ok(config_dir(ctx)?.map(|dir| dir.join(ctx.config.extension_store_relative())))
}

pub fn settings_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    let Some(store) = extension_store(ctx)? else {
        return Ok(false);
    };
    for (key, value) in desired_settings(ctx)? {
        if ctx.hal.get_entry(&store, key)?.as_deref() != Some(value.as_str()) {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Point the extension at this installation's name and the dashboard server.
pub fn seed_settings<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    log::info!("Configuring dashboard browser extension");
    let account = ctx.require_account(&ctx.config.dashboard_username)?;
    let owner = Owner::from(&account);
    let home = ctx.home_of(&account);
    let relative = PathBuf::from(".config").join(ctx.config.extension_store_relative());
    let store = home.join(&relative);
    if let Some(parent) = relative.parent() {
        ensure_owned_path(&home, parent, assets::CONFIG_DIR_MODE, owner)?;
    }

    for (key, value) in desired_settings(ctx)? {
        ctx.hal.set_entry(&store, key, &value)?;
    }

    // The store is created by root on first write.
    if ctx.probe().path_exists(&store)? {
        scoped_writer::set_owner(&store, owner)?;
    }
    Ok(StepOutcome::Applied)
}
