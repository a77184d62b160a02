//! Admin, dashboard and default accounts, plus SSH access.

use super::{ensure_owned_path, outcome_of, StepContext};
use crate::assets;
use crate::layout;
use crate::patcher;
use crate::scoped_writer::{self, Owner};
use crate::sequencer::StepOutcome;
use kiosk_error::{KioskError, KioskResult};
use kiosk_hal::{SystemAccount, SystemHal};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const HOME_MODE: u32 = 0o755;

/// Make sure the account's home exists. `adduser` normally creates it; an existing home is
/// only re-owned.
fn ensure_home<H: SystemHal>(
    ctx: &StepContext<'_, H>,
    account: &SystemAccount,
) -> KioskResult<PathBuf> {
    let home = ctx.home_of(account);
    scoped_writer::ensure_owned_directory(&home, HOME_MODE, Owner::from(account))?;
    Ok(home)
}

fn authorized_keys_path<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<Option<PathBuf>> {
    Ok(ctx
        .probe()
        .lookup_user(&ctx.config.admin_username)?
        .map(|account| ctx.home_of(&account).join(".ssh/authorized_keys")))
}

pub fn admin_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    let probe = ctx.probe();
    let admin = &ctx.config.admin_username;
    if !probe.user_exists(admin)? {
        return Ok(false);
    }
    if probe.user_in_group(admin, &ctx.config.privileged_group)? {
        Ok(true)
    } else {
        log::warn!("{admin} exists but is not in {}", ctx.config.privileged_group);
        Ok(false)
    }
}

pub fn ensure_admin<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let admin = &ctx.config.admin_username;
    let group = &ctx.config.privileged_group;
    let probe = ctx.probe();

    if probe.user_exists(admin)? {
        log::warn!("{admin} already exists, leaving the account alone");
    } else {
        log::info!("Creating admin user {admin}");
        ctx.hal.create_user(admin)?;
    }
    ensure_home(ctx, &ctx.require_account(admin)?)?;

    if !probe.user_in_group(admin, group)? {
        log::info!("Adding {admin} to {group}");
        ctx.hal.add_to_group(admin, group)?;
    }
    Ok(StepOutcome::Applied)
}

pub fn admin_key_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    match authorized_keys_path(ctx)? {
        Some(path) => ctx
            .probe()
            .file_contains(&path, ctx.config.ssh_public_key.trim()),
        None => Ok(false),
    }
}

fn read_existing(path: &Path) -> KioskResult<String> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(err) => Err(KioskError::io(path, err)),
    }
}

/// Append the configured key to the admin's `authorized_keys`, keeping any keys already there.
pub fn install_admin_key<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    log::info!("Creating admin user SSH authorization");
    let account = ctx.require_account(&ctx.config.admin_username)?;
    let owner = Owner::from(&account);
    let home = ensure_home(ctx, &account)?;
    let ssh_dir = ensure_owned_path(&home, Path::new(".ssh"), assets::SSH_DIR_MODE, owner)?;

    let path = ssh_dir.join("authorized_keys");
    let mut keys = read_existing(&path)?;
    if !keys.is_empty() && !keys.ends_with('\n') {
        keys.push('\n');
    }
    keys.push_str(ctx.config.ssh_public_key.trim());
    keys.push('\n');

    scoped_writer::create_with_ownership(
        &path,
        assets::AUTHORIZED_KEYS_MODE,
        Some(owner),
        keys.as_bytes(),
    )?;
    Ok(StepOutcome::Applied)
}

pub fn harden_ssh<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let outcome = patcher::patch(
        &ctx.path(layout::SSHD_CONFIG),
        "PermitRootLogin",
        "PermitRootLogin no",
    )?;
    Ok(outcome_of(outcome.changed()))
}

pub fn dashboard_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    ctx.probe().user_exists(&ctx.config.dashboard_username)
}

pub fn ensure_dashboard<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let name = &ctx.config.dashboard_username;
    log::info!("Creating dashboard user {name}");
    ctx.hal.create_user(name)?;
    ensure_home(ctx, &ctx.require_account(name)?)?;
    Ok(StepOutcome::Applied)
}

/// The guard is inverted: the desired state is "no usable default account".
pub fn default_account_absent<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    Ok(!ctx.probe().user_exists(&ctx.config.default_account)?)
}

pub fn disable_default_account<H: SystemHal>(
    ctx: &StepContext<'_, H>,
) -> KioskResult<StepOutcome> {
    let name = &ctx.config.default_account;
    log::info!("Disabling default account {name}");
    ctx.hal.lock_user(name)?;
    Ok(StepOutcome::Applied)
}
