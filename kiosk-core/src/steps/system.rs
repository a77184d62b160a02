//! Host identity and single-value system settings.

use super::{outcome_of, patch_or_create, write_host_file, StepContext};
use crate::assets;
use crate::layout;
use crate::patcher;
use crate::scoped_writer;
use crate::sequencer::StepOutcome;
use kiosk_error::{KioskError, KioskResult};
use kiosk_hal::SystemHal;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Hostname as currently recorded in `/etc/hostname`, trimmed.
pub fn current_hostname<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<String> {
    let path = ctx.path(layout::HOSTNAME);
    fs::read_to_string(&path)
        .map(|name| name.trim().to_string())
        .map_err(|e| KioskError::io(path, e))
}

const LOOPBACK_PREFIX: &str = "127.0.1.1";

fn desired_hosts_line<H: SystemHal>(ctx: &StepContext<'_, H>, hostname: &str) -> String {
    assets::hosts_line(hostname, ctx.config.host_domain.as_deref())
}

/// Nothing to do when the operator kept the hostname, or when `/etc/hostname` carries it and
/// every `127.0.1.1` line of `/etc/hosts` (at least one) is the desired line.
pub fn hostname_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    let Some(hostname) = ctx.answers.hostname.as_deref() else {
        return Ok(true);
    };
    let probe = ctx.probe();
    let file_ok =
        probe.file_matches(&ctx.path(layout::HOSTNAME), format!("{hostname}\n").as_bytes())?;
    let loopback = probe.lines_with_prefix(&ctx.path(layout::HOSTS), LOOPBACK_PREFIX)?;
    let desired = desired_hosts_line(ctx, hostname);
    let hosts_ok = !loopback.is_empty() && loopback.iter().all(|line| *line == desired);
    Ok(file_ok && hosts_ok)
}

pub fn set_hostname<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let Some(hostname) = ctx.answers.hostname.as_deref() else {
        return Ok(StepOutcome::Unchanged);
    };
    log::info!("Setting hostname to {hostname}");
    let file_changed = write_host_file(&ctx.path(layout::HOSTNAME), &format!("{hostname}\n"))?;
    let hosts = patcher::patch(
        &ctx.path(layout::HOSTS),
        LOOPBACK_PREFIX,
        &desired_hosts_line(ctx, hostname),
    )?;
    Ok(outcome_of(file_changed || hosts.changed()))
}

pub fn set_display_rotation<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let orientation = ctx.answers.orientation;
    log::info!("Setting monitor rotation ({orientation})");
    let outcome = patcher::patch(
        &ctx.path(layout::BOOT_CONFIG),
        "display_rotate=",
        &orientation.boot_config_line(),
    )?;
    Ok(outcome_of(outcome.changed()))
}

pub fn set_gpu_memory<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    log::info!("Setting CPU/GPU memory split");
    let outcome = patcher::patch(
        &ctx.path(layout::BOOT_CONFIG),
        "gpu_mem=",
        &format!("gpu_mem={}", ctx.config.gpu_mem),
    )?;
    Ok(outcome_of(outcome.changed()))
}

/// Enable the locale in `locale.gen`, then regenerate and make it the default `LANG`.
///
/// The tools also run when `/etc/default/locale` does not name the locale yet, which covers a
/// run that died after patching `locale.gen`.
pub fn set_locale<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let locale = ctx.config.locale.as_str();
    let charset = locale.rsplit_once('.').map_or("UTF-8", |(_, cs)| cs);
    let patched = patch_or_create(
        &ctx.path(layout::LOCALE_GEN),
        &format!("{locale} "),
        &format!("{locale} {charset}"),
        0o644,
    )?;

    let lang_set = ctx
        .probe()
        .file_contains(&ctx.path(layout::DEFAULT_LOCALE), &format!("LANG={locale}\n"))?;
    if !patched.changed() && lang_set {
        return Ok(StepOutcome::Unchanged);
    }

    log::info!("Generating locale {locale}");
    ctx.hal.generate_locales()?;
    ctx.hal.update_locale(locale)?;
    Ok(StepOutcome::Applied)
}

fn zoneinfo_target(timezone: &str) -> PathBuf {
    Path::new(assets::ZONEINFO_DIR).join(timezone)
}

fn localtime_target(path: &Path) -> KioskResult<Option<PathBuf>> {
    match fs::read_link(path) {
        Ok(target) => Ok(Some(target)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        // A regular file where a symlink is expected.
        Err(err) if err.kind() == io::ErrorKind::InvalidInput => Ok(None),
        Err(err) => Err(KioskError::probe(path.display().to_string(), err)),
    }
}

pub fn timezone_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    let timezone = ctx.config.timezone.as_str();
    let file_ok = ctx
        .probe()
        .file_matches(&ctx.path(layout::TIMEZONE), format!("{timezone}\n").as_bytes())?;
    let link = localtime_target(&ctx.path(layout::LOCALTIME))?;
    Ok(file_ok && link.as_deref() == Some(zoneinfo_target(timezone).as_path()))
}

/// The configured zone must be installed under the root. Checked before the first step runs.
pub fn ensure_timezone_known<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<PathBuf> {
    let timezone = ctx.config.timezone.as_str();
    let zone = zoneinfo_target(timezone);
    if !ctx.probe().path_exists(&ctx.path(&zone))? {
        return Err(KioskError::ValidationFailed(format!(
            "unknown timezone '{timezone}': {} does not exist",
            zone.display()
        )));
    }
    Ok(zone)
}

pub fn set_timezone<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let timezone = ctx.config.timezone.as_str();
    let zone = ensure_timezone_known(ctx)?;

    log::info!("Setting timezone to {timezone}");
    write_host_file(&ctx.path(layout::TIMEZONE), &format!("{timezone}\n"))?;
    scoped_writer::replace_symlink(&ctx.path(layout::LOCALTIME), &zone)?;
    ctx.hal.reconfigure_timezone()?;
    Ok(StepOutcome::Applied)
}

pub fn set_keyboard<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let path = ctx.path(layout::KEYBOARD);
    let mut changed = false;
    for (prefix, line) in ctx.config.keyboard.lines() {
        changed |= patch_or_create(&path, prefix, &line, 0o644)?.changed();
    }
    if changed {
        log::info!("Keyboard layout updated");
    }
    Ok(outcome_of(changed))
}
