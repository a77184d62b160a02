//! X11 session of the dashboard account: xinit, VNC, window-manager autostart, autologin.

use super::{ensure_owned_path, StepContext};
use crate::assets;
use crate::layout;
use crate::scoped_writer::{self, Owner};
use crate::sequencer::StepOutcome;
use kiosk_error::{KioskError, KioskResult};
use kiosk_hal::SystemHal;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

struct SessionFile {
    path: PathBuf,
    content: String,
    mode: u32,
}

fn session_files<H: SystemHal>(ctx: &StepContext<'_, H>, home: &Path) -> Vec<SessionFile> {
    vec![
        SessionFile {
            path: home.join(".xinitrc"),
            content: assets::XINITRC.to_string(),
            mode: assets::XINITRC_MODE,
        },
        SessionFile {
            path: home.join(".x11vncrc"),
            content: assets::x11vncrc(&ctx.config.vnc_log_path),
            mode: assets::VNCRC_MODE,
        },
        SessionFile {
            path: home.join(".config/openbox/autostart"),
            content: assets::autostart(&ctx.config.browser_command),
            mode: assets::AUTOSTART_MODE,
        },
    ]
}

pub fn session_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    let probe = ctx.probe();
    let Some(account) = probe.lookup_user(&ctx.config.dashboard_username)? else {
        return Ok(false);
    };
    let owner = Some(Owner::from(&account));
    for file in session_files(ctx, &ctx.home_of(&account)) {
        if !probe.artifact_matches(&file.path, file.content.as_bytes(), file.mode, owner)? {
            return Ok(false);
        }
    }
    probe.mode_matches(&ctx.path(&ctx.config.vnc_log_path), assets::VNC_LOG_MODE)
}

/// Create the VNC log world-writable. Existing log content is never touched.
fn ensure_vnc_log(path: &Path) -> KioskResult<()> {
    match fs::metadata(path) {
        Ok(_) => scoped_writer::set_mode(path, assets::VNC_LOG_MODE),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = path.parent() {
                scoped_writer::ensure_directory(parent, 0o755)?;
            }
            scoped_writer::create_with_ownership(path, assets::VNC_LOG_MODE, None, b"")
        }
        Err(err) => Err(KioskError::io(path, err)),
    }
}

pub fn write_session<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    log::info!("Configuring X11 session for {}", ctx.config.dashboard_username);
    let account = ctx.require_account(&ctx.config.dashboard_username)?;
    let owner = Owner::from(&account);
    let home = ctx.home_of(&account);
    scoped_writer::ensure_owned_directory(&home, 0o755, owner)?;
    ensure_owned_path(
        &home,
        Path::new(".config/openbox"),
        assets::CONFIG_DIR_MODE,
        owner,
    )?;

    let probe = ctx.probe();
    for file in session_files(ctx, &home) {
        if probe.artifact_matches(&file.path, file.content.as_bytes(), file.mode, Some(owner))? {
            continue;
        }
        log::info!("Writing {}", file.path.display());
        scoped_writer::create_with_ownership(
            &file.path,
            file.mode,
            Some(owner),
            file.content.as_bytes(),
        )?;
    }

    log::info!("Configuring VNC log {}", ctx.config.vnc_log_path);
    ensure_vnc_log(&ctx.path(&ctx.config.vnc_log_path))?;
    Ok(StepOutcome::Applied)
}

pub fn autologin_present<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<bool> {
    ctx.probe()
        .file_contains(&ctx.path(layout::RC_LOCAL), assets::AUTOLOGIN_MARKER)
}

pub fn enable_autologin<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    log::info!("Configuring autologin");
    let path = ctx.path(layout::RC_LOCAL);
    let user = &ctx.config.dashboard_username;
    match fs::read_to_string(&path) {
        Ok(current) => {
            let updated = assets::insert_autologin(&current, user);
            scoped_writer::rewrite_preserving(&path, updated.as_bytes())?;
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let script = assets::insert_autologin(assets::RC_LOCAL_STUB, user);
            scoped_writer::create_with_ownership(
                &path,
                assets::RC_LOCAL_MODE,
                None,
                script.as_bytes(),
            )?;
        }
        Err(err) => return Err(KioskError::io(path, err)),
    }
    Ok(StepOutcome::Applied)
}
