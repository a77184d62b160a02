//! Linux HAL implementation using the real account database, apt and network.

use super::account_ops::{AccountOps, SystemAccount};
use super::archive_ops::ArchiveOps;
use super::package_ops::{
    autoremove_command_spec, install_command_spec, refresh_command_spec, remove_command_spec,
    upgrade_command_spec, CommandSpec, PackageOps,
};
use super::settings_ops::{sqlite_get_entry, sqlite_set_entry, SettingsStoreOps};
use super::system_ops::SystemOps;
use crate::{HalError, HalResult};
use nix::unistd::{Group, User};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use wait_timeout::ChildExt;

/// Real HAL implementation for Debian-family Linux hosts.
#[derive(Debug, Clone, Default)]
pub struct LinuxHal;

impl LinuxHal {
    pub fn new() -> Self {
        Self
    }
}

const ACCOUNT_TIMEOUT: Duration = Duration::from_secs(60);
const APT_TIMEOUT: Duration = Duration::from_secs(60 * 60);
const LOCALE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const TZDATA_TIMEOUT: Duration = Duration::from_secs(2 * 60);
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(5 * 60);

const DOWNLOAD_FILE_NAME: &str = ".kiosk-download.tar.gz";

fn map_command_err(program: &str, err: std::io::Error) -> HalError {
    match err.kind() {
        std::io::ErrorKind::NotFound => HalError::CommandNotFound(program.to_string()),
        std::io::ErrorKind::PermissionDenied => HalError::PermissionDenied,
        _ => HalError::Io(err),
    }
}

fn output_failed(program: &str, output: &Output) -> HalError {
    HalError::CommandFailed {
        program: program.to_string(),
        code: output.status.code(),
        stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
    }
}

fn output_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<Output> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = cmd.spawn().map_err(|e| map_command_err(program, e))?;

    let mut stdout = child.stdout.take();
    let mut stderr = child.stderr.take();

    // Drain pipes concurrently; apt output easily fills a pipe buffer.
    let stdout_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout.take() {
            let _ = out.read_to_end(&mut buf);
        }
        buf
    });
    let stderr_handle = std::thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr.take() {
            let _ = err.read_to_end(&mut buf);
        }
        buf
    });

    let status = match child.wait_timeout(timeout).map_err(HalError::Io)? {
        Some(status) => status,
        None => {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.join();
            let _ = stderr_handle.join();
            return Err(HalError::CommandTimeout {
                program: program.to_string(),
                timeout_secs: timeout.as_secs(),
            });
        }
    };

    let stdout = stdout_handle.join().unwrap_or_default();
    let stderr = stderr_handle.join().unwrap_or_default();
    Ok(Output {
        status,
        stdout,
        stderr,
    })
}

fn status_with_timeout(program: &str, cmd: &mut Command, timeout: Duration) -> HalResult<()> {
    let output = output_with_timeout(program, cmd, timeout)?;
    if !output.status.success() {
        return Err(output_failed(program, &output));
    }
    Ok(())
}

/// Run a command attached to the operator's terminal (it may prompt), without a timeout.
fn interactive_status(program: &str, cmd: &mut Command) -> HalResult<()> {
    let status = cmd
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .map_err(|e| map_command_err(program, e))?;
    if !status.success() {
        return Err(HalError::CommandFailed {
            program: program.to_string(),
            code: status.code(),
            stderr: String::new(),
        });
    }
    Ok(())
}

fn run_apt(spec: &CommandSpec) -> HalResult<()> {
    log::info!("{} {}", spec.program, spec.args.join(" "));
    let mut cmd = Command::new(&spec.program);
    cmd.args(&spec.args).env("DEBIAN_FRONTEND", "noninteractive");
    status_with_timeout(&spec.program, &mut cmd, APT_TIMEOUT)
}

impl AccountOps for LinuxHal {
    fn lookup_user(&self, name: &str) -> HalResult<Option<SystemAccount>> {
        let user = User::from_name(name).map_err(|errno| HalError::AccountLookup {
            name: name.to_string(),
            reason: errno.desc().to_string(),
        })?;
        Ok(user.map(|u| SystemAccount {
            name: u.name,
            uid: u.uid.as_raw(),
            gid: u.gid.as_raw(),
            home: u.dir,
        }))
    }

    fn create_user(&self, name: &str) -> HalResult<()> {
        // adduser asks the operator for the initial password.
        let mut cmd = Command::new("adduser");
        cmd.args(["--quiet", name]);
        interactive_status("adduser", &mut cmd)
    }

    fn add_to_group(&self, user: &str, group: &str) -> HalResult<()> {
        let mut cmd = Command::new("usermod");
        cmd.args(["-a", "-G", group, user]);
        status_with_timeout("usermod", &mut cmd, ACCOUNT_TIMEOUT)
    }

    fn user_in_group(&self, user: &str, group: &str) -> HalResult<bool> {
        let group = Group::from_name(group).map_err(|errno| HalError::AccountLookup {
            name: group.to_string(),
            reason: errno.desc().to_string(),
        })?;
        Ok(group.is_some_and(|g| g.mem.iter().any(|m| m == user)))
    }

    fn lock_user(&self, name: &str) -> HalResult<()> {
        let mut cmd = Command::new("usermod");
        cmd.args(["--expiredate", "1", "--lock", name]);
        status_with_timeout("usermod", &mut cmd, ACCOUNT_TIMEOUT)
    }
}

impl PackageOps for LinuxHal {
    fn refresh(&self) -> HalResult<()> {
        run_apt(&refresh_command_spec())
    }

    fn install(&self, pkgs: &[String]) -> HalResult<()> {
        if pkgs.is_empty() {
            return Ok(());
        }
        run_apt(&install_command_spec(pkgs))
    }

    fn remove(&self, pkgs: &[String]) -> HalResult<()> {
        if pkgs.is_empty() {
            return Ok(());
        }
        run_apt(&remove_command_spec(pkgs))
    }

    fn autoremove(&self) -> HalResult<()> {
        run_apt(&autoremove_command_spec())
    }

    fn upgrade_all(&self) -> HalResult<()> {
        run_apt(&upgrade_command_spec())
    }
}

/// Removes the downloaded archive once extraction finished or failed.
struct DownloadGuard {
    path: PathBuf,
}

impl Drop for DownloadGuard {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!(
                    "failed to remove downloaded archive {}: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}

fn download_to(url: &str, target: &Path) -> HalResult<()> {
    let download_err = |reason: String| HalError::Download {
        url: url.to_string(),
        reason,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(DOWNLOAD_TIMEOUT)
        .user_agent("kiosk-setup")
        .build()
        .map_err(|e| download_err(e.to_string()))?;
    let mut response = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| download_err(e.to_string()))?;
    let mut file = File::create(target)?;
    response
        .copy_to(&mut file)
        .map_err(|e| download_err(e.to_string()))?;
    file.sync_all()?;
    Ok(())
}

impl ArchiveOps for LinuxHal {
    fn fetch_and_extract(&self, url: &str, destination: &Path) -> HalResult<()> {
        let archive = destination.join(DOWNLOAD_FILE_NAME);
        let _guard = DownloadGuard {
            path: archive.clone(),
        };

        log::info!("downloading {}", url);
        download_to(url, &archive)?;

        log::info!("extracting into {}", destination.display());
        let mut cmd = Command::new("tar");
        cmd.arg("-xzf").arg(&archive).arg("-C").arg(destination);
        status_with_timeout("tar", &mut cmd, EXTRACT_TIMEOUT)
    }
}

impl SettingsStoreOps for LinuxHal {
    fn get_entry(&self, store: &Path, key: &str) -> HalResult<Option<String>> {
        sqlite_get_entry(store, key)
    }

    fn set_entry(&self, store: &Path, key: &str, value: &str) -> HalResult<()> {
        sqlite_set_entry(store, key, value)
    }
}

impl SystemOps for LinuxHal {
    fn generate_locales(&self) -> HalResult<()> {
        let mut cmd = Command::new("locale-gen");
        cmd.arg("--purge");
        status_with_timeout("locale-gen", &mut cmd, LOCALE_TIMEOUT)
    }

    fn update_locale(&self, locale: &str) -> HalResult<()> {
        let mut cmd = Command::new("update-locale");
        cmd.arg(format!("LANG={locale}"));
        status_with_timeout("update-locale", &mut cmd, LOCALE_TIMEOUT)
    }

    fn reconfigure_timezone(&self) -> HalResult<()> {
        let mut cmd = Command::new("dpkg-reconfigure");
        cmd.args(["-f", "noninteractive", "tzdata"]);
        status_with_timeout("dpkg-reconfigure", &mut cmd, TZDATA_TIMEOUT)
    }
}
