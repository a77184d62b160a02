//! Checks run before the operator is prompted: privilege and required tools.

use kiosk_error::{HalError, KioskError, KioskResult};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const BASE_BINARIES: &[&str] = &[
    "adduser",
    "usermod",
    "tar",
    "locale-gen",
    "update-locale",
    "dpkg-reconfigure",
];
const PACKAGE_BINARIES: &[&str] = &["apt-get"];

#[derive(Debug, Clone)]
pub struct PreflightConfig {
    pub required_binaries: Vec<String>,
    pub path_env: String,
}

impl PreflightConfig {
    pub fn for_run(skip_packages: bool) -> Self {
        let mut required: Vec<String> = BASE_BINARIES.iter().map(|b| b.to_string()).collect();
        if !skip_packages {
            required.extend(PACKAGE_BINARIES.iter().map(|b| b.to_string()));
        }
        Self {
            required_binaries: required,
            path_env: std::env::var("PATH").unwrap_or_default(),
        }
    }
}

/// Refuse to run without root. Nothing has been touched when this fails.
pub fn ensure_root() -> KioskResult<()> {
    check_euid(nix::unistd::geteuid().as_raw())
}

fn check_euid(euid: u32) -> KioskResult<()> {
    if euid != 0 {
        return Err(KioskError::Privilege(format!(
            "root required (running as uid {euid})"
        )));
    }
    Ok(())
}

pub fn run_with(cfg: &PreflightConfig) -> KioskResult<()> {
    log::info!("🧪 Preflight checks");
    check_binaries(cfg)?;
    log::info!("✅ Preflight checks passed");
    Ok(())
}

fn check_binaries(cfg: &PreflightConfig) -> KioskResult<()> {
    let missing: Vec<&str> = cfg
        .required_binaries
        .iter()
        .filter(|bin| find_executable_in_path(bin, &cfg.path_env).is_none())
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(HalError::CommandNotFound(missing.join(", ")).into());
    }
    Ok(())
}

fn find_executable_in_path(binary: &str, path_env: &str) -> Option<PathBuf> {
    for dir in path_env.split(':').filter(|dir| !dir.is_empty()) {
        let candidate = Path::new(dir).join(binary);
        if let Ok(metadata) = fs::metadata(&candidate) {
            if metadata.is_file() && metadata.permissions().mode() & 0o111 != 0 {
                return Some(candidate);
            }
        }
    }
    None
}
