//! Provisioning configuration.
//!
//! Loaded from TOML; every field is optional in the file and defaults to the stock dashboard
//! setup, except the admin SSH key, which has to be supplied.

use crate::config_states::ValidateConfig;
use kiosk_error::{KioskError, KioskResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyboardConfig {
    pub model: String,
    pub layout: String,
    pub variant: String,
    pub options: String,
    pub backspace: String,
}

impl Default for KeyboardConfig {
    fn default() -> Self {
        Self {
            model: "pc104".to_string(),
            layout: "us".to_string(),
            variant: String::new(),
            options: "terminate:ctrl_alt_bksp".to_string(),
            backspace: "guess".to_string(),
        }
    }
}

impl KeyboardConfig {
    /// `(prefix, line)` pairs for `/etc/default/keyboard`, in file order.
    pub fn lines(&self) -> Vec<(&'static str, String)> {
        vec![
            ("XKBMODEL=", format!("XKBMODEL=\"{}\"", self.model)),
            ("XKBLAYOUT=", format!("XKBLAYOUT=\"{}\"", self.layout)),
            ("XKBVARIANT=", format!("XKBVARIANT=\"{}\"", self.variant)),
            ("XKBOPTIONS=", format!("XKBOPTIONS=\"{}\"", self.options)),
            ("BACKSPACE=", format!("BACKSPACE=\"{}\"", self.backspace)),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageLists {
    pub install: Vec<String>,
    pub remove: Vec<String>,
}

fn owned(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

impl Default for PackageLists {
    fn default() -> Self {
        Self {
            install: owned(&[
                "emacs23-nox",
                "libusb-1.0-0-dev",
                "screen",
                "chromium",
                "unclutter",
                "x11vnc",
                "xdotool",
                "htop",
                "x11-xserver-utils",
            ]),
            remove: owned(&[
                "gnome-icon-theme",
                "gnome-themes-standard-data",
                "lxde",
                "lxde-core",
                "dillo",
                "midori",
                "desktop-base",
                "lightdm",
                "lxappearance",
                "lxde-common",
                "lxde-icon-theme",
                "lxinput",
                "lxpanel",
                "lxpolkit",
                "lxrandr",
                "lxsession-edit",
                "lxshortcut",
                "lxtask",
                "lxterminal",
                "weston",
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub admin_username: String,
    pub dashboard_username: String,
    pub locale: String,
    pub timezone: String,
    pub extension_server_address: String,
    pub ssh_public_key: String,
    /// Group granting the admin account sudo rights.
    pub privileged_group: String,
    pub extension_id: String,
    pub browser_profile_url: String,
    /// Directory the profile archive unpacks to, under the dashboard's `~/.config`.
    pub browser_profile_dir: String,
    /// Browser command launched by the window-manager autostart.
    pub browser_command: String,
    /// Appended to the hostname in `/etc/hosts` (`<host>.<domain> <host>`).
    pub host_domain: Option<String>,
    pub gpu_mem: u32,
    pub vnc_log_path: String,
    /// Stock account of the OS image, locked at the end of the run.
    pub default_account: String,
    pub keyboard: KeyboardConfig,
    pub packages: PackageLists,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            admin_username: "ben".to_string(),
            dashboard_username: "dashboard".to_string(),
            locale: "en_US.UTF-8".to_string(),
            timezone: "America/Los_Angeles".to_string(),
            extension_server_address: "skadi.bluejeansnet.com:8081".to_string(),
            ssh_public_key: String::new(),
            privileged_group: "sudo".to_string(),
            extension_id: "jmjpnaplgnfnnlfofkbpogokimpjocmg".to_string(),
            browser_profile_url:
                "http://skadi.bluejeansnet.com/rpi-dashboard/chromium-profile.tar.gz".to_string(),
            browser_profile_dir: "chromium".to_string(),
            browser_command: "chromium".to_string(),
            host_domain: Some("bluejeansnet.com".to_string()),
            gpu_mem: 16,
            vnc_log_path: "/var/log/x11vnc".to_string(),
            default_account: "pi".to_string(),
            keyboard: KeyboardConfig::default(),
            packages: PackageLists::default(),
        }
    }
}

impl ProvisionConfig {
    pub fn from_toml_str(text: &str) -> KioskResult<Self> {
        toml::from_str(text)
            .map_err(|e| KioskError::ValidationFailed(format!("invalid configuration: {e}")))
    }

    /// Read a TOML config file; `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> KioskResult<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path).map_err(|e| KioskError::io(path, e))?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> KioskResult<String> {
        toml::to_string_pretty(self)
            .map_err(|e| KioskError::ValidationFailed(format!("cannot render configuration: {e}")))
    }

    /// Chromium "Local Storage" database of the dashboard extension, relative to `~/.config`.
    pub fn extension_store_relative(&self) -> String {
        format!(
            "{}/Default/Local Storage/chrome-extension_{}_0.localstorage",
            self.browser_profile_dir, self.extension_id
        )
    }
}

/// Names end up on command lines and in `su -c` invocations.
fn is_valid_username(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c == '_' => {}
        _ => return false,
    }
    name.len() <= 32
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

impl ValidateConfig for ProvisionConfig {
    fn validate_cfg(&self) -> KioskResult<()> {
        for (field, name) in [
            ("admin_username", &self.admin_username),
            ("dashboard_username", &self.dashboard_username),
            ("default_account", &self.default_account),
        ] {
            if !is_valid_username(name) {
                return Err(KioskError::ValidationFailed(format!(
                    "{field} '{name}' is not a valid account name"
                )));
            }
        }
        if self.admin_username == self.dashboard_username {
            return Err(KioskError::ValidationFailed(
                "admin and dashboard accounts must differ".to_string(),
            ));
        }
        for (field, name) in [
            ("admin_username", &self.admin_username),
            ("dashboard_username", &self.dashboard_username),
        ] {
            if *name == self.default_account {
                return Err(KioskError::ValidationFailed(format!(
                    "{field} '{name}' is the default account, which is locked at the end of the run"
                )));
            }
        }

        let key = self.ssh_public_key.trim();
        if key.is_empty() {
            return Err(KioskError::ValidationFailed(
                "ssh_public_key is required (config file or --ssh-key-file)".to_string(),
            ));
        }
        if key.contains('\n') {
            return Err(KioskError::ValidationFailed(
                "ssh_public_key must be a single line".to_string(),
            ));
        }

        for (field, value) in [
            ("locale", &self.locale),
            ("timezone", &self.timezone),
            ("extension_server_address", &self.extension_server_address),
            ("extension_id", &self.extension_id),
            ("browser_profile_url", &self.browser_profile_url),
            ("browser_profile_dir", &self.browser_profile_dir),
            ("browser_command", &self.browser_command),
            ("privileged_group", &self.privileged_group),
            ("vnc_log_path", &self.vnc_log_path),
        ] {
            if value.trim().is_empty() || value.contains('\n') {
                return Err(KioskError::ValidationFailed(format!(
                    "{field} must be a non-empty single line"
                )));
            }
        }

        if !self.vnc_log_path.starts_with('/') {
            return Err(KioskError::ValidationFailed(
                "vnc_log_path must be absolute".to_string(),
            ));
        }
        if self.gpu_mem == 0 {
            return Err(KioskError::ValidationFailed(
                "gpu_mem must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
