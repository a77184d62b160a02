//! Host filesystem layout.
//!
//! Every path the steps touch is written as an absolute host path and resolved through a
//! [`HostLayout`], so a run can target `/` or a staged tree.

use std::path::{Path, PathBuf};

pub const HOSTNAME: &str = "/etc/hostname";
pub const HOSTS: &str = "/etc/hosts";
pub const SSHD_CONFIG: &str = "/etc/ssh/sshd_config";
pub const RC_LOCAL: &str = "/etc/rc.local";
pub const BOOT_CONFIG: &str = "/boot/config.txt";
pub const LOCALE_GEN: &str = "/etc/locale.gen";
pub const DEFAULT_LOCALE: &str = "/etc/default/locale";
pub const TIMEZONE: &str = "/etc/timezone";
pub const LOCALTIME: &str = "/etc/localtime";
pub const KEYBOARD: &str = "/etc/default/keyboard";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostLayout {
    root: PathBuf,
}

impl Default for HostLayout {
    fn default() -> Self {
        Self::new("/")
    }
}

impl HostLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve an absolute host path (e.g. `/etc/hosts`, or an account's home) under the root.
    pub fn path(&self, host_path: impl AsRef<Path>) -> PathBuf {
        let host_path = host_path.as_ref();
        let relative = host_path.strip_prefix("/").unwrap_or(host_path);
        self.root.join(relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_layout_is_identity() {
        let layout = HostLayout::default();
        assert_eq!(layout.path(HOSTS), PathBuf::from("/etc/hosts"));
    }

    #[test]
    fn staged_layout_reroots_absolute_paths() {
        let layout = HostLayout::new("/tmp/stage");
        assert_eq!(
            layout.path("/home/dashboard/.xinitrc"),
            PathBuf::from("/tmp/stage/home/dashboard/.xinitrc")
        );
        assert_eq!(
            layout.path("boot/config.txt"),
            PathBuf::from("/tmp/stage/boot/config.txt")
        );
    }
}
