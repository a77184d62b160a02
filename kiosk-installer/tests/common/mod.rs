#![allow(dead_code)]

use kiosk_core::config::ProvisionConfig;
use kiosk_core::config_states::{UnvalidatedConfig, ValidatedConfig};
use kiosk_core::layout::{self, HostLayout};
use kiosk_core::orientation::Orientation;
use kiosk_core::sequencer::RunReport;
use kiosk_core::steps::{self, OperatorAnswers, RunOptions};
use kiosk_core::KioskResult;
use kiosk_hal::FakeHal;
use std::collections::BTreeMap;
use std::fs;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const ADMIN_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGx8 ops@wallboard-admin";

pub const STOCK_HOSTS: &str =
    "127.0.0.1\tlocalhost\n::1\t\tlocalhost ip6-localhost ip6-loopback\n127.0.1.1\tlocalhost\n";

pub const STOCK_RC_LOCAL: &str = "#!/bin/sh -e\n#\n# rc.local\n#\n# This script is executed at the end of each multiuser runlevel.\n\n_IP=$(hostname -I) || true\n\nexit 0\n";

/// A freshly imaged Raspberry Pi root filesystem under a temp dir, with a fake HAL whose
/// stock `pi` account exists.
pub struct Host {
    pub dir: TempDir,
    pub layout: HostLayout,
    pub hal: FakeHal,
    pub config: ValidatedConfig<ProvisionConfig>,
    pub answers: OperatorAnswers,
}

impl Host {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let layout = HostLayout::new(dir.path());
        let hal = FakeHal::new().with_archive_tree(&["chromium/Default/Local Storage"]);
        hal.add_existing_user("pi");

        let config = UnvalidatedConfig::new(ProvisionConfig {
            ssh_public_key: ADMIN_KEY.to_string(),
            ..Default::default()
        })
        .validate()
        .unwrap();

        let host = Self {
            dir,
            layout,
            hal,
            config,
            answers: OperatorAnswers {
                hostname: Some("wallboard".to_string()),
                orientation: Orientation::resolve("2"),
            },
        };

        host.write(layout::HOSTNAME, "raspberrypi\n");
        host.write(layout::HOSTS, STOCK_HOSTS);
        host.write(
            layout::SSHD_CONFIG,
            "Include /etc/ssh/sshd_config.d/*.conf\n#PermitRootLogin prohibit-password\n",
        );
        host.write(layout::RC_LOCAL, STOCK_RC_LOCAL);
        host.write(
            layout::BOOT_CONFIG,
            "# http://rpf.io/configtxt\ndtparam=audio=on\n[pi4]\ndtoverlay=vc4-fkms-v3d\n",
        );
        host.write(
            layout::LOCALE_GEN,
            "# en_GB.UTF-8 UTF-8\n# en_US.UTF-8 UTF-8\n",
        );
        host.write(layout::DEFAULT_LOCALE, "LANG=en_US.UTF-8\n");
        host.write(
            layout::KEYBOARD,
            "XKBMODEL=\"pc105\"\nXKBLAYOUT=\"gb\"\nXKBVARIANT=\"\"\nXKBOPTIONS=\"\"\n\nBACKSPACE=\"guess\"\n",
        );
        host.write(layout::TIMEZONE, "Europe/London\n");
        host.write("/usr/share/zoneinfo/Europe/London", "TZif");
        host.write("/usr/share/zoneinfo/America/Los_Angeles", "TZif");
        std::os::unix::fs::symlink(
            "/usr/share/zoneinfo/Europe/London",
            host.path(layout::LOCALTIME),
        )
        .unwrap();
        fs::create_dir_all(host.path("/var/log")).unwrap();
        fs::create_dir_all(host.path("/home")).unwrap();
        host
    }

    pub fn provision(&self, options: RunOptions) -> KioskResult<RunReport> {
        steps::provision(
            &self.hal,
            &self.config,
            &self.layout,
            &self.answers,
            options,
        )
    }

    pub fn path(&self, host_path: &str) -> PathBuf {
        self.layout.path(host_path)
    }

    pub fn write(&self, host_path: &str, content: &str) {
        let path = self.path(host_path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn read(&self, host_path: &str) -> String {
        fs::read_to_string(self.path(host_path)).unwrap()
    }

    /// Every regular file and symlink under the root, keyed by relative path.
    pub fn snapshot(&self) -> BTreeMap<PathBuf, Vec<u8>> {
        let mut files = BTreeMap::new();
        collect(self.dir.path(), self.dir.path(), &mut files);
        files
    }
}

fn collect(root: &Path, dir: &Path, files: &mut BTreeMap<PathBuf, Vec<u8>>) {
    for entry in fs::read_dir(dir).unwrap() {
        let entry = entry.unwrap();
        let path = entry.path();
        let file_type = entry.file_type().unwrap();
        let key = path.strip_prefix(root).unwrap().to_path_buf();
        if file_type.is_symlink() {
            let target = fs::read_link(&path).unwrap();
            files.insert(key, target.into_os_string().into_vec());
        } else if file_type.is_dir() {
            collect(root, &path, files);
        } else {
            files.insert(key, fs::read(&path).unwrap());
        }
    }
}
