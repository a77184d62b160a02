//! The kiosk provisioning steps, in execution order.
//!
//! Each step is a guard plus an action over a shared [`StepContext`]. Guards only read; actions
//! converge the host towards the configured state and leave unrelated content alone.

pub mod accounts;
pub mod browser;
pub mod packages;
pub mod session;
pub mod system;

use crate::config::ProvisionConfig;
use crate::config_states::ValidatedConfig;
use crate::layout::HostLayout;
use crate::orientation::Orientation;
use crate::patcher::{self, PatchOutcome};
use crate::probe::ResourceProbe;
use crate::scoped_writer::{self, Owner};
use crate::sequencer::{ProvisioningStep, RunReport, StepOutcome, StepSequencer};
use kiosk_error::{HalError, KioskError, KioskResult};
use kiosk_hal::{SystemAccount, SystemHal};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const SET_HOSTNAME: &str = "set hostname";
pub const SET_DISPLAY_ROTATION: &str = "set display rotation";
pub const ENSURE_ADMIN_ACCOUNT: &str = "ensure admin account";
pub const INSTALL_ADMIN_SSH_KEY: &str = "install admin SSH key";
pub const HARDEN_SSH: &str = "harden SSH";
pub const ENSURE_DASHBOARD_ACCOUNT: &str = "ensure dashboard account";
pub const WRITE_DASHBOARD_SESSION: &str = "write dashboard session";
pub const ENABLE_AUTOLOGIN: &str = "enable autologin";
pub const RECONCILE_PACKAGES: &str = "reconcile packages";
pub const INSTALL_BROWSER_PROFILE: &str = "install browser profile";
pub const SEED_EXTENSION_SETTINGS: &str = "seed extension settings";
pub const SET_GPU_MEMORY: &str = "set GPU memory split";
pub const SET_LOCALE: &str = "set locale";
pub const SET_TIMEZONE: &str = "set timezone";
pub const SET_KEYBOARD: &str = "set keyboard";
pub const DISABLE_DEFAULT_ACCOUNT: &str = "disable default account";

/// Answers collected from the operator before the run starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperatorAnswers {
    /// `None` keeps the current hostname.
    pub hostname: Option<String>,
    pub orientation: Orientation,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_packages: bool,
}

pub struct StepContext<'a, H: SystemHal> {
    pub hal: &'a H,
    pub config: &'a ProvisionConfig,
    pub layout: &'a HostLayout,
    pub answers: &'a OperatorAnswers,
}

impl<'a, H: SystemHal> StepContext<'a, H> {
    pub fn probe(&self) -> ResourceProbe<'a, H> {
        ResourceProbe::new(self.hal)
    }

    /// Resolve an absolute host path under the layout root.
    pub fn path(&self, host_path: impl AsRef<Path>) -> PathBuf {
        self.layout.path(host_path)
    }

    /// Look up an account an earlier step is responsible for creating.
    pub fn require_account(&self, name: &str) -> KioskResult<SystemAccount> {
        self.probe().lookup_user(name)?.ok_or_else(|| {
            KioskError::from(HalError::AccountLookup {
                name: name.to_string(),
                reason: "account does not exist".to_string(),
            })
        })
    }

    /// The account's home directory under the layout root.
    pub fn home_of(&self, account: &SystemAccount) -> PathBuf {
        self.layout.path(&account.home)
    }
}

/// Build the ordered step list. The package step is left out entirely with `skip_packages`.
pub fn build_steps<'a, H: SystemHal + 'a>(
    ctx: &'a StepContext<'a, H>,
    options: RunOptions,
) -> Vec<ProvisioningStep<'a>> {
    let mut steps = vec![
        ProvisioningStep::guarded(
            SET_HOSTNAME,
            move || system::hostname_present(ctx),
            move || system::set_hostname(ctx),
        ),
        ProvisioningStep::unguarded(SET_DISPLAY_ROTATION, move || {
            system::set_display_rotation(ctx)
        }),
        ProvisioningStep::guarded(
            ENSURE_ADMIN_ACCOUNT,
            move || accounts::admin_present(ctx),
            move || accounts::ensure_admin(ctx),
        ),
        ProvisioningStep::guarded(
            INSTALL_ADMIN_SSH_KEY,
            move || accounts::admin_key_present(ctx),
            move || accounts::install_admin_key(ctx),
        ),
        ProvisioningStep::unguarded(HARDEN_SSH, move || accounts::harden_ssh(ctx)),
        ProvisioningStep::guarded(
            ENSURE_DASHBOARD_ACCOUNT,
            move || accounts::dashboard_present(ctx),
            move || accounts::ensure_dashboard(ctx),
        ),
        ProvisioningStep::guarded(
            WRITE_DASHBOARD_SESSION,
            move || session::session_present(ctx),
            move || session::write_session(ctx),
        ),
        ProvisioningStep::guarded(
            ENABLE_AUTOLOGIN,
            move || session::autologin_present(ctx),
            move || session::enable_autologin(ctx),
        ),
    ];

    if options.skip_packages {
        log::info!("Skipping package reconciliation (--skip-packages)");
    } else {
        steps.push(ProvisioningStep::unguarded(RECONCILE_PACKAGES, move || {
            packages::reconcile(ctx)
        }));
    }

    steps.extend([
        ProvisioningStep::guarded(
            INSTALL_BROWSER_PROFILE,
            move || browser::profile_present(ctx),
            move || browser::install_profile(ctx),
        ),
        ProvisioningStep::guarded(
            SEED_EXTENSION_SETTINGS,
            move || browser::settings_present(ctx),
            move || browser::seed_settings(ctx),
        ),
        ProvisioningStep::unguarded(SET_GPU_MEMORY, move || system::set_gpu_memory(ctx)),
        ProvisioningStep::unguarded(SET_LOCALE, move || system::set_locale(ctx)),
        ProvisioningStep::guarded(
            SET_TIMEZONE,
            move || system::timezone_present(ctx),
            move || system::set_timezone(ctx),
        ),
        ProvisioningStep::unguarded(SET_KEYBOARD, move || system::set_keyboard(ctx)),
        ProvisioningStep::guarded(
            DISABLE_DEFAULT_ACCOUNT,
            move || accounts::default_account_absent(ctx),
            move || accounts::disable_default_account(ctx),
        ),
    ]);

    steps
}

/// Run every step against `hal` and the host under `layout`.
pub fn provision<H: SystemHal>(
    hal: &H,
    config: &ValidatedConfig<ProvisionConfig>,
    layout: &HostLayout,
    answers: &OperatorAnswers,
    options: RunOptions,
) -> KioskResult<RunReport> {
    let ctx = StepContext {
        hal,
        config: &**config,
        layout,
        answers,
    };
    system::ensure_timezone_known(&ctx)?;
    let steps = build_steps(&ctx, options);
    StepSequencer::new().run(&steps)
}

pub(crate) fn outcome_of(changed: bool) -> StepOutcome {
    if changed {
        StepOutcome::Applied
    } else {
        StepOutcome::Unchanged
    }
}

/// [`patcher::patch`], creating the file with just `line` when it does not exist yet.
pub(crate) fn patch_or_create(
    path: &Path,
    prefix: &str,
    line: &str,
    mode: u32,
) -> KioskResult<PatchOutcome> {
    match fs::symlink_metadata(path) {
        Ok(_) => patcher::patch(path, prefix, line),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            if line.contains('\n') {
                return Err(KioskError::ValidationFailed(format!(
                    "replacement for '{prefix}' must be a single line"
                )));
            }
            scoped_writer::create_with_ownership(path, mode, None, format!("{line}\n").as_bytes())?;
            log::info!("{}: created with '{}'", path.display(), line);
            Ok(PatchOutcome::Changed)
        }
        Err(err) => Err(KioskError::io(path, err)),
    }
}

/// Write a root-owned single-value file (`/etc/hostname`, `/etc/timezone`) unless it already
/// holds exactly `content`. An existing file keeps its mode and owner.
pub(crate) fn write_host_file(path: &Path, content: &str) -> KioskResult<bool> {
    match fs::read(path) {
        Ok(current) if current == content.as_bytes() => Ok(false),
        Ok(_) => {
            scoped_writer::rewrite_preserving(path, content.as_bytes())?;
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            scoped_writer::create_with_ownership(path, 0o644, None, content.as_bytes())?;
            Ok(true)
        }
        Err(err) => Err(KioskError::io(path, err)),
    }
}

/// Create `relative` directory by directory below `base`, handing each component to `owner`.
pub(crate) fn ensure_owned_path(
    base: &Path,
    relative: &Path,
    mode: u32,
    owner: Owner,
) -> KioskResult<PathBuf> {
    let mut current = base.to_path_buf();
    for component in relative.components() {
        current.push(component);
        scoped_writer::ensure_owned_directory(&current, mode, owner)?;
    }
    Ok(current)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::layout;
    use kiosk_hal::FakeHal;
    use tempfile::TempDir;

    pub const TEST_KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIKiosk admin@workstation";

    pub const STOCK_HOSTS: &str = "127.0.0.1\tlocalhost\n::1\t\tlocalhost ip6-localhost ip6-loopback\n\n127.0.1.1\traspberrypi\n";
    pub const STOCK_RC_LOCAL: &str =
        "#!/bin/sh -e\n#\n# rc.local\n\n_IP=$(hostname -I) || true\nif [ \"$_IP\" ]; then\n  printf \"My IP address is %s\\n\" \"$_IP\"\nfi\n\nexit 0\n";

    /// A freshly imaged host laid out under a temp dir.
    pub struct StagedHost {
        pub dir: TempDir,
        pub layout: HostLayout,
        pub hal: FakeHal,
        pub config: ProvisionConfig,
        pub answers: OperatorAnswers,
    }

    impl StagedHost {
        pub fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let layout = HostLayout::new(dir.path());
            let staged = Self {
                dir,
                layout,
                hal: FakeHal::new().with_archive_tree(&["chromium/Default/Local Storage"]),
                config: ProvisionConfig {
                    ssh_public_key: TEST_KEY.to_string(),
                    ..Default::default()
                },
                answers: OperatorAnswers {
                    hostname: Some("wallboard".to_string()),
                    orientation: Orientation::Landscape,
                },
            };
            staged.write(layout::HOSTNAME, "raspberrypi\n");
            staged.write(layout::HOSTS, STOCK_HOSTS);
            staged.write(layout::SSHD_CONFIG, "#PermitRootLogin prohibit-password\nUsePAM yes\n");
            staged.write(layout::RC_LOCAL, STOCK_RC_LOCAL);
            staged.write(layout::BOOT_CONFIG, "# For more options see config.txt(5)\ndtparam=audio=on\n");
            staged.write(layout::LOCALE_GEN, "# en_GB.UTF-8 UTF-8\n# en_US.UTF-8 UTF-8\n");
            staged.write(layout::DEFAULT_LOCALE, "LANG=en_US.UTF-8\n");
            staged.write(layout::KEYBOARD, "XKBMODEL=\"pc105\"\nXKBLAYOUT=\"gb\"\nXKBVARIANT=\"\"\nXKBOPTIONS=\"\"\n\nBACKSPACE=\"guess\"\n");
            staged.write(layout::TIMEZONE, "Etc/UTC\n");
            staged.write("/usr/share/zoneinfo/Etc/UTC", "TZif");
            staged.write("/usr/share/zoneinfo/America/Los_Angeles", "TZif");
            std::os::unix::fs::symlink(
                "/usr/share/zoneinfo/Etc/UTC",
                staged.path(layout::LOCALTIME),
            )
            .unwrap();
            fs::create_dir_all(staged.path("/var/log")).unwrap();
            fs::create_dir_all(staged.path("/home")).unwrap();
            staged
        }

        pub fn ctx(&self) -> StepContext<'_, FakeHal> {
            StepContext {
                hal: &self.hal,
                config: &self.config,
                layout: &self.layout,
                answers: &self.answers,
            }
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
    }
}

#[cfg(test)]
mod tests {
    use super::testing::StagedHost;
    use super::*;
    use tempfile::tempdir;

    fn names(steps: &[ProvisioningStep<'_>]) -> Vec<String> {
        steps.iter().map(|s| s.name.to_string()).collect()
    }

    #[test]
    fn steps_run_in_documented_order() {
        let host = StagedHost::new();
        let ctx = host.ctx();
        let steps = build_steps(&ctx, RunOptions::default());
        assert_eq!(
            names(&steps),
            vec![
                SET_HOSTNAME,
                SET_DISPLAY_ROTATION,
                ENSURE_ADMIN_ACCOUNT,
                INSTALL_ADMIN_SSH_KEY,
                HARDEN_SSH,
                ENSURE_DASHBOARD_ACCOUNT,
                WRITE_DASHBOARD_SESSION,
                ENABLE_AUTOLOGIN,
                RECONCILE_PACKAGES,
                INSTALL_BROWSER_PROFILE,
                SEED_EXTENSION_SETTINGS,
                SET_GPU_MEMORY,
                SET_LOCALE,
                SET_TIMEZONE,
                SET_KEYBOARD,
                DISABLE_DEFAULT_ACCOUNT,
            ]
        );
    }

    #[test]
    fn skip_packages_drops_package_step() {
        let host = StagedHost::new();
        let ctx = host.ctx();
        let steps = build_steps(&ctx, RunOptions { skip_packages: true });
        assert_eq!(steps.len(), 15);
        assert!(!names(&steps).iter().any(|n| n == RECONCILE_PACKAGES));
    }

    #[test]
    fn patch_or_create_creates_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keyboard");

        let first = patch_or_create(&path, "XKBMODEL=", "XKBMODEL=\"pc104\"", 0o644).unwrap();
        let second = patch_or_create(&path, "XKBLAYOUT=", "XKBLAYOUT=\"us\"", 0o644).unwrap();

        assert!(first.changed() && second.changed());
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "XKBMODEL=\"pc104\"\nXKBLAYOUT=\"us\"\n"
        );
    }

    #[test]
    fn write_host_file_skips_identical_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hostname");
        assert!(write_host_file(&path, "wallboard\n").unwrap());
        assert!(!write_host_file(&path, "wallboard\n").unwrap());
        assert!(write_host_file(&path, "lobby\n").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "lobby\n");
    }

    #[test]
    fn require_account_reports_missing_account() {
        let host = StagedHost::new();
        let err = host.ctx().require_account("dashboard").unwrap_err();
        assert!(matches!(
            err,
            KioskError::Collaborator(HalError::AccountLookup { .. })
        ));
    }
}
