//! Fake HAL implementation for testing.
//!
//! This implementation records all operations without executing them, keeps an in-memory
//! account table and settings store, and can be told to fail specific operations, allowing
//! CI-safe testing without root privileges, apt or a network.

use super::{
    AccountOps, ArchiveOps, PackageOps, SettingsStoreOps, SystemAccount, SystemOps,
};
use crate::{HalError, HalResult};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Operation records for testing and verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    CreateUser { name: String },
    AddToGroup { user: String, group: String },
    LockUser { name: String },
    PackageRefresh,
    PackageInstall { packages: Vec<String> },
    PackageRemove { packages: Vec<String> },
    PackageAutoremove,
    PackageUpgrade,
    FetchAndExtract { url: String, destination: PathBuf },
    SetEntry { store: PathBuf, key: String, value: String },
    GenerateLocales,
    UpdateLocale { locale: String },
    ReconfigureTimezone,
}

impl Operation {
    /// Stable name used for failure injection (see [`FakeHal::fail_on`]).
    pub fn label(&self) -> &'static str {
        match self {
            Operation::CreateUser { .. } => "create_user",
            Operation::AddToGroup { .. } => "add_to_group",
            Operation::LockUser { .. } => "lock_user",
            Operation::PackageRefresh => "refresh",
            Operation::PackageInstall { .. } => "install",
            Operation::PackageRemove { .. } => "remove",
            Operation::PackageAutoremove => "autoremove",
            Operation::PackageUpgrade => "upgrade_all",
            Operation::FetchAndExtract { .. } => "fetch_and_extract",
            Operation::SetEntry { .. } => "set_entry",
            Operation::GenerateLocales => "generate_locales",
            Operation::UpdateLocale { .. } => "update_locale",
            Operation::ReconfigureTimezone => "reconfigure_timezone",
        }
    }
}

/// Shared state for FakeHal operations.
#[derive(Debug, Clone, Default)]
struct FakeHalState {
    /// All operations that were recorded
    operations: Vec<Operation>,
    users: HashMap<String, SystemAccount>,
    memberships: HashSet<(String, String)>,
    settings: HashMap<(PathBuf, String), String>,
    /// Operation labels (plus "lookup_user") that must fail
    failures: HashSet<String>,
    /// Relative directories materialised by fetch_and_extract
    archive_tree: Vec<PathBuf>,
}

/// Fake HAL implementation that records operations without executing them.
///
/// Accounts created through the fake get the uid/gid it was constructed with (the current
/// process identity by default) so ownership changes on real scratch files succeed unprivileged.
#[derive(Debug, Clone)]
pub struct FakeHal {
    state: Arc<Mutex<FakeHalState>>,
    uid: u32,
    gid: u32,
}

impl Default for FakeHal {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeHal {
    pub fn new() -> Self {
        Self::with_identity(
            nix::unistd::getuid().as_raw(),
            nix::unistd::getgid().as_raw(),
        )
    }

    pub fn with_identity(uid: u32, gid: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeHalState::default())),
            uid,
            gid,
        }
    }

    /// Directories (relative to the destination) that a fake extraction creates.
    pub fn with_archive_tree(self, dirs: &[&str]) -> Self {
        self.state.lock().unwrap().archive_tree = dirs.iter().map(PathBuf::from).collect();
        self
    }

    /// Seed an account as if it already existed on the host.
    pub fn add_existing_user(&self, name: &str) {
        let account = self.account_for(name);
        self.state
            .lock()
            .unwrap()
            .users
            .insert(name.to_string(), account);
    }

    /// Make every subsequent call of the labelled operation fail.
    pub fn fail_on(&self, label: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(label.to_string());
    }

    /// Undo [`FakeHal::fail_on`].
    pub fn heal(&self, label: &str) {
        self.state.lock().unwrap().failures.remove(label);
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<Operation> {
        self.state.lock().unwrap().operations.clone()
    }

    /// Get the number of operations recorded.
    pub fn operation_count(&self) -> usize {
        self.state.lock().unwrap().operations.len()
    }

    /// Check if a specific operation was recorded.
    pub fn has_operation(&self, check: impl Fn(&Operation) -> bool) -> bool {
        self.state.lock().unwrap().operations.iter().any(check)
    }

    /// Clear recorded operations (accounts and settings are kept).
    pub fn clear(&self) {
        self.state.lock().unwrap().operations.clear();
    }

    fn account_for(&self, name: &str) -> SystemAccount {
        SystemAccount {
            name: name.to_string(),
            uid: self.uid,
            gid: self.gid,
            home: PathBuf::from("/home").join(name),
        }
    }

    fn check_failure(&self, label: &str) -> HalResult<()> {
        if self.state.lock().unwrap().failures.contains(label) {
            return Err(HalError::CommandFailed {
                program: label.to_string(),
                code: Some(1),
                stderr: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    /// Record an operation, failing first if it was marked with [`FakeHal::fail_on`].
    fn record_operation(&self, op: Operation) -> HalResult<()> {
        self.check_failure(op.label())?;
        log::info!("FAKE HAL: {:?}", op);
        self.state.lock().unwrap().operations.push(op);
        Ok(())
    }
}

impl AccountOps for FakeHal {
    fn lookup_user(&self, name: &str) -> HalResult<Option<SystemAccount>> {
        if self.state.lock().unwrap().failures.contains("lookup_user") {
            return Err(HalError::AccountLookup {
                name: name.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(self.state.lock().unwrap().users.get(name).cloned())
    }

    fn create_user(&self, name: &str) -> HalResult<()> {
        self.record_operation(Operation::CreateUser {
            name: name.to_string(),
        })?;
        self.add_existing_user(name);
        Ok(())
    }

    fn add_to_group(&self, user: &str, group: &str) -> HalResult<()> {
        self.record_operation(Operation::AddToGroup {
            user: user.to_string(),
            group: group.to_string(),
        })?;
        self.state
            .lock()
            .unwrap()
            .memberships
            .insert((user.to_string(), group.to_string()));
        Ok(())
    }

    fn user_in_group(&self, user: &str, group: &str) -> HalResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .memberships
            .contains(&(user.to_string(), group.to_string())))
    }

    fn lock_user(&self, name: &str) -> HalResult<()> {
        self.record_operation(Operation::LockUser {
            name: name.to_string(),
        })
    }
}

impl PackageOps for FakeHal {
    fn refresh(&self) -> HalResult<()> {
        self.record_operation(Operation::PackageRefresh)
    }

    fn install(&self, pkgs: &[String]) -> HalResult<()> {
        self.record_operation(Operation::PackageInstall {
            packages: pkgs.to_vec(),
        })
    }

    fn remove(&self, pkgs: &[String]) -> HalResult<()> {
        self.record_operation(Operation::PackageRemove {
            packages: pkgs.to_vec(),
        })
    }

    fn autoremove(&self) -> HalResult<()> {
        self.record_operation(Operation::PackageAutoremove)
    }

    fn upgrade_all(&self) -> HalResult<()> {
        self.record_operation(Operation::PackageUpgrade)
    }
}

impl ArchiveOps for FakeHal {
    fn fetch_and_extract(&self, url: &str, destination: &Path) -> HalResult<()> {
        self.record_operation(Operation::FetchAndExtract {
            url: url.to_string(),
            destination: destination.to_path_buf(),
        })?;
        let tree = self.state.lock().unwrap().archive_tree.clone();
        for dir in tree {
            std::fs::create_dir_all(destination.join(dir))?;
        }
        Ok(())
    }
}

impl SettingsStoreOps for FakeHal {
    fn get_entry(&self, store: &Path, key: &str) -> HalResult<Option<String>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .settings
            .get(&(store.to_path_buf(), key.to_string()))
            .cloned())
    }

    fn set_entry(&self, store: &Path, key: &str, value: &str) -> HalResult<()> {
        self.record_operation(Operation::SetEntry {
            store: store.to_path_buf(),
            key: key.to_string(),
            value: value.to_string(),
        })?;
        self.state
            .lock()
            .unwrap()
            .settings
            .insert((store.to_path_buf(), key.to_string()), value.to_string());
        Ok(())
    }
}

impl SystemOps for FakeHal {
    fn generate_locales(&self) -> HalResult<()> {
        self.record_operation(Operation::GenerateLocales)
    }

    fn update_locale(&self, locale: &str) -> HalResult<()> {
        self.record_operation(Operation::UpdateLocale {
            locale: locale.to_string(),
        })
    }

    fn reconfigure_timezone(&self) -> HalResult<()> {
        self.record_operation(Operation::ReconfigureTimezone)
    }
}
