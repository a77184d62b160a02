//! Read-only existence checks used as step guards.

use crate::scoped_writer::Owner;
use kiosk_error::{KioskError, KioskResult};
use kiosk_hal::{AccountOps, SystemAccount};
use std::fs;
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

pub struct ResourceProbe<'a, A: AccountOps + ?Sized> {
    accounts: &'a A,
}

impl<'a, A: AccountOps + ?Sized> ResourceProbe<'a, A> {
    pub fn new(accounts: &'a A) -> Self {
        Self { accounts }
    }

    /// An unreachable account database is a [`KioskError::Probe`], never "absent".
    pub fn lookup_user(&self, name: &str) -> KioskResult<Option<SystemAccount>> {
        self.accounts
            .lookup_user(name)
            .map_err(|e| KioskError::probe(format!("account '{name}'"), e))
    }

    pub fn user_exists(&self, name: &str) -> KioskResult<bool> {
        Ok(self.lookup_user(name)?.is_some())
    }

    pub fn user_in_group(&self, user: &str, group: &str) -> KioskResult<bool> {
        self.accounts
            .user_in_group(user, group)
            .map_err(|e| KioskError::probe(format!("membership of '{user}' in '{group}'"), e))
    }

    /// Substring search over the whole file. A missing file contains nothing.
    pub fn file_contains(&self, path: &Path, needle: &str) -> KioskResult<bool> {
        match read_optional(path)? {
            Some(bytes) => Ok(String::from_utf8_lossy(&bytes).contains(needle)),
            None => Ok(false),
        }
    }

    /// Every line of the file starting with `prefix`, in file order. A missing file has none.
    pub fn lines_with_prefix(&self, path: &Path, prefix: &str) -> KioskResult<Vec<String>> {
        Ok(read_optional(path)?
            .map(|bytes| {
                String::from_utf8_lossy(&bytes)
                    .lines()
                    .filter(|line| line.starts_with(prefix))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default())
    }

    /// Exact content comparison. A missing file matches nothing.
    pub fn file_matches(&self, path: &Path, content: &[u8]) -> KioskResult<bool> {
        Ok(read_optional(path)?.is_some_and(|bytes| bytes == content))
    }

    /// Does anything (file, directory, dangling symlink) exist at `path`?
    pub fn path_exists(&self, path: &Path) -> KioskResult<bool> {
        match fs::symlink_metadata(path) {
            Ok(_) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(KioskError::probe(path.display().to_string(), err)),
        }
    }

    /// Is `path` a regular file with exactly this content, mode and (optionally) owner?
    pub fn artifact_matches(
        &self,
        path: &Path,
        content: &[u8],
        mode: u32,
        owner: Option<Owner>,
    ) -> KioskResult<bool> {
        let meta = match fs::symlink_metadata(path) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(KioskError::probe(path.display().to_string(), err)),
        };
        if !meta.is_file() || meta.permissions().mode() & 0o7777 != mode {
            return Ok(false);
        }
        if owner.is_some_and(|o| o != Owner::of(&meta)) {
            return Ok(false);
        }
        Ok(read_optional(path)?.is_some_and(|bytes| bytes == content))
    }

    /// Is `path` a file (any content) carrying `mode`?
    pub fn mode_matches(&self, path: &Path, mode: u32) -> KioskResult<bool> {
        match fs::metadata(path) {
            Ok(meta) => Ok(meta.is_file() && meta.permissions().mode() & 0o7777 == mode),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(KioskError::probe(path.display().to_string(), err)),
        }
    }
}

fn read_optional(path: &Path) -> KioskResult<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(KioskError::probe(path.display().to_string(), err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_hal::FakeHal;
    use tempfile::tempdir;

    #[test]
    fn user_exists_follows_account_database() {
        let hal = FakeHal::new();
        let probe = ResourceProbe::new(&hal);
        assert!(!probe.user_exists("dashboard").unwrap());
        hal.add_existing_user("dashboard");
        assert!(probe.user_exists("dashboard").unwrap());
    }

    #[test]
    fn lookup_failure_is_probe_error() {
        let hal = FakeHal::new();
        hal.fail_on("lookup_user");
        let err = ResourceProbe::new(&hal).user_exists("ben").unwrap_err();
        assert!(matches!(err, KioskError::Probe { .. }));
    }

    #[test]
    fn file_contains_finds_marker() {
        let dir = tempdir().unwrap();
        let rc = dir.path().join("rc.local");
        fs::write(&rc, "#!/bin/sh -e\nsu - dashboard -c 'startx' &\n\nexit 0\n").unwrap();

        let hal = FakeHal::new();
        let probe = ResourceProbe::new(&hal);
        assert!(probe.file_contains(&rc, "startx").unwrap());
        assert!(!probe.file_contains(&rc, "x11vnc").unwrap());
        assert!(!probe
            .file_contains(&dir.path().join("missing"), "startx")
            .unwrap());
    }

    #[test]
    fn file_matches_is_exact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("timezone");
        fs::write(&path, "Europe/Oslo\n").unwrap();

        let hal = FakeHal::new();
        let probe = ResourceProbe::new(&hal);
        assert!(probe.file_matches(&path, b"Europe/Oslo\n").unwrap());
        assert!(!probe.file_matches(&path, b"Europe/Oslo").unwrap());
        assert!(!probe
            .file_matches(&dir.path().join("absent"), b"")
            .unwrap());
    }

    #[test]
    fn lines_with_prefix_lists_every_match() {
        let dir = tempdir().unwrap();
        let hosts = dir.path().join("hosts");
        fs::write(&hosts, "127.0.0.1\tlocalhost\n127.0.1.1\tpi pi\n127.0.1.1\told\n").unwrap();

        let hal = FakeHal::new();
        let probe = ResourceProbe::new(&hal);
        assert_eq!(
            probe.lines_with_prefix(&hosts, "127.0.1.1").unwrap(),
            vec!["127.0.1.1\tpi pi", "127.0.1.1\told"]
        );
        assert!(probe
            .lines_with_prefix(&dir.path().join("absent"), "127.0.1.1")
            .unwrap()
            .is_empty());
    }

    #[test]
    fn path_exists_reports_dangling_symlink() {
        let dir = tempdir().unwrap();
        let link = dir.path().join("localtime");
        std::os::unix::fs::symlink("/nonexistent/zone", &link).unwrap();

        let hal = FakeHal::new();
        let probe = ResourceProbe::new(&hal);
        assert!(probe.path_exists(&link).unwrap());
        assert!(!probe.path_exists(&dir.path().join("nothing")).unwrap());
    }

    #[test]
    fn artifact_matches_checks_content_and_mode() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".x11vncrc");
        fs::write(&path, "nopw\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let hal = FakeHal::new();
        let probe = ResourceProbe::new(&hal);
        assert!(probe.artifact_matches(&path, b"nopw\n", 0o644, None).unwrap());
        assert!(!probe.artifact_matches(&path, b"nopw\n", 0o600, None).unwrap());
        assert!(!probe.artifact_matches(&path, b"forever\n", 0o644, None).unwrap());
        assert!(!probe
            .artifact_matches(&dir.path().join("absent"), b"", 0o644, None)
            .unwrap());
    }
}
