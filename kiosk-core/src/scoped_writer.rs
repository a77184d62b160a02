//! Scoped creation of owned files and directories.
//!
//! Files are staged in a sibling temp file that receives its content, mode and owner before it
//! is renamed over the target, so the target is only ever observed as the previous artifact or
//! the complete new one. The temp file is removed on every early exit.

use kiosk_error::{KioskError, KioskResult};
use kiosk_hal::SystemAccount;
use nix::unistd::{Gid, Uid};
use std::fs::{self, DirBuilder, File, OpenOptions};
use std::io::{self, Write};
use std::os::unix::fs::{DirBuilderExt, MetadataExt, OpenOptionsExt, PermissionsExt};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Numeric owner applied to an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl From<&SystemAccount> for Owner {
    fn from(account: &SystemAccount) -> Self {
        Self {
            uid: account.uid,
            gid: account.gid,
        }
    }
}

impl Owner {
    pub fn of(meta: &fs::Metadata) -> Self {
        Self {
            uid: meta.uid(),
            gid: meta.gid(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirState {
    Created,
    AlreadyPresent,
}

/// RAII guard that removes a staged temp file unless it was committed.
#[derive(Debug)]
struct TempFileGuard {
    path: PathBuf,
    active: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, active: true }
    }

    /// The temp file was renamed into place; nothing left to clean up.
    fn commit(mut self) {
        self.active = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.active {
            return;
        }
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != io::ErrorKind::NotFound {
                log::warn!(
                    "scoped writer failed to remove {}: {}",
                    self.path.display(),
                    err
                );
            }
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("artifact");
    path.with_file_name(format!(".{file_name}.kiosk-tmp"))
}

/// Remove a temp file left over from a run that died between create and rename.
fn remove_stale(tmp: &Path) -> KioskResult<()> {
    match fs::remove_file(tmp) {
        Ok(()) => {
            log::warn!("removed stale temp file {}", tmp.display());
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(KioskError::io(tmp, err)),
    }
}

fn chown_path(path: &Path, owner: Owner) -> KioskResult<()> {
    nix::unistd::chown(
        path,
        Some(Uid::from_raw(owner.uid)),
        Some(Gid::from_raw(owner.gid)),
    )
    .map_err(|errno| KioskError::io(path, io::Error::from(errno)))
}

/// Set the permission bits of an existing path.
pub fn set_mode(path: &Path, mode: u32) -> KioskResult<()> {
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
        .map_err(|e| KioskError::io(path, e))
}

/// Apply `owner` to `path` unless it already carries it.
pub fn set_owner(path: &Path, owner: Owner) -> KioskResult<()> {
    let meta = fs::symlink_metadata(path).map_err(|e| KioskError::io(path, e))?;
    if Owner::of(&meta) == owner {
        return Ok(());
    }
    chown_path(path, owner)
}

/// Write `content` to `path` with exactly `mode` and, when given, `owner`.
///
/// The parent directory must exist. An existing directory at `path` is a conflict.
pub fn create_with_ownership(
    path: &Path,
    mode: u32,
    owner: Option<Owner>,
    content: &[u8],
) -> KioskResult<()> {
    if fs::symlink_metadata(path).is_ok_and(|m| m.is_dir()) {
        return Err(KioskError::conflict(path, "expected a file, found a directory"));
    }

    let tmp = temp_path(path);
    remove_stale(&tmp)?;

    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(0o600)
        .open(&tmp)
        .map_err(|e| KioskError::io(path, e))?;
    let guard = TempFileGuard::new(tmp.clone());

    file.write_all(content)
        .map_err(|e| KioskError::io(&tmp, e))?;
    set_mode(&tmp, mode)?;
    if let Some(owner) = owner {
        set_owner(&tmp, owner)?;
    }
    file.sync_all().map_err(|e| KioskError::io(&tmp, e))?;
    drop(file);

    fs::rename(&tmp, path).map_err(|e| KioskError::io(path, e))?;
    guard.commit();

    if let Some(parent) = path.parent() {
        if let Ok(dir) = File::open(parent) {
            dir.sync_all().ok();
        }
    }
    Ok(())
}

/// Point the symlink at `path` to `target`, replacing whatever was there.
///
/// The new link is created beside `path` and renamed over it.
pub fn replace_symlink(path: &Path, target: &Path) -> KioskResult<()> {
    if fs::symlink_metadata(path).is_ok_and(|m| m.is_dir()) {
        return Err(KioskError::conflict(path, "expected a symlink, found a directory"));
    }
    let tmp = temp_path(path);
    remove_stale(&tmp)?;
    std::os::unix::fs::symlink(target, &tmp).map_err(|e| KioskError::io(&tmp, e))?;
    let guard = TempFileGuard::new(tmp.clone());
    fs::rename(&tmp, path).map_err(|e| KioskError::io(path, e))?;
    guard.commit();
    Ok(())
}

/// Replace the content of an existing file, keeping its mode and owner.
pub fn rewrite_preserving(path: &Path, content: &[u8]) -> KioskResult<()> {
    let meta = fs::metadata(path).map_err(|e| KioskError::io(path, e))?;
    let mode = meta.permissions().mode() & 0o7777;
    create_with_ownership(path, mode, Some(Owner::of(&meta)), content)
}

/// Make sure `path` is a directory, creating it and any missing parents with `mode`.
///
/// An existing directory is left untouched.
pub fn ensure_directory(path: &Path, mode: u32) -> KioskResult<DirState> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => return Ok(DirState::AlreadyPresent),
        Ok(_) => {
            return Err(KioskError::conflict(
                path,
                "expected a directory, found another file type",
            ))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(KioskError::io(path, err)),
    }

    DirBuilder::new()
        .recursive(true)
        .mode(mode)
        .create(path)
        .map_err(|e| KioskError::io(path, e))?;
    // The builder's mode is filtered through the umask.
    set_mode(path, mode)?;
    Ok(DirState::Created)
}

/// [`ensure_directory`] plus ownership of the leaf.
///
/// Ownership is (re)applied to an existing directory too, so a run interrupted between
/// creation and chown converges next time.
pub fn ensure_owned_directory(path: &Path, mode: u32, owner: Owner) -> KioskResult<DirState> {
    let state = ensure_directory(path, mode)?;
    set_owner(path, owner)?;
    Ok(state)
}

/// Hand a whole tree to `owner` (symlinks themselves, not their targets). Returns the number
/// of entries visited.
pub fn chown_tree(root: &Path, owner: Owner) -> KioskResult<usize> {
    let mut count = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(root).to_path_buf();
            KioskError::io(path, io::Error::other(e.to_string()))
        })?;
        let meta = entry
            .path()
            .symlink_metadata()
            .map_err(|e| KioskError::io(entry.path(), e))?;
        if Owner::of(&meta) != owner {
            std::os::unix::fs::lchown(entry.path(), Some(owner.uid), Some(owner.gid))
                .map_err(|e| KioskError::io(entry.path(), e))?;
        }
        count += 1;
    }
    Ok(count)
}
