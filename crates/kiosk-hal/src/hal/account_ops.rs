//! OS account database operations.

use crate::HalResult;
use std::path::PathBuf;

/// An OS user identity as reported by the account database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemAccount {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub home: PathBuf,
}

pub trait AccountOps {
    /// Look up an account by name.
    ///
    /// `Ok(None)` means the database answered and the account does not exist. A database that
    /// could not be queried is an error, never `Ok(None)`.
    fn lookup_user(&self, name: &str) -> HalResult<Option<SystemAccount>>;

    fn create_user(&self, name: &str) -> HalResult<()>;

    fn add_to_group(&self, user: &str, group: &str) -> HalResult<()>;

    /// Whether `user` is a supplementary member of `group`. A missing group answers `false`.
    fn user_in_group(&self, user: &str, group: &str) -> HalResult<bool>;

    /// Lock the password and expire the account so it can no longer log in.
    fn lock_user(&self, name: &str) -> HalResult<()>;
}
