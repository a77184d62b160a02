//! HAL trait definitions and implementations.
//!
//! This module defines the collaborator traits used by the provisioning steps and provides
//! both real (LinuxHal) and fake (FakeHal) implementations.

pub mod account_ops;
pub mod archive_ops;
pub mod fake_hal;
pub mod linux_hal;
pub mod package_ops;
pub mod settings_ops;
pub mod system_ops;

pub use account_ops::{AccountOps, SystemAccount};
pub use archive_ops::ArchiveOps;
pub use fake_hal::{FakeHal, Operation};
pub use linux_hal::LinuxHal;
pub use package_ops::{CommandSpec, PackageOps};
pub use settings_ops::SettingsStoreOps;
pub use system_ops::SystemOps;

/// Complete HAL combining all collaborator traits.
pub trait SystemHal: AccountOps + PackageOps + ArchiveOps + SettingsStoreOps + SystemOps {}

/// Automatically implement SystemHal for any type implementing all required traits.
impl<T> SystemHal for T where T: AccountOps + PackageOps + ArchiveOps + SettingsStoreOps + SystemOps {}
