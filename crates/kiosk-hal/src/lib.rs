//! Kiosk provisioning collaborators.
//!
//! Everything that touches the account database, the package manager, the network or a
//! third-party data store goes through the traits in [`hal`], so the provisioning engine can be
//! exercised against [`FakeHal`] without root or a network.

pub mod hal;

pub use hal::*;
pub use kiosk_error::{HalError, HalResult};
