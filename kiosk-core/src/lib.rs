//! Kiosk provisioning core library.
//!
//! `kiosk-core` holds the idempotent provisioning engine: the line patcher, resource probes,
//! scoped writer, step sequencer and the kiosk steps built on top of them.

pub mod assets;
pub mod cli;
pub mod config;
pub mod config_states;
pub mod layout;
pub mod logging;
pub mod orientation;
pub mod patcher;
pub mod preflight;
pub mod probe;
pub mod prompt;
pub mod scoped_writer;
pub mod sequencer;
pub mod steps;

pub use kiosk_error::{HalError, KioskError, KioskResult};
