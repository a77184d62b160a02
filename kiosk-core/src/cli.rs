//! CLI argument parsing for kiosk-setup.
//!
//! Hostname and orientation are prompted for interactively unless given as flags.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kiosk-setup")]
#[command(about = "🖥️  Set up a single-board computer to act as a dashboard kiosk")]
#[command(long_about = "🖥️  Set up a single-board computer to act as a dashboard kiosk\n\n\
    Creates the admin and dashboard accounts, hardens SSH, configures an X11 session that\n\
    starts the browser full-screen with a VNC server, and sets locale, timezone, keyboard and\n\
    display options. Safe to re-run: anything already in place is left alone.\n\n\
    Must be run as root (sudo kiosk-setup).")]
pub struct Cli {
    /// Skip downloading and installation of apt packages
    #[arg(long)]
    pub skip_packages: bool,

    /// TOML file overriding the built-in provisioning settings
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// File holding the admin account's SSH public key (overrides the config file)
    #[arg(long, value_name = "FILE")]
    pub ssh_key_file: Option<PathBuf>,

    /// New hostname; skips the hostname prompt
    #[arg(long)]
    pub hostname: Option<String>,

    /// Display orientation (1, 2 or 3); skips the orientation prompt
    #[arg(long)]
    pub orientation: Option<String>,

    /// Root of the host filesystem to provision
    #[arg(long, default_value = "/")]
    pub root: PathBuf,

    /// Log file (defaults to /var/log/kiosk-setup.log, stderr if it cannot be opened)
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Print the effective default configuration as TOML and exit
    #[arg(long)]
    pub print_default_config: bool,
}
