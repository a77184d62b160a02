//! Package manager operations (apt).

use crate::HalResult;

pub trait PackageOps {
    /// Refresh the package catalog.
    fn refresh(&self) -> HalResult<()>;
    fn install(&self, pkgs: &[String]) -> HalResult<()>;
    fn remove(&self, pkgs: &[String]) -> HalResult<()>;
    fn autoremove(&self) -> HalResult<()>;
    fn upgrade_all(&self) -> HalResult<()>;
}

/// A fully-specified external command, kept as data so it can be asserted on in tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    fn apt(args: &[&str]) -> Self {
        Self {
            program: "apt-get".to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
        }
    }

    fn with_packages(mut self, pkgs: &[String]) -> Self {
        self.args.extend(pkgs.iter().cloned());
        self
    }
}

pub fn refresh_command_spec() -> CommandSpec {
    CommandSpec::apt(&["update"])
}

pub fn install_command_spec(pkgs: &[String]) -> CommandSpec {
    CommandSpec::apt(&["install", "-y"]).with_packages(pkgs)
}

pub fn remove_command_spec(pkgs: &[String]) -> CommandSpec {
    CommandSpec::apt(&["remove", "-y"]).with_packages(pkgs)
}

pub fn autoremove_command_spec() -> CommandSpec {
    CommandSpec::apt(&["autoremove", "-y"])
}

pub fn upgrade_command_spec() -> CommandSpec {
    CommandSpec::apt(&["upgrade", "-y"])
}
