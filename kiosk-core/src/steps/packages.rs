use super::StepContext;
use crate::sequencer::StepOutcome;
use kiosk_error::KioskResult;
use kiosk_hal::SystemHal;

/// Refresh the catalog, apply the install/remove lists, autoremove, then upgrade everything.
///
/// Idempotence is the package manager's: installing an installed package or removing an
/// absent one is a no-op for apt.
pub fn reconcile<H: SystemHal>(ctx: &StepContext<'_, H>) -> KioskResult<StepOutcome> {
    let lists = &ctx.config.packages;

    log::info!("Updating apt catalog");
    ctx.hal.refresh()?;

    if !lists.install.is_empty() {
        log::info!("Installing apt packages: {}", lists.install.join(" "));
        ctx.hal.install(&lists.install)?;
    }

    if !lists.remove.is_empty() {
        log::info!("Removing unnecessary apt packages");
        ctx.hal.remove(&lists.remove)?;
    }
    ctx.hal.autoremove()?;

    log::info!("Upgrading apt packages");
    ctx.hal.upgrade_all()?;
    Ok(StepOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::testing::StagedHost;
    use kiosk_error::KioskError;
    use kiosk_hal::Operation;

    #[test]
    fn package_commands_run_in_order() {
        let host = StagedHost::new();
        reconcile(&host.ctx()).unwrap();

        let labels: Vec<&str> = host.hal.operations().iter().map(|op| op.label()).collect();
        assert_eq!(
            labels,
            vec!["refresh", "install", "remove", "autoremove", "upgrade_all"]
        );
    }

    #[test]
    fn empty_lists_are_not_sent() {
        let mut host = StagedHost::new();
        host.config.packages.install.clear();
        host.config.packages.remove.clear();

        reconcile(&host.ctx()).unwrap();

        assert!(!host
            .hal
            .has_operation(|op| matches!(op, Operation::PackageInstall { .. })));
        assert_eq!(host.hal.operation_count(), 3);
    }

    #[test]
    fn failed_install_stops_before_removal() {
        let host = StagedHost::new();
        host.hal.fail_on("install");

        let err = reconcile(&host.ctx()).unwrap_err();

        assert!(matches!(err, KioskError::Collaborator(_)));
        assert!(!host
            .hal
            .has_operation(|op| matches!(op, Operation::PackageRemove { .. })));
    }
}
