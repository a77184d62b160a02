use kiosk_error::{KioskError, KioskResult};

/// Guard: `Ok(true)` when the step's desired state is already present.
pub type GuardFn<'a> = Box<dyn Fn() -> KioskResult<bool> + 'a>;
pub type ActionFn<'a> = Box<dyn Fn() -> KioskResult<StepOutcome> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The guard reported the desired state already present.
    Skipped,
    /// The action ran and found nothing to change.
    Unchanged,
    Applied,
}

pub struct ProvisioningStep<'a> {
    pub name: &'a str,
    pub guard: Option<GuardFn<'a>>,
    pub action: ActionFn<'a>,
}

impl<'a> ProvisioningStep<'a> {
    pub fn guarded(
        name: &'a str,
        guard: impl Fn() -> KioskResult<bool> + 'a,
        action: impl Fn() -> KioskResult<StepOutcome> + 'a,
    ) -> Self {
        Self {
            name,
            guard: Some(Box::new(guard)),
            action: Box::new(action),
        }
    }

    /// A step whose action is its own fixed point.
    pub fn unguarded(name: &'a str, action: impl Fn() -> KioskResult<StepOutcome> + 'a) -> Self {
        Self {
            name,
            guard: None,
            action: Box::new(action),
        }
    }

    fn execute(&self) -> KioskResult<StepOutcome> {
        if let Some(guard) = &self.guard {
            if guard()? {
                return Ok(StepOutcome::Skipped);
            }
        }
        (self.action)()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    pub fn applied(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.outcome == StepOutcome::Applied)
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn outcome_of(&self, name: &str) -> Option<StepOutcome> {
        self.steps
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.outcome)
    }
}

/// Runs steps strictly in order and stops at the first failure. No retries.
#[derive(Debug, Default)]
pub struct StepSequencer;

impl StepSequencer {
    pub fn new() -> Self {
        Self
    }

    pub fn run(&self, steps: &[ProvisioningStep<'_>]) -> KioskResult<RunReport> {
        let mut report = RunReport::default();

        for step in steps {
            log::info!("▶ {}", step.name);
            let outcome = step.execute().map_err(|err| {
                log::error!("✗ {} failed: {}", step.name, err);
                KioskError::StepFailed {
                    step: step.name.to_string(),
                    source: Box::new(err),
                }
            })?;
            match outcome {
                StepOutcome::Skipped => log::info!("  {} already present, leaving alone", step.name),
                StepOutcome::Unchanged => log::info!("  {} already up to date", step.name),
                StepOutcome::Applied => log::info!("✓ {}", step.name),
            }
            report.steps.push(StepRecord {
                name: step.name.to_string(),
                outcome,
            });
        }

        Ok(report)
    }
}
