use anyhow::Context;
use clap::Parser;
use kiosk_core::cli::Cli;
use kiosk_core::config::ProvisionConfig;
use kiosk_core::config_states::{UnvalidatedConfig, ValidatedConfig};
use kiosk_core::layout::{self, HostLayout};
use kiosk_core::orientation::Orientation;
use kiosk_core::preflight::{self, PreflightConfig};
use kiosk_core::prompt;
use kiosk_core::steps::{self, OperatorAnswers, RunOptions};
use std::fs;
use std::io::{BufRead, Write};

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    kiosk_core::logging::init_with(cli.log_file.clone());

    if cli.print_default_config {
        print!("{}", ProvisionConfig::default().to_toml_string()?);
        return Ok(());
    }

    // Privilege first: nothing is read from the operator or touched on the host without root.
    preflight::ensure_root()?;
    let config = load_config(&cli)?;
    preflight::run_with(&PreflightConfig::for_run(cli.skip_packages))?;

    let layout = HostLayout::new(&cli.root);
    let stdin = std::io::stdin();
    let answers = collect_answers(
        &cli,
        &current_hostname(&layout),
        &mut stdin.lock(),
        &mut std::io::stdout(),
    )?;

    let hal = kiosk_hal::LinuxHal::new();
    let options = RunOptions {
        skip_packages: cli.skip_packages,
    };
    let report = steps::provision(&hal, &config, &layout, &answers, options)?;

    log::info!(
        "✅ Provisioning complete: {} of {} steps changed the host",
        report.applied().len(),
        report.steps.len()
    );
    println!("Done. You should reboot for changes to take effect. (sudo reboot)");
    Ok(())
}

/// Config file (or built-in defaults), then `--ssh-key-file`, then validation.
pub fn load_config(cli: &Cli) -> anyhow::Result<ValidatedConfig<ProvisionConfig>> {
    let mut config = ProvisionConfig::load(cli.config.as_deref())
        .with_context(|| "Failed to load provisioning config")?;

    if let Some(key_file) = &cli.ssh_key_file {
        let key = fs::read_to_string(key_file)
            .with_context(|| format!("Failed to read SSH key from {}", key_file.display()))?;
        config.ssh_public_key = key.trim().to_string();
    }

    Ok(UnvalidatedConfig::new(config).validate()?)
}

fn current_hostname(layout: &HostLayout) -> String {
    fs::read_to_string(layout.path(layout::HOSTNAME))
        .map(|name| name.trim().to_string())
        .unwrap_or_default()
}

/// Flags answer the prompts; anything not given on the command line is asked for.
pub fn collect_answers<R: BufRead, W: Write>(
    cli: &Cli,
    current_hostname: &str,
    input: &mut R,
    output: &mut W,
) -> anyhow::Result<OperatorAnswers> {
    let hostname = match cli.hostname.as_deref().map(str::trim) {
        Some("") => None,
        Some(name) => {
            prompt::validate_hostname(name)?;
            Some(name.to_string())
        }
        None => prompt::prompt_hostname(input, output, current_hostname)?,
    };

    let orientation = match cli.orientation.as_deref() {
        Some(choice) => Orientation::resolve(choice),
        None => prompt::prompt_orientation(input, output)?,
    };

    Ok(OperatorAnswers {
        hostname,
        orientation,
    })
}
