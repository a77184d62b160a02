use std::path::PathBuf;

pub const DEFAULT_LOG_FILE: &str = "/var/log/kiosk-setup.log";

/// Initialise `env_logger`, appending to `log_file` (or [`DEFAULT_LOG_FILE`]).
pub fn init_with(log_file: Option<PathBuf>) {
    use env_logger::Target;
    use std::fs;
    use std::io;

    let path = log_file.unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));

    // A provisioning run leaves a record on the host. If the file cannot be opened (read-only
    // root, staged tree without /var/log), fall back to stderr.
    let target = (|| -> io::Result<Target> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        Ok(Target::Pipe(Box::new(file)))
    })()
    .unwrap_or(Target::Stderr);

    let _ = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info"),
    )
    .target(target)
    .try_init();
}
