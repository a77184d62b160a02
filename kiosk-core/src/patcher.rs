//! In-place patching of line-oriented configuration files.
//!
//! Every line starting with the match prefix is replaced by the desired line; when no line
//! matches, the desired line is appended. A line already equal to the desired line counts as a
//! match, which keeps `patch` a fixed point even when the replacement does not itself start
//! with the prefix. Duplicated settings are all normalised to the same line.

use crate::scoped_writer::rewrite_preserving;
use kiosk_error::{KioskError, KioskResult};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Changed,
    Unchanged,
}

impl PatchOutcome {
    pub fn changed(self) -> bool {
        self == PatchOutcome::Changed
    }
}

fn validate(prefix: &str, replacement: &str) -> KioskResult<()> {
    if prefix.is_empty() {
        return Err(KioskError::ValidationFailed(
            "line patch prefix must not be empty".to_string(),
        ));
    }
    if replacement.contains('\n') {
        return Err(KioskError::ValidationFailed(format!(
            "replacement for '{prefix}' must be a single line"
        )));
    }
    Ok(())
}

/// Pure content transformation behind [`patch`].
pub fn patch_content(content: &str, prefix: &str, replacement: &str) -> String {
    let mut out = String::with_capacity(content.len() + replacement.len() + 2);
    let mut matched = false;

    for line in content.split_inclusive('\n') {
        let body = line.strip_suffix('\n').unwrap_or(line);
        if body.starts_with(prefix) || body == replacement {
            out.push_str(replacement);
            out.push('\n');
            matched = true;
        } else {
            out.push_str(line);
        }
    }

    if !matched {
        if !out.is_empty() && !out.ends_with('\n') {
            out.push('\n');
        }
        out.push_str(replacement);
        out.push('\n');
    }
    out
}

/// Patch `path` so the setting identified by `prefix` reads exactly `replacement`.
///
/// The file must exist. It is only rewritten when its content changes, through a scoped
/// temp-file replacement that keeps its mode and owner.
pub fn patch(path: &Path, prefix: &str, replacement: &str) -> KioskResult<PatchOutcome> {
    validate(prefix, replacement)?;

    let current = fs::read_to_string(path).map_err(|e| KioskError::io(path, e))?;
    let patched = patch_content(&current, prefix, replacement);
    if patched == current {
        log::debug!("{}: '{}' already set", path.display(), replacement);
        return Ok(PatchOutcome::Unchanged);
    }

    rewrite_preserving(path, patched.as_bytes())?;
    log::info!("{}: set '{}'", path.display(), replacement);
    Ok(PatchOutcome::Changed)
}
