//! Operator prompts shown before any change is made.
//!
//! Generic over the reader/writer so they can be driven from tests.

use crate::orientation::Orientation;
use kiosk_error::{KioskError, KioskResult};
use std::io::{BufRead, Write};

const HOSTNAME_MAX: usize = 63;

/// A valid single DNS label: letters, digits and `-`, not starting or ending with `-`.
pub fn validate_hostname(name: &str) -> KioskResult<()> {
    let valid = !name.is_empty()
        && name.len() <= HOSTNAME_MAX
        && !name.starts_with('-')
        && !name.ends_with('-')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(KioskError::ValidationFailed(format!(
            "'{name}' is not a valid hostname"
        )))
    }
}

fn read_answer<R: BufRead>(input: &mut R) -> KioskResult<String> {
    let mut line = String::new();
    input
        .read_line(&mut line)
        .map_err(|e| KioskError::io("<stdin>", e))?;
    Ok(line.trim().to_string())
}

fn write_prompt<W: Write>(output: &mut W, text: &str) -> KioskResult<()> {
    output
        .write_all(text.as_bytes())
        .and_then(|_| output.flush())
        .map_err(|e| KioskError::io("<stdout>", e))
}

/// Ask for a new hostname, showing `current` as the default.
///
/// An empty answer (or end of input) keeps the current hostname and yields `None`. Invalid
/// names are asked again rather than aborting the run.
pub fn prompt_hostname<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    current: &str,
) -> KioskResult<Option<String>> {
    loop {
        write_prompt(output, &format!("Hostname [{current}]: "))?;
        let answer = read_answer(input)?;
        if answer.is_empty() {
            return Ok(None);
        }
        match validate_hostname(&answer) {
            Ok(()) => return Ok(Some(answer)),
            Err(err) => write_prompt(output, &format!("{err}\n"))?,
        }
    }
}

pub fn prompt_orientation<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
) -> KioskResult<Orientation> {
    write_prompt(
        output,
        "How is the monitor oriented?\n \
         (1 = portrait, monitor was rotated counter-clockwise)\n \
         (2 = landscape)\n \
         (3 = portrait, monitor was rotated clockwise)\n\
         enter one of (1, 2, 3) [2]: ",
    )?;
    Ok(Orientation::resolve(&read_answer(input)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, BufReader, Cursor, Read};

    #[test]
    fn blank_hostname_keeps_current() {
        let mut out = Vec::new();
        let answer = prompt_hostname(&mut Cursor::new("\n"), &mut out, "raspberrypi").unwrap();
        assert_eq!(answer, None);
        assert!(String::from_utf8(out).unwrap().contains("[raspberrypi]"));
    }

    #[test]
    fn invalid_hostname_is_asked_again() {
        let mut out = Vec::new();
        let answer =
            prompt_hostname(&mut Cursor::new("bad name\nkiosk-01\n"), &mut out, "pi").unwrap();
        assert_eq!(answer.as_deref(), Some("kiosk-01"));
        assert!(String::from_utf8(out)
            .unwrap()
            .contains("'bad name' is not a valid hostname"));
    }

    #[test]
    fn eof_on_hostname_means_no_change() {
        let mut out = Vec::new();
        let answer = prompt_hostname(&mut Cursor::new(""), &mut out, "pi").unwrap();
        assert_eq!(answer, None);
    }

    #[test]
    fn hostname_rules() {
        assert!(validate_hostname("wallboard").is_ok());
        assert!(validate_hostname("a").is_ok());
        assert!(validate_hostname("-edge").is_err());
        assert!(validate_hostname("edge-").is_err());
        assert!(validate_hostname("under_score").is_err());
        assert!(validate_hostname(&"x".repeat(64)).is_err());
    }

    #[test]
    fn orientation_prompt_falls_back_to_landscape() {
        let mut out = Vec::new();
        let choice = prompt_orientation(&mut Cursor::new("9\n"), &mut out).unwrap();
        assert_eq!(choice, Orientation::Landscape);
    }

    struct ClosedTerminal;

    impl Read for ClosedTerminal {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))
        }
    }

    impl Write for ClosedTerminal {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "terminal closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn terminal_failures_are_io_errors() {
        let err = prompt_hostname(&mut Cursor::new(""), &mut ClosedTerminal, "pi").unwrap_err();
        assert!(matches!(err, KioskError::Io { .. }));

        let mut input = BufReader::new(ClosedTerminal);
        let err = prompt_orientation(&mut input, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, KioskError::Io { .. }));
        assert!(err.to_string().contains("<stdin>"));
    }

    #[test]
    fn orientation_prompt_reads_choice() {
        let mut out = Vec::new();
        let choice = prompt_orientation(&mut Cursor::new("3\n"), &mut out).unwrap();
        assert_eq!(choice, Orientation::PortraitClockwise);
    }
}
