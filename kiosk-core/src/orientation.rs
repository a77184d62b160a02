//! Display orientation chosen by the operator.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Portrait, monitor rotated counter-clockwise.
    PortraitCounterClockwise,
    Landscape,
    /// Portrait, monitor rotated clockwise.
    PortraitClockwise,
}

impl Orientation {
    pub const DEFAULT: Orientation = Orientation::Landscape;

    /// Map operator input to an orientation. Anything other than `1`, `2` or `3`
    /// (surrounding whitespace ignored) falls back to landscape.
    pub fn resolve(input: &str) -> Self {
        match input.trim() {
            "1" => Orientation::PortraitCounterClockwise,
            "2" => Orientation::Landscape,
            "3" => Orientation::PortraitClockwise,
            "" => Self::DEFAULT,
            other => {
                log::warn!("Invalid orientation value '{other}', assuming landscape");
                Self::DEFAULT
            }
        }
    }

    /// Value written to `display_rotate=` in the boot configuration.
    pub fn rotate_value(self) -> u8 {
        match self {
            Orientation::PortraitCounterClockwise => 1,
            Orientation::Landscape => 2,
            Orientation::PortraitClockwise => 3,
        }
    }

    pub fn boot_config_line(self) -> String {
        format!("display_rotate={}", self.rotate_value())
    }
}

impl Default for Orientation {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::PortraitCounterClockwise => {
                write!(f, "portrait (rotated counter-clockwise)")
            }
            Orientation::Landscape => write!(f, "landscape"),
            Orientation::PortraitClockwise => write!(f, "portrait (rotated clockwise)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_map_to_rotation_values() {
        assert_eq!(Orientation::resolve("1").rotate_value(), 1);
        assert_eq!(Orientation::resolve("2").rotate_value(), 2);
        assert_eq!(Orientation::resolve("3").rotate_value(), 3);
    }

    #[test]
    fn blank_and_unknown_input_use_landscape() {
        for input in ["", "   ", "9", "landscape", "0"] {
            assert_eq!(Orientation::resolve(input), Orientation::Landscape);
        }
    }

    #[test]
    fn whitespace_around_choice_is_ignored() {
        assert_eq!(
            Orientation::resolve(" 1\n"),
            Orientation::PortraitCounterClockwise
        );
    }

    #[test]
    fn invalid_choice_writes_landscape_line() {
        assert_eq!(
            Orientation::resolve("9").boot_config_line(),
            "display_rotate=2"
        );
    }
}
