//! TypeState wrapper for provisioning configs (unvalidated -> validated).
//!
//! Steps only ever receive a [`ValidatedConfig`], so a run cannot start from a config that
//! would fail halfway through on a bad account name or a missing SSH key.

use kiosk_error::KioskResult;
use std::ops::Deref;

pub trait ValidateConfig {
    fn validate_cfg(&self) -> KioskResult<()>;
}

#[derive(Debug, Clone)]
pub struct UnvalidatedConfig<T>(pub T);

#[derive(Debug, Clone)]
pub struct ValidatedConfig<T>(T);

impl<T> UnvalidatedConfig<T> {
    pub fn new(cfg: T) -> Self {
        Self(cfg)
    }
}

impl<T: ValidateConfig> UnvalidatedConfig<T> {
    pub fn validate(self) -> KioskResult<ValidatedConfig<T>> {
        self.0.validate_cfg()?;
        Ok(ValidatedConfig(self.0))
    }
}

impl<T> ValidatedConfig<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> Deref for ValidatedConfig<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiosk_error::KioskError;

    struct Flag(bool);

    impl ValidateConfig for Flag {
        fn validate_cfg(&self) -> KioskResult<()> {
            if self.0 {
                Ok(())
            } else {
                Err(KioskError::ValidationFailed("flag unset".to_string()))
            }
        }
    }

    #[test]
    fn valid_config_passes_through() {
        let validated = UnvalidatedConfig::new(Flag(true)).validate().unwrap();
        assert!(validated.0 .0);
        assert!(validated.into_inner().0);
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(UnvalidatedConfig::new(Flag(false)).validate().is_err());
    }
}
