//! Host-level configuration tools (locale generation, tzdata).

use crate::HalResult;

pub trait SystemOps {
    /// Regenerate the compiled locales from `/etc/locale.gen`.
    fn generate_locales(&self) -> HalResult<()>;

    /// Make `locale` the system default `LANG`.
    fn update_locale(&self, locale: &str) -> HalResult<()>;

    /// Re-read `/etc/timezone` into the tzdata configuration.
    fn reconfigure_timezone(&self) -> HalResult<()>;
}
