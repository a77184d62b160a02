use crate::HalResult;
use std::path::Path;

/// Remote archive retrieval.
pub trait ArchiveOps {
    /// Download a gzip'd tarball and unpack it into `destination`, which must already exist.
    fn fetch_and_extract(&self, url: &str, destination: &Path) -> HalResult<()>;
}
