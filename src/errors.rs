//! The domain error taxonomy surfaced to operators.
//!
//! Every variant except [`ReleaseError::Remote`] is a precondition
//! failure raised before any remote mutation begins. Once mutation has
//! started, failures propagate as `Remote` with no rollback: re-running
//! `publish-docs` converges, a failed `upload-packages` merge needs
//! operator inspection or a retry from scratch.

use thiserror::Error;

use crate::contract::BoxError;
use crate::version::InvalidPreReleaseNumber;

#[derive(Debug, Error)]
pub enum ReleaseError {
    /// The requested version is neither a marketing nor a weekly release.
    #[error("version is not a marketing or weekly release")]
    NotARelease,

    /// Production publish requested for a build whose tag does not match
    /// the documentation version being published.
    #[error("can't publish an untagged version to production")]
    NotTagged,

    /// Package upload requested for a documentation-only release, which
    /// must not ship binaries.
    #[error("can't upload packages for a documentation release")]
    DocumentationRelease,

    #[error(transparent)]
    Version(#[from] InvalidPreReleaseNumber),

    /// A remote call or an external tool failed. Partial remote state may
    /// remain.
    #[error("remote operation failed: {0}")]
    Remote(#[source] BoxError),
}
