//! Staple cleanup.

use tracing::debug;

use crate::domain::Subject;

/// Delete the cached OCSP staple of `subject`, if there is one.
///
/// Used when a subject's data turned out to be invalid so a stale staple
/// can't be served any more. Best effort: failures (including a missing file)
/// are logged at debug level. Returns whether a file was removed.
pub fn delete_staple(subject: &dyn Subject) -> bool {
    let staple = subject.staple_path();
    debug!(staple = %staple.display(), "deleting OCSP staple if it exists");
    match std::fs::remove_file(&staple) {
        Ok(()) => true,
        Err(e) => {
            debug!(
                staple = %staple.display(),
                error = %e,
                "can't delete OCSP staple, maybe it doesn't exist"
            );
            false
        }
    }
}
