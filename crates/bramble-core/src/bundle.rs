//! Provisioning of the embedded runtime support bundle.
//!
//! The helper process and the test-server template ship inside the crate as
//! a single compressed archive (`resources/runtime-bundle.zip`). On first
//! use per version the archive is unpacked into a version-scoped cache
//! directory under `~/.bramble` and a zero-byte `extracted` marker is
//! written. The marker is written only after the archive has been fully
//! unpacked and removed, so a crash mid-extraction leaves no marker and the
//! next call starts over cleanly.
//!
//! Concurrent first-time extraction from multiple independent processes is
//! a known race (last writer's marker wins) and is intentionally not
//! guarded by a lock; parallel test processes must provision serially or
//! accept the race.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// The runtime bundle compiled into the distributable artifact.
const RUNTIME_BUNDLE: &[u8] = include_bytes!("../resources/runtime-bundle.zip");

/// Completion marker file, present only after a successful extraction.
const MARKER_NAME: &str = "extracted";

/// On-disk name of the archive while it is being unpacked.
const ARCHIVE_NAME: &str = "runtime-bundle.zip";

/// Errors raised while provisioning the runtime bundle.
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The embedded archive is empty: the distributable was mispackaged.
    #[error("embedded runtime bundle is missing from this build, the packaged artifact is corrupt")]
    MissingBundle,

    /// The cache directory could not be created.
    #[error("can't create runtime extraction directory {}: {source}", .dir.display())]
    CreateDir {
        /// The directory that could not be created.
        dir: PathBuf,
        /// The underlying filesystem error.
        source: std::io::Error,
    },

    /// The archive could not be unpacked.
    #[error("failed to unpack runtime bundle into {}: {source}", .dir.display())]
    Extract {
        /// The extraction target directory.
        dir: PathBuf,
        /// The underlying archive error.
        source: zip::result::ZipError,
    },

    /// Any other filesystem error during provisioning.
    #[error("I/O error while provisioning runtime bundle: {0}")]
    Io(#[from] std::io::Error),
}

/// Process-wide cache root: `~/.bramble`, or the system temp root when no
/// home directory can be determined.
fn cache_root() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(".bramble"))
        .unwrap_or_else(std::env::temp_dir)
}

/// Ensures the runtime bundle for `version` exists on disk and returns its
/// directory.
///
/// Cheap after the first call for a given version: the marker check is one
/// `stat`. The cache lives outside any working directory so independent
/// runs of the same library version share one extraction.
pub fn ensure(version: &str) -> Result<PathBuf, ProvisionError> {
    ensure_in(&cache_root(), version)
}

/// [`ensure`] against an explicit cache root. Exposed so tests can provision
/// into a scratch directory instead of the shared temp root.
pub fn ensure_in(root: &Path, version: &str) -> Result<PathBuf, ProvisionError> {
    if RUNTIME_BUNDLE.is_empty() {
        return Err(ProvisionError::MissingBundle);
    }

    let dir = root.join(format!("bramble-runtime-{version}"));
    let marker = dir.join(MARKER_NAME);
    if marker.exists() {
        debug!(dir = %dir.display(), "runtime bundle already extracted");
        return Ok(dir);
    }

    fs::create_dir_all(&dir).map_err(|source| ProvisionError::CreateDir {
        dir: dir.clone(),
        source,
    })?;

    let archive_path = dir.join(ARCHIVE_NAME);
    fs::write(&archive_path, RUNTIME_BUNDLE)?;

    let archive = fs::File::open(&archive_path)?;
    zip::ZipArchive::new(archive)
        .and_then(|mut archive| archive.extract(&dir))
        .map_err(|source| ProvisionError::Extract {
            dir: dir.clone(),
            source,
        })?;

    fs::remove_file(&archive_path)?;
    fs::File::create(&marker)?;

    info!(version, dir = %dir.display(), "runtime bundle extracted");
    Ok(dir)
}

/// Path of the helper-process executable inside an extracted bundle.
pub fn server_binary(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join("bin").join("bramble-server")
}

/// Path of the test-server template inside an extracted bundle.
pub fn server_template(bundle_dir: &Path) -> PathBuf {
    bundle_dir.join("server").join("test-server-template.apk")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_extracts_bundle_contents() {
        let root = tempfile::tempdir().unwrap();

        let dir = ensure_in(root.path(), "test-extract").unwrap();

        assert!(server_binary(&dir).exists());
        assert!(server_template(&dir).exists());
        assert!(dir.join(MARKER_NAME).exists());
        // The staged archive must not be left behind.
        assert!(!dir.join(ARCHIVE_NAME).exists());
    }

    #[test]
    fn second_ensure_is_a_no_op() {
        let root = tempfile::tempdir().unwrap();

        let first = ensure_in(root.path(), "test-idempotent").unwrap();
        // Remove an extracted file; if the second call re-ran the extraction
        // it would come back.
        fs::remove_file(server_template(&first)).unwrap();

        let second = ensure_in(root.path(), "test-idempotent").unwrap();

        assert_eq!(first, second);
        assert!(!server_template(&second).exists());
    }

    #[test]
    fn marker_alone_short_circuits() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("bramble-runtime-test-marker");
        fs::create_dir_all(&dir).unwrap();
        fs::File::create(dir.join(MARKER_NAME)).unwrap();

        let resolved = ensure_in(root.path(), "test-marker").unwrap();

        assert_eq!(resolved, dir);
        // Nothing was extracted; the marker was trusted.
        assert!(!server_binary(&dir).exists());
    }

    #[test]
    fn versions_extract_side_by_side() {
        let root = tempfile::tempdir().unwrap();

        let a = ensure_in(root.path(), "1.0.0").unwrap();
        let b = ensure_in(root.path(), "2.0.0").unwrap();

        assert_ne!(a, b);
        assert!(server_binary(&a).exists());
        assert!(server_binary(&b).exists());
    }

    #[test]
    fn unwritable_root_reports_create_dir() {
        // A file where the cache directory should go forces the failure.
        let root = tempfile::tempdir().unwrap();
        let blocker = root.path().join("bramble-runtime-blocked");
        fs::write(&blocker, b"not a directory").unwrap();

        let err = ensure_in(root.path(), "blocked").unwrap_err();
        match err {
            ProvisionError::CreateDir { dir, .. } => assert_eq!(dir, blocker),
            other => panic!("expected CreateDir, got: {other:?}"),
        }
    }
}
