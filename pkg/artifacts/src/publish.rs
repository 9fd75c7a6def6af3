use crate::uri::ArtifactUri;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Publishes checkpoint archives into the shared store.
///
/// Publication is write-then-rename: the archive is streamed to a
/// `.partial` sibling, fsynced, and renamed into place, so a reader never
/// observes a half-written archive under its final name. The control plane
/// additionally gates reads on Content-object existence, which makes the
/// Content the completion marker.
pub struct Publisher {
    shared_mount: PathBuf,
}

impl Publisher {
    pub fn new(shared_mount: impl Into<PathBuf>) -> Self {
        Self {
            shared_mount: shared_mount.into(),
        }
    }

    /// Flat filename convention: `<podUID>-<container>-<UTC timestamp>.tar`.
    pub fn archive_filename(pod_uid: &str, container: &str, at: DateTime<Utc>) -> String {
        format!(
            "{}-{}-{}.tar",
            pod_uid,
            container,
            at.format("%Y%m%d-%H%M%S")
        )
    }

    /// Copy `local_archive` into the shared store and return its
    /// `shared://` URI. Retries the copy once; if the store is still
    /// unavailable, falls back to a `file://` URI pointing at the local
    /// archive and reports success, since a node-local restore is still possible.
    pub fn publish_or_fallback(
        &self,
        local_archive: &Path,
        pod_uid: &str,
        container: &str,
    ) -> ArtifactUri {
        let filename = Self::archive_filename(pod_uid, container, Utc::now());
        for attempt in 1..=2 {
            match self.copy_into_store(local_archive, &filename) {
                Ok(()) => {
                    info!(
                        archive = %local_archive.display(),
                        %filename,
                        "published checkpoint archive to shared store"
                    );
                    return ArtifactUri::Shared { filename };
                }
                Err(e) => {
                    warn!(
                        attempt,
                        archive = %local_archive.display(),
                        error = %e,
                        "publication to shared store failed"
                    );
                }
            }
        }
        warn!(
            archive = %local_archive.display(),
            "falling back to host-local artifact URI"
        );
        ArtifactUri::File {
            path: local_archive.to_path_buf(),
        }
    }

    fn copy_into_store(&self, local_archive: &Path, filename: &str) -> Result<()> {
        let final_path = self.shared_mount.join(filename);
        let partial_path = self.shared_mount.join(format!("{}.partial", filename));

        fs::copy(local_archive, &partial_path).with_context(|| {
            format!(
                "copying {} to {}",
                local_archive.display(),
                partial_path.display()
            )
        })?;

        // Durability barrier before the rename makes the file visible.
        let file = fs::File::open(&partial_path)
            .with_context(|| format!("reopening {}", partial_path.display()))?;
        file.sync_all()
            .with_context(|| format!("fsync {}", partial_path.display()))?;

        fs::rename(&partial_path, &final_path).with_context(|| {
            format!(
                "renaming {} to {}",
                partial_path.display(),
                final_path.display()
            )
        })?;

        // Persist the rename itself; failure here is not worth unpublishing.
        if let Ok(dir) = fs::File::open(&self.shared_mount) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}
