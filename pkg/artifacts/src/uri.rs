use anyhow::{Result, bail};
use std::path::{Path, PathBuf};

/// Scheme-prefixed reference locating a checkpoint archive.
///
/// `shared://<filename>` names an object in the shared store, resolvable on
/// every node through the fixed mount point. `file://<absolute-path>` is a
/// host-local fallback used only when the shared store was unavailable at
/// publication time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactUri {
    Shared { filename: String },
    File { path: PathBuf },
}

impl ArtifactUri {
    /// Parse a URI string. Anything but the two known schemes is an error;
    /// a reconciler must not guess at a scheme it cannot resolve.
    pub fn parse(s: &str) -> Result<Self> {
        if let Some(filename) = s.strip_prefix("shared://") {
            if filename.is_empty() || filename.contains('/') {
                bail!("invalid shared artifact URI '{}': expected a bare filename", s);
            }
            return Ok(ArtifactUri::Shared {
                filename: filename.to_string(),
            });
        }
        if let Some(path) = s.strip_prefix("file://") {
            if !path.starts_with('/') {
                bail!("invalid file artifact URI '{}': path must be absolute", s);
            }
            return Ok(ArtifactUri::File {
                path: PathBuf::from(path),
            });
        }
        bail!("unsupported artifact URI scheme in '{}'", s);
    }

    /// The local filesystem path this URI denotes on a node with the shared
    /// store mounted at `shared_mount`.
    pub fn resolve(&self, shared_mount: &Path) -> PathBuf {
        match self {
            ArtifactUri::Shared { filename } => shared_mount.join(filename),
            ArtifactUri::File { path } => path.clone(),
        }
    }
}

impl std::fmt::Display for ArtifactUri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtifactUri::Shared { filename } => write!(f, "shared://{}", filename),
            ArtifactUri::File { path } => write!(f, "file://{}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_both_schemes() {
        assert_eq!(
            ArtifactUri::parse("shared://abc-c-20260801-120000.tar").unwrap(),
            ArtifactUri::Shared {
                filename: "abc-c-20260801-120000.tar".to_string()
            }
        );
        assert_eq!(
            ArtifactUri::parse("file:///tmp/ckpt.tar").unwrap(),
            ArtifactUri::File {
                path: PathBuf::from("/tmp/ckpt.tar")
            }
        );
    }

    #[test]
    fn rejects_unknown_and_malformed() {
        assert!(ArtifactUri::parse("oci://repo/image:tag").is_err());
        assert!(ArtifactUri::parse("shared://").is_err());
        assert!(ArtifactUri::parse("shared://a/b.tar").is_err());
        assert!(ArtifactUri::parse("file://relative.tar").is_err());
        assert!(ArtifactUri::parse("/bare/path.tar").is_err());
    }

    #[test]
    fn display_roundtrips() {
        for s in ["shared://x.tar", "file:///mnt/local/x.tar"] {
            assert_eq!(ArtifactUri::parse(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn resolves_against_the_mount() {
        let uri = ArtifactUri::parse("shared://x.tar").unwrap();
        assert_eq!(
            uri.resolve(Path::new("/mnt/checkpoints")),
            PathBuf::from("/mnt/checkpoints/x.tar")
        );
        let local = ArtifactUri::parse("file:///data/x.tar").unwrap();
        assert_eq!(local.resolve(Path::new("/mnt/checkpoints")), PathBuf::from("/data/x.tar"));
    }
}
