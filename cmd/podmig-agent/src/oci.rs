//! PackageAsImage: wrap a checkpoint archive into a single-layer OCI image
//! layout the host runtime can restore from. The layer holds the archive
//! as a root-level file and the manifest carries the `checkpoint.name`
//! annotation the runtime keys its restore path on.

use anyhow::{Context, Result, bail};
use flate2::Compression;
use flate2::write::GzEncoder;
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use pkg_constants::annotations::CHECKPOINT_IMAGE_ANNOTATION;

const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
const CONFIG_MEDIA_TYPE: &str = "application/vnd.oci.image.config.v1+json";
const LAYER_MEDIA_TYPE: &str = "application/vnd.oci.image.layer.v1.tar+gzip";

/// Working directory that removes itself unless committed, so every error
/// path cleans up the half-built image.
struct WorkDir {
    path: PathBuf,
    committed: bool,
}

impl WorkDir {
    fn create(root: &Path) -> Result<Self> {
        let path = root.join(format!(".work-{}", Uuid::new_v4()));
        fs::create_dir_all(&path)
            .with_context(|| format!("creating work directory {}", path.display()))?;
        Ok(Self {
            path,
            committed: false,
        })
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn commit(mut self, dest: &Path) -> Result<()> {
        if dest.exists() {
            fs::remove_dir_all(dest)
                .with_context(|| format!("replacing existing image {}", dest.display()))?;
        }
        fs::rename(&self.path, dest)
            .with_context(|| format!("committing image to {}", dest.display()))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_dir_all(&self.path);
        }
    }
}

/// Forwards writes while keeping a running SHA-256, so the uncompressed
/// layer digest (diff_id) falls out of the single streaming pass.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish(self) -> (W, String) {
        (self.inner, hex::encode(self.hasher.finalize()))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn oci_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        other => other,
    }
}

/// Image references contain `/` and `:`; flatten them for the on-disk
/// directory name.
fn sanitize_reference(image_name: &str) -> String {
    image_name.replace(['/', ':'], "_")
}

/// Builds single-layer restore images under a fixed storage root.
#[derive(Clone)]
pub struct ImagePackager {
    storage_root: PathBuf,
}

impl ImagePackager {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    /// Package `archive` as `image_name`. Returns the committed image
    /// reference.
    pub fn package(&self, archive: &Path, container_name: &str, image_name: &str) -> Result<String> {
        if !archive.is_file() {
            bail!("checkpoint archive not found: {}", archive.display());
        }
        let archive_file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .context("checkpoint archive has no usable file name")?;

        fs::create_dir_all(&self.storage_root).with_context(|| {
            format!("creating image storage root {}", self.storage_root.display())
        })?;
        let work = WorkDir::create(&self.storage_root)?;
        let blobs = work.path().join("blobs/sha256");
        fs::create_dir_all(&blobs)?;

        // Layer: gzipped tar with the archive at the root. diff_id hashes
        // the tar stream before compression.
        let layer_tmp = work.path().join("layer.tar.gz");
        let diff_id = {
            let file = fs::File::create(&layer_tmp)?;
            let encoder = GzEncoder::new(file, Compression::default());
            let hashing = HashingWriter::new(encoder);
            let mut builder = tar::Builder::new(hashing);
            builder
                .append_path_with_name(archive, archive_file_name)
                .with_context(|| format!("adding {} to the layer", archive.display()))?;
            let hashing = builder.into_inner()?;
            let (encoder, diff_id) = hashing.finish();
            encoder.finish()?.sync_all()?;
            diff_id
        };
        let layer_digest = sha256_file(&layer_tmp)?;
        let layer_size = fs::metadata(&layer_tmp)?.len();
        fs::rename(&layer_tmp, blobs.join(&layer_digest))?;

        // Scratch-based config: nothing but the rootfs diff chain.
        let config_bytes = serde_json::to_vec(&json!({
            "architecture": oci_arch(),
            "os": "linux",
            "config": {},
            "rootfs": {
                "type": "layers",
                "diff_ids": [format!("sha256:{}", diff_id)],
            },
        }))?;
        let config_digest = hex::encode(Sha256::digest(&config_bytes));
        fs::write(blobs.join(&config_digest), &config_bytes)?;

        let manifest_bytes = serde_json::to_vec(&json!({
            "schemaVersion": 2,
            "mediaType": MANIFEST_MEDIA_TYPE,
            "config": {
                "mediaType": CONFIG_MEDIA_TYPE,
                "digest": format!("sha256:{}", config_digest),
                "size": config_bytes.len(),
            },
            "layers": [{
                "mediaType": LAYER_MEDIA_TYPE,
                "digest": format!("sha256:{}", layer_digest),
                "size": layer_size,
            }],
            "annotations": {
                CHECKPOINT_IMAGE_ANNOTATION: container_name,
            },
        }))?;
        let manifest_digest = hex::encode(Sha256::digest(&manifest_bytes));
        fs::write(blobs.join(&manifest_digest), &manifest_bytes)?;

        fs::write(
            work.path().join("index.json"),
            serde_json::to_vec(&json!({
                "schemaVersion": 2,
                "manifests": [{
                    "mediaType": MANIFEST_MEDIA_TYPE,
                    "digest": format!("sha256:{}", manifest_digest),
                    "size": manifest_bytes.len(),
                    "annotations": {
                        "org.opencontainers.image.ref.name": image_name,
                        CHECKPOINT_IMAGE_ANNOTATION: container_name,
                    },
                }],
            }))?,
        )?;
        fs::write(
            work.path().join("oci-layout"),
            br#"{"imageLayoutVersion":"1.0.0"}"#,
        )?;

        let dest = self.storage_root.join(sanitize_reference(image_name));
        work.commit(&dest)?;
        info!(
            image = image_name,
            container = container_name,
            path = %dest.display(),
            "committed checkpoint image"
        );
        Ok(image_name.to_string())
    }
}
