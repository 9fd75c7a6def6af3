//! Shared artifact store contract.
//!
//! A single read-write-many filesystem namespace is mounted at the same
//! path on every node. Agents publish checkpoint archives into it; target
//! nodes resolve `shared://` URIs back to local paths under the mount.
//! The store's internal layout belongs to the provisioner; this crate
//! commits only to the flat filename convention and the URI grammar.

pub mod publish;
pub mod uri;

pub use publish::Publisher;
pub use uri::ArtifactUri;
