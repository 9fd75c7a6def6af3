//! Declarative object types for the podmig control plane.
//!
//! Every object splits into a `spec` (user intent) and a `status`
//! (observed), carries a single phase enum plus a human-readable message,
//! and names its creator through `owner_ref`. Objects are stored as JSON in
//! the state store; all fields that later versions may add default cleanly.

pub mod checkpoint;
pub mod config;
pub mod content;
pub mod migration;
pub mod node;
pub mod pod;
pub mod validate;
pub mod volume;
