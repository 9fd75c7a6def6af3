//! Object store client for the podmig control plane.
//!
//! The store is the single source of truth: reconcilers share nothing in
//! memory and coordinate only through keys under `/registry/`. Deterministic
//! child names rely on [`client::StateStore::create`] for mutual exclusion.

pub mod client;
pub mod keys;
pub mod watch;
