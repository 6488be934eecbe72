//! Bundle persistence and export
//!
//! A trained family is persisted as one self-describing JSON bundle:
//! - the fitted model and the fitted transformation pipeline
//! - label classes and post-transform feature names
//! - search outcome, training timestamp and a data fingerprint

mod bundle;
mod store;

pub use bundle::TrainedBundle;
pub use store::{BundleStore, FileBundleStore, MemoryBundleStore};
