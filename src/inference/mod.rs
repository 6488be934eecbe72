//! Inference over persisted bundles
//!
//! Loads the bundle of a trained family, replays its fitted transformation
//! pipeline with `transform` and decodes class predictions back to the
//! original labels.

mod service;

pub use service::InferenceService;
