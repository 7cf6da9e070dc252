//! Progress reporting for dataset builds.
//!
//! The builder only knows this trait; terminal rendering lives in the CLI
//! utilities crate.

use std::sync::Arc;

/// Receives progress of a long-running build step.
///
/// Shared through an `Arc`, so implementations must be `Send + Sync`.
pub trait ProgressCallback: Send + Sync {
    /// Units of work the current step will perform.
    fn set_total(&self, total: u64);

    /// `delta` more units are done.
    fn inc(&self, delta: u64);

    /// Names the step now running.
    fn set_message(&self, msg: String);

    /// The build finished; `msg` summarizes it.
    fn finish(&self, msg: String);
}

/// Discards every update.
pub struct NullProgress;

impl ProgressCallback for NullProgress {
    fn set_total(&self, _total: u64) {}
    fn inc(&self, _delta: u64) {}
    fn set_message(&self, _msg: String) {}
    fn finish(&self, _msg: String) {}
}

#[must_use]
pub fn null_progress() -> Arc<dyn ProgressCallback> {
    Arc::new(NullProgress)
}
