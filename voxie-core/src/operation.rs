//! Cooperative cancellation and progress reporting for long-running work

use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

type ProgressCallback = dyn Fn(f32) + Send + Sync;

struct OperationState {
    cancelled: AtomicBool,
    // f32 bits
    progress: AtomicU32,
    callback: Option<Box<ProgressCallback>>,
}

/// Handle shared between the caller and a running algorithm.
///
/// Cloning is cheap; all clones observe the same cancellation flag and
/// progress value. Algorithms poll [`Operation::check_cancelled`] at a coarse
/// granularity (once per z layer for the surface extractors) and stop with
/// [`Error::Cancelled`] instead of returning partial output.
#[derive(Clone)]
pub struct Operation {
    state: Arc<OperationState>,
}

impl Operation {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create an operation that forwards every progress update to `callback`
    pub fn with_progress_callback<F>(callback: F) -> Self
    where
        F: Fn(f32) + Send + Sync + 'static,
    {
        Self::build(Some(Box::new(callback)))
    }

    fn build(callback: Option<Box<ProgressCallback>>) -> Self {
        Self {
            state: Arc::new(OperationState {
                cancelled: AtomicBool::new(false),
                progress: AtomicU32::new(0.0f32.to_bits()),
                callback,
            }),
        }
    }

    /// Request cancellation. The running algorithm stops at its next check.
    pub fn cancel(&self) {
        self.state.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    /// Returns `Err(Error::Cancelled)` once [`Operation::cancel`] was called
    pub fn check_cancelled(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Record progress in `[0, 1]`; values outside are clamped
    pub fn update_progress(&self, fraction: f32) {
        let fraction = if fraction.is_nan() {
            0.0
        } else {
            fraction.clamp(0.0, 1.0)
        };
        self.state
            .progress
            .store(fraction.to_bits(), Ordering::Relaxed);
        if let Some(callback) = &self.state.callback {
            callback(fraction);
        }
    }

    pub fn progress(&self) -> f32 {
        f32::from_bits(self.state.progress.load(Ordering::Relaxed))
    }
}

impl Default for Operation {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("cancelled", &self.is_cancelled())
            .field("progress", &self.progress())
            .finish()
    }
}
