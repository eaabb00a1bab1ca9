use futures::future::{BoxFuture, FutureExt};
use std::future::Future;

use crate::backend::BackendError;

type Compensation<'a> =
    Box<dyn FnOnce() -> BoxFuture<'a, Result<(), BackendError>> + Send + 'a>;

/// Undo log for a multi-step operation against external collaborators.
///
/// Each completed step records how to reverse itself. On a later failure
/// [`compensate`](Saga::compensate) runs the recorded undos newest first.
/// Compensation is best-effort: failures are logged and counted, never
/// returned, so the error that triggered the rollback is the one surfaced.
pub struct Saga<'a> {
    name: &'static str,
    steps: Vec<(&'static str, Compensation<'a>)>,
}

impl<'a> Saga<'a> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            steps: Vec::new(),
        }
    }

    pub fn record<F, Fut>(&mut self, step: &'static str, undo: F)
    where
        F: FnOnce() -> Fut + Send + 'a,
        Fut: Future<Output = Result<(), BackendError>> + Send + 'a,
    {
        self.steps.push((step, Box::new(move || undo().boxed())));
    }

    /// Marks the operation as committed and discards the undo log.
    pub fn complete(mut self) {
        tracing::debug!(saga = self.name, steps = self.steps.len(), "Saga completed");
        self.steps.clear();
    }

    /// Rolls back recorded steps in reverse order. Returns how many undos failed.
    pub async fn compensate(mut self) -> usize {
        let steps = std::mem::take(&mut self.steps);
        let mut failures = 0;

        for (step, undo) in steps.into_iter().rev() {
            match undo().await {
                Ok(()) => tracing::info!(saga = self.name, step, "Compensated step"),
                Err(error) => {
                    failures += 1;
                    tracing::error!(
                        saga = self.name,
                        step,
                        error = %error,
                        "Compensation failed; manual cleanup may be required"
                    );
                }
            }
        }

        failures
    }
}

impl Drop for Saga<'_> {
    fn drop(&mut self) {
        if !self.steps.is_empty() {
            tracing::warn!(
                saga = self.name,
                steps = self.steps.len(),
                "Saga dropped without completing or compensating"
            );
        }
    }
}
