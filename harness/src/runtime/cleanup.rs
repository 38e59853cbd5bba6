//! Cleanup registration
//!
//! Release actions are pushed as resources are acquired and popped in LIFO
//! order on teardown. Each action runs at most once; a failing or panicking
//! action is reported and the remaining actions still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, warn};

use crate::error::{HarnessError, HarnessResult};

type CleanupFn = Box<dyn FnOnce() -> HarnessResult<()> + Send>;

struct CleanupAction {
    label: String,
    action: CleanupFn,
}

/// Ordered release actions, run in reverse registration order
#[derive(Default)]
pub struct CleanupStack {
    actions: Vec<CleanupAction>,
}

/// What a cleanup run did
#[derive(Debug, Default)]
pub struct CleanupReport {
    /// Labels in execution order
    pub ran: Vec<String>,
    pub failures: Vec<(String, HarnessError)>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl CleanupStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a release action
    pub fn push<F>(&mut self, label: impl Into<String>, action: F)
    where
        F: FnOnce() -> HarnessResult<()> + Send + 'static,
    {
        let label = label.into();
        debug!("📌 Registered cleanup: {}", label);
        self.actions.push(CleanupAction {
            label,
            action: Box::new(action),
        });
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Run every registered action, newest first.
    ///
    /// Failures are logged as warnings and collected; they never stop the run.
    pub fn run(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        while let Some(CleanupAction { label, action }) = self.actions.pop() {
            debug!("🧹 Running cleanup: {}", label);
            match catch_unwind(AssertUnwindSafe(action)) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!("⚠️ Cleanup '{}' failed: {}", label, e);
                    report.failures.push((label.clone(), e));
                }
                Err(payload) => {
                    let message = panic_message(payload.as_ref());
                    warn!("⚠️ Cleanup '{}' panicked: {}", label, message);
                    report
                        .failures
                        .push((label.clone(), HarnessError::invalid_state(format!("cleanup panicked: {message}"))));
                }
            }
            report.ran.push(label);
        }

        report
    }
}

impl Drop for CleanupStack {
    fn drop(&mut self) {
        if !self.actions.is_empty() {
            warn!("🚨 Cleanup stack dropped with {} pending actions; running them now", self.actions.len());
            self.run();
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<&'static str>>>, impl Fn(&'static str) -> CleanupFn) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let log_for_actions = log.clone();
        let make = move |name: &'static str| -> CleanupFn {
            let log = log_for_actions.clone();
            Box::new(move || {
                log.lock().unwrap().push(name);
                Ok(())
            })
        };
        (log, make)
    }

    #[test]
    fn test_runs_in_lifo_order() {
        let (log, make) = recorder();
        let mut stack = CleanupStack::new();
        stack.push("first", make("first"));
        stack.push("second", make("second"));
        stack.push("third", make("third"));
        assert_eq!(stack.len(), 3);

        let report = stack.run();

        assert_eq!(*log.lock().unwrap(), vec!["third", "second", "first"]);
        assert_eq!(report.ran, vec!["third", "second", "first"]);
        assert!(report.is_clean());
        assert!(stack.is_empty());
    }

    #[test]
    fn test_actions_run_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut stack = CleanupStack::new();
        let counter = count.clone();
        stack.push("count", move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        stack.run();
        stack.run();
        drop(stack);

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_and_panic_do_not_stop_the_rest() {
        let (log, make) = recorder();
        let mut stack = CleanupStack::new();
        stack.push("survivor", make("survivor"));
        stack.push("panics", || panic!("boom"));
        stack.push("fails", || Err(HarnessError::config("broken")));

        let report = stack.run();

        assert_eq!(*log.lock().unwrap(), vec!["survivor"]);
        assert_eq!(report.ran, vec!["fails", "panics", "survivor"]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].0, "fails");
        assert!(report.failures[1].1.to_string().contains("boom"));
    }

    #[test]
    fn test_drop_runs_pending_actions() {
        let (log, make) = recorder();
        {
            let mut stack = CleanupStack::new();
            stack.push("on-drop", make("on-drop"));
        }
        assert_eq!(*log.lock().unwrap(), vec!["on-drop"]);
    }
}
