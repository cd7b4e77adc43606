// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Job queue draining
//!
//! Promise reactions and module evaluation steps are queued as engine jobs.
//! The bridge runs them to a fixed point before control returns to the host.

use crate::convert;
use crate::error::ScriptException;
use rquickjs::Runtime;

/// Outcome of one drain
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Jobs run, including the ones that threw
    pub executed: usize,
    /// Exceptions thrown by jobs, in order
    pub failures: Vec<ScriptException>,
}

impl DrainReport {
    /// Whether every job completed without throwing
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Run pending jobs until the queue is empty.
///
/// A job that throws does not stop the drain: its exception is recorded and
/// the remaining jobs still run. Must not be called from inside `Context::with`.
pub(crate) fn drain(runtime: &Runtime) -> DrainReport {
    let mut report = DrainReport::default();

    loop {
        match runtime.execute_pending_job() {
            Ok(true) => report.executed += 1,
            Ok(false) => break,
            Err(job) => {
                report.executed += 1;
                let exception = job.0.with(|ctx| {
                    let thrown = ctx.catch();
                    convert::describe_exception(&ctx, thrown)
                });
                tracing::warn!(
                    event = "jobs.failure",
                    message = %exception.message,
                    "Pending job threw an exception"
                );
                report.failures.push(exception);
            }
        }
    }

    if report.executed > 0 {
        tracing::trace!(
            event = "jobs.drained",
            executed = report.executed,
            failures = report.failures.len()
        );
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Value};

    #[test]
    fn test_drain_runs_reactions() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();

        context.with(|ctx| {
            ctx.eval::<Value, _>(
                "globalThis.steps = []; Promise.resolve().then(() => steps.push(1)).then(() => steps.push(2));",
            )
            .unwrap();
        });

        let report = drain(&runtime);
        assert!(report.executed >= 2);
        assert!(report.is_clean());
        assert!(!runtime.is_job_pending());

        let steps: Vec<i32> = context.with(|ctx| ctx.eval("steps").unwrap());
        assert_eq!(steps, vec![1, 2]);
    }

    #[test]
    fn test_drain_on_empty_queue_is_a_no_op() {
        let runtime = Runtime::new().unwrap();
        let _context = Context::full(&runtime).unwrap();
        assert_eq!(drain(&runtime), DrainReport::default());
    }
}
