// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Built-in handlers for `env.callHostAsync` requests.
//!
//! Requests are routed on their `function_name`:
//!
//! - `echo` resolves with the request payload
//! - `sleep` waits `duration` milliseconds, then resolves with `null`
//!
//! Handlers run on the serving thread. `sleep` blocks that thread for the
//! whole duration, so a REPL or FFI host driving the bridge stalls until it
//! returns. It is a demo handler for exercising the async bridge, not a timer.

use qjsbridge_core::{AsyncOutcome, AsyncRequest, Bridge, Completion};
use std::time::Duration;

/// What to do with requests no built-in handler knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unknown {
    /// Reject them with a `HostCallError`
    Reject,
    /// Leave them pending and hand them back to the caller
    Hold,
}

/// Outcome of a built-in handler, or `None` when no handler matches.
pub fn builtin(request: &AsyncRequest) -> Option<AsyncOutcome> {
    match request.function_name()? {
        "echo" => Some(AsyncOutcome::ResolveJson(request.payload.clone())),
        "sleep" => {
            let millis = request
                .payload
                .get("duration")
                .and_then(serde_json::Value::as_u64)
                .unwrap_or(0);
            tracing::debug!(event = "cli.sleep", call_id = %request.call_id, millis);
            std::thread::sleep(Duration::from_millis(millis));
            Some(AsyncOutcome::ResolveJson(serde_json::Value::Null))
        }
        _ => None,
    }
}

/// Serve queued requests until none are left, including requests made by
/// the reactions of completed ones.
///
/// Returns the requests left pending under [`Unknown::Hold`].
pub fn serve(bridge: &mut Bridge, unknown: Unknown) -> anyhow::Result<Vec<AsyncRequest>> {
    let mut held = Vec::new();

    loop {
        let requests = bridge.take_async_requests();
        if requests.is_empty() {
            return Ok(held);
        }

        for request in requests {
            let outcome = match (builtin(&request), unknown) {
                (Some(outcome), _) => outcome,
                (None, Unknown::Reject) => AsyncOutcome::Reject(match request.function_name() {
                    Some(name) => format!("unknown host function '{name}'"),
                    None => "request has no function_name".to_string(),
                }),
                (None, Unknown::Hold) => {
                    held.push(request);
                    continue;
                }
            };

            let completion = bridge.complete_async_call(request.call_id, outcome)?;
            if !matches!(completion, Completion::Resolved | Completion::Rejected) {
                tracing::warn!(event = "cli.serve.stale", call_id = %request.call_id, ?completion);
            }
        }
    }
}
