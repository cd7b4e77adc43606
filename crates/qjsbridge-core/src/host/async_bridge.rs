// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Async host calls
//!
//! Script calls `env.callHostAsync(payload)` and gets a pending promise back.
//! The bridge keeps the promise's resolve/reject pair under a fresh
//! [`AsyncCallId`] and forwards an [`AsyncRequest`] to the host. The host
//! answers later through [`crate::Bridge::complete_async_call`], which settles
//! the promise and drains the job queue.
//!
//! ```text
//! script                        bridge                         host
//!   |-- callHostAsync(p) ------->|                               |
//!   |<-- pending promise --------|-- AsyncRequest{id, p} ------->|
//!   |                            |<-- complete_async_call(id) ---|
//!   |<-- reactions run ----------|                               |
//! ```

use super::host_call_error;
use crate::convert::js_to_json;
use rquickjs::function::Opt;
use rquickjs::{Ctx, Function, Object, Persistent, Value};
use std::cell::RefCell;
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::rc::Rc;

/// Correlation id of one async host call. Never reused within a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AsyncCallId(u64);

impl AsyncCallId {
    /// Rebuild an id from the integer a host stored.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Integer form passed to hosts.
    pub const fn into_raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AsyncCallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "call-{}", self.0)
    }
}

/// A request forwarded to the host
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncRequest {
    /// Id to complete the call with
    pub call_id: AsyncCallId,
    /// The argument script passed, as JSON
    pub payload: serde_json::Value,
}

impl AsyncRequest {
    /// The payload's `function_name` field, which hosts route on.
    pub fn function_name(&self) -> Option<&str> {
        self.payload.get("function_name")?.as_str()
    }
}

/// Receives async requests as script makes them.
///
/// Dispatchers run inside the script call that made the request and must not
/// call back into the bridge.
pub trait AsyncDispatcher {
    /// Accept one request.
    fn dispatch(&mut self, request: AsyncRequest);
}

impl<F> AsyncDispatcher for F
where
    F: FnMut(AsyncRequest),
{
    fn dispatch(&mut self, request: AsyncRequest) {
        self(request)
    }
}

/// How the host settles a call
#[derive(Debug, Clone, PartialEq)]
pub enum AsyncOutcome {
    /// Resolve with an existing value
    Resolve(crate::ValueHandle),
    /// Resolve with a value built from JSON
    ResolveJson(serde_json::Value),
    /// Reject with an `Error` named `HostCallError` carrying this message
    Reject(String),
}

/// What [`crate::Bridge::complete_async_call`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Completion {
    /// The promise was resolved
    Resolved,
    /// The promise was rejected
    Rejected,
    /// The call was settled before; nothing changed
    AlreadySettled,
    /// No call with this id was ever made
    Unknown,
}

struct PendingAsyncCall {
    resolve: Persistent<Function<'static>>,
    reject: Persistent<Function<'static>>,
}

impl PendingAsyncCall {
    fn settle<'js>(
        &self,
        ctx: &Ctx<'js>,
        settlement: Result<Value<'js>, String>,
    ) -> rquickjs::Result<Completion> {
        match settlement {
            Ok(value) => {
                let resolve = self.resolve.clone().restore(ctx)?;
                resolve.call::<_, ()>((value,))?;
                Ok(Completion::Resolved)
            }
            Err(message) => {
                let reject = self.reject.clone().restore(ctx)?;
                reject.call::<_, ()>((host_call_error(ctx, &message)?,))?;
                Ok(Completion::Rejected)
            }
        }
    }
}

/// Pending calls of one bridge, shared with the script-side entry point.
pub(crate) struct PendingAsyncCalls {
    next_id: u64,
    pending: BTreeMap<AsyncCallId, PendingAsyncCall>,
    dispatcher: Option<Box<dyn AsyncDispatcher>>,
    queue: VecDeque<AsyncRequest>,
}

pub(crate) type SharedAsyncCalls = Rc<RefCell<PendingAsyncCalls>>;

impl PendingAsyncCalls {
    pub(crate) fn new() -> Self {
        Self {
            next_id: 1,
            pending: BTreeMap::new(),
            dispatcher: None,
            queue: VecDeque::new(),
        }
    }

    fn register<'js>(
        &mut self,
        ctx: &Ctx<'js>,
        resolve: Function<'js>,
        reject: Function<'js>,
        payload: serde_json::Value,
    ) -> AsyncRequest {
        let call_id = AsyncCallId(self.next_id);
        self.next_id += 1;
        self.pending.insert(
            call_id,
            PendingAsyncCall {
                resolve: Persistent::save(ctx, resolve),
                reject: Persistent::save(ctx, reject),
            },
        );
        tracing::trace!(
            event = "promise_bridge.register",
            %call_id,
            pending_count = self.pending.len()
        );
        AsyncRequest { call_id, payload }
    }

    pub(crate) fn set_dispatcher(&mut self, dispatcher: Option<Box<dyn AsyncDispatcher>>) {
        self.dispatcher = dispatcher;
    }

    pub(crate) fn take_queued(&mut self) -> Vec<AsyncRequest> {
        self.queue.drain(..).collect()
    }

    pub(crate) fn pending_ids(&self) -> Vec<AsyncCallId> {
        self.pending.keys().copied().collect()
    }

    /// Remove a call for settlement, or say why there is none.
    fn take(&mut self, call_id: AsyncCallId) -> Result<PendingAsyncCall, Completion> {
        if let Some(call) = self.pending.remove(&call_id) {
            return Ok(call);
        }
        if call_id.0 != 0 && call_id.0 < self.next_id {
            Err(Completion::AlreadySettled)
        } else {
            Err(Completion::Unknown)
        }
    }

    /// Drop every pending call, returning their ids.
    pub(crate) fn clear(&mut self) -> Vec<AsyncCallId> {
        let ids = self.pending_ids();
        self.pending.clear();
        self.queue.clear();
        self.dispatcher = None;
        ids
    }
}

/// Hand a request to the dispatcher, or queue it when there is none.
fn dispatch(calls: &SharedAsyncCalls, request: AsyncRequest) {
    // The dispatcher is taken out so it can run without the table borrowed.
    let dispatcher = calls.borrow_mut().dispatcher.take();
    match dispatcher {
        Some(mut dispatcher) => {
            dispatcher.dispatch(request);
            let mut calls = calls.borrow_mut();
            if calls.dispatcher.is_none() {
                calls.dispatcher = Some(dispatcher);
            }
        }
        None => calls.borrow_mut().queue.push_back(request),
    }
}

/// Settle call `call_id`. The caller drains jobs afterwards.
pub(crate) fn settle<'js>(
    calls: &SharedAsyncCalls,
    ctx: &Ctx<'js>,
    call_id: AsyncCallId,
    settlement: Result<Value<'js>, String>,
) -> crate::Result<Completion> {
    let taken = calls.borrow_mut().take(call_id);
    let call = match taken {
        Ok(call) => call,
        Err(status) => {
            tracing::warn!(
                event = "promise_bridge.complete.ignored",
                %call_id,
                ?status,
                "Completion for a call that is not pending"
            );
            return Ok(status);
        }
    };

    let completion = match call.settle(ctx, settlement) {
        Ok(completion) => completion,
        Err(err) => {
            // Still unsettled, so the host can try again.
            calls.borrow_mut().pending.insert(call_id, call);
            tracing::warn!(event = "promise_bridge.complete.failed", %call_id);
            return Err(crate::convert::to_bridge_error(ctx, err));
        }
    };
    tracing::trace!(
        event = "promise_bridge.complete",
        %call_id,
        ?completion,
        remaining = calls.borrow().pending.len()
    );
    Ok(completion)
}

/// Install the async entry point as `namespace[name]`.
pub(crate) fn install<'js>(
    ctx: &Ctx<'js>,
    namespace: &Object<'js>,
    name: &str,
    calls: SharedAsyncCalls,
) -> rquickjs::Result<()> {
    let entry = Function::new(
        ctx.clone(),
        move |ctx: Ctx<'js>, payload: Opt<Value<'js>>| -> rquickjs::Result<Value<'js>> {
            let payload = match payload.0 {
                Some(value) => js_to_json(&value)?,
                None => serde_json::Value::Null,
            };
            let (promise, resolve, reject) = ctx.promise()?;
            let request = calls.borrow_mut().register(&ctx, resolve, reject, payload);
            tracing::debug!(
                event = "promise_bridge.dispatch",
                call_id = %request.call_id,
                function_name = request.function_name().unwrap_or("<none>")
            );
            dispatch(&calls, request);
            Ok(promise.into_value())
        },
    )?
    .with_name(name)?;
    entry.set_length(1)?;
    namespace.set(name, entry)
}
