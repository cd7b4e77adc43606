// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Per-thread bridge state behind the exports

use crate::status::{Failure, Status};
use qjsbridge_core::{AsyncRequest, Bridge};
use std::cell::RefCell;
use std::collections::VecDeque;

#[derive(Default)]
pub(crate) struct FfiState {
    pub(crate) bridge: Option<Bridge>,
    pub(crate) last_error: Option<String>,
    /// Backs the buffer most recently returned to the caller
    output: Vec<u8>,
    /// Requests taken from the bridge, handed out one at a time
    pub(crate) requests: VecDeque<AsyncRequest>,
}

thread_local! {
    static STATE: RefCell<FfiState> = RefCell::new(FfiState::default());
}

impl FfiState {
    pub(crate) fn bridge(&mut self) -> Result<&mut Bridge, Failure> {
        self.bridge.as_mut().ok_or_else(|| {
            Failure::new(
                Status::NotInitialized,
                "no bridge is initialized on this thread",
            )
        })
    }

    /// Keep `bytes` alive until the next call and return where they live.
    pub(crate) fn hold(&mut self, bytes: Vec<u8>) -> (*const u8, usize) {
        self.output = bytes;
        (self.output.as_ptr(), self.output.len())
    }
}

/// Run an export against this thread's state.
///
/// A call made while another export is running on the same thread (from a
/// host function or dispatcher) returns [`Status::Busy`].
pub(crate) fn run<F>(operation: &'static str, f: F) -> i32
where
    F: FnOnce(&mut FfiState) -> Result<(), Failure>,
{
    STATE.with(|cell| {
        let Ok(mut state) = cell.try_borrow_mut() else {
            tracing::warn!(
                event = "ffi.busy",
                operation,
                "Bridge re-entered while a call was running"
            );
            return Status::Busy.code();
        };

        match f(&mut state) {
            Ok(()) => {
                state.last_error = None;
                Status::Ok.code()
            }
            Err(failure) => {
                tracing::debug!(
                    event = "ffi.failure",
                    operation,
                    status = failure.status.code(),
                    message = %failure.message
                );
                state.last_error = Some(failure.message);
                failure.status.code()
            }
        }
    })
}

/// Like [`run`], without touching the recorded error.
pub(crate) fn inspect<F>(f: F) -> i32
where
    F: FnOnce(&mut FfiState) -> Result<(), Failure>,
{
    STATE.with(|cell| match cell.try_borrow_mut() {
        Ok(mut state) => match f(&mut state) {
            Ok(()) => Status::Ok.code(),
            Err(failure) => failure.status.code(),
        },
        Err(_) => Status::Busy.code(),
    })
}
