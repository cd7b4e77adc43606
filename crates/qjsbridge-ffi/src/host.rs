// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Adapters from raw C callbacks to the bridge's host traits

use crate::memory;
use qjsbridge_core::{AsyncRequest, HostFunction};
use std::ptr;

/// Buffer a host function fills in.
///
/// The host allocates `ptr` with `qjsbridge_alloc`; the bridge copies the
/// bytes and frees them with `qjsbridge_free`.
#[repr(C)]
#[derive(Debug)]
pub struct HostReturn {
    /// Start of the buffer, or null for no output
    pub ptr: *mut u8,
    /// Length of the buffer in bytes
    pub len: usize,
}

/// Native host function.
///
/// Receives the arguments as a JSON array. Returns `0` with JSON text in
/// `out`, or non-zero with an optional UTF-8 failure message in `out`.
pub type RawHostFn =
    unsafe extern "C" fn(args_json: *const u8, args_len: usize, out: *mut HostReturn) -> i32;

/// Native async dispatcher: receives each async request's id and JSON payload.
pub type RawAsyncDispatch =
    unsafe extern "C" fn(call_id: u64, payload_json: *const u8, payload_len: usize);

pub(crate) struct RawHostFunction {
    name: String,
    function: RawHostFn,
}

impl RawHostFunction {
    pub(crate) fn new(name: &str, function: RawHostFn) -> Self {
        Self {
            name: name.to_string(),
            function,
        }
    }
}

impl HostFunction for RawHostFunction {
    fn call(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, String> {
        let args = serde_json::to_vec(args).map_err(|err| err.to_string())?;
        let mut out = HostReturn {
            ptr: ptr::null_mut(),
            len: 0,
        };

        let status = unsafe { (self.function)(args.as_ptr(), args.len(), &mut out) };
        let bytes = unsafe { take_host_buffer(out) };

        if status != 0 {
            let message = String::from_utf8_lossy(&bytes).into_owned();
            return Err(if message.is_empty() {
                format!("host function '{}' failed with status {status}", self.name)
            } else {
                message
            });
        }
        if bytes.is_empty() {
            return Ok(serde_json::Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|err| {
            format!("host function '{}' returned invalid JSON: {err}", self.name)
        })
    }
}

/// Copy and free a buffer returned by a host function.
///
/// # Safety
///
/// `out.ptr` must be null or a live `qjsbridge_alloc` allocation of `out.len` bytes.
unsafe fn take_host_buffer(out: HostReturn) -> Vec<u8> {
    if out.ptr.is_null() || out.len == 0 {
        return Vec::new();
    }
    let bytes = unsafe { std::slice::from_raw_parts(out.ptr, out.len) }.to_vec();
    unsafe { memory::free(out.ptr, out.len) };
    bytes
}

/// Forward async requests to a native dispatcher.
pub(crate) fn dispatcher(function: RawAsyncDispatch) -> impl FnMut(AsyncRequest) + 'static {
    move |request: AsyncRequest| {
        let payload = serde_json::to_vec(&request.payload).unwrap_or_default();
        tracing::trace!(
            event = "ffi.async.dispatch",
            call_id = %request.call_id,
            len = payload.len()
        );
        unsafe { function(request.call_id.into_raw(), payload.as_ptr(), payload.len()) };
    }
}
