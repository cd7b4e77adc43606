// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # qjsbridge-ffi
//!
//! C-callable surface for [`qjsbridge_core`].
//!
//! ## Conventions
//!
//! - Each thread has at most one bridge, created by `qjsbridge_init` or
//!   `qjsbridge_init_with_config` and dropped by `qjsbridge_shutdown`.
//! - Every export returns an `i32` [`Status`]: `0` on success, negative on
//!   failure. `qjsbridge_last_error` describes the most recent failure.
//! - Strings and buffers are passed as `(ptr, len)` pairs of UTF-8 or raw
//!   bytes. Values are referenced by `u64` handles.
//! - Buffers returned by the bridge stay valid until the next call on the
//!   same thread. Buffers returned by host functions are allocated with
//!   `qjsbridge_alloc` and freed by the bridge.
//! - Calling back into the bridge from a host function or async dispatcher
//!   returns [`Status::Busy`].

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::missing_safety_doc)]

mod host;
mod memory;
mod state;
mod status;

pub use host::{HostReturn, RawAsyncDispatch, RawHostFn};
pub use status::Status;

use qjsbridge_core::{AsyncCallId, AsyncOutcome, Bridge, BridgeConfig, ValueHandle};
use state::FfiState;
use status::{Failure, completion_code};

fn install(state: &mut FfiState, config: BridgeConfig) -> Result<(), Failure> {
    if let Some(previous) = state.bridge.take() {
        let report = previous.shutdown();
        tracing::warn!(
            event = "ffi.reinit",
            live_handles = report.live_handles,
            abandoned_calls = report.abandoned_calls.len(),
            "Replacing the bridge already initialized on this thread"
        );
    }
    state.requests.clear();
    state.bridge = Some(Bridge::new(config)?);
    tracing::debug!(event = "ffi.init");
    Ok(())
}

fn require_out<T>(out: *mut T) -> Result<(), Failure> {
    if out.is_null() {
        Err(Failure::invalid_argument("null output pointer"))
    } else {
        Ok(())
    }
}

/// # Safety
///
/// A non-null `out` must be valid for writes.
unsafe fn write_handle(out: *mut u64, handle: ValueHandle) -> Result<(), Failure> {
    unsafe { memory::write(out, handle.into_raw()) }
}

// ============================================================================
// Lifecycle
// ============================================================================

/// Create this thread's bridge with the default configuration and
/// `QJSBRIDGE_*` environment overrides. An existing bridge is shut down first.
#[unsafe(no_mangle)]
pub extern "C" fn qjsbridge_init() -> i32 {
    state::run("init", |state| {
        let config = BridgeConfig::load_from_env()?;
        install(state, config)
    })
}

/// Create this thread's bridge from a TOML configuration document.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_init_with_config(toml_ptr: *const u8, toml_len: usize) -> i32 {
    state::run("init_with_config", |state| {
        let text = unsafe { memory::text(toml_ptr, toml_len) }?;
        let config = BridgeConfig::from_toml_str(text)?;
        install(state, config)
    })
}

/// Drop this thread's bridge. Handles and pending async calls die with it.
#[unsafe(no_mangle)]
pub extern "C" fn qjsbridge_shutdown() -> i32 {
    state::run("shutdown", |state| {
        let bridge = state.bridge.take().ok_or_else(|| {
            Failure::new(Status::NotInitialized, "no bridge is initialized on this thread")
        })?;
        state.requests.clear();
        let report = bridge.shutdown();
        tracing::debug!(
            event = "ffi.shutdown",
            live_handles = report.live_handles,
            abandoned_calls = report.abandoned_calls.len()
        );
        Ok(())
    })
}

// ============================================================================
// Compilation and evaluation
// ============================================================================

/// Compile source into a bytecode blob without running it.
///
/// The blob is written to `out_ptr`/`out_len` and stays valid until the next call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_compile_to_bytecode(
    filename_ptr: *const u8,
    filename_len: usize,
    source_ptr: *const u8,
    source_len: usize,
    is_module: i32,
    out_ptr: *mut *const u8,
    out_len: *mut usize,
) -> i32 {
    state::run("compile_to_bytecode", |state| {
        require_out(out_ptr)?;
        require_out(out_len)?;
        let filename = unsafe { memory::text(filename_ptr, filename_len) }?;
        let source = unsafe { memory::text(source_ptr, source_len) }?;

        let blob = state
            .bridge()?
            .compile(filename, source, is_module != 0)?
            .serialize();
        let (ptr, len) = state.hold(blob);
        unsafe { memory::write(out_ptr, ptr) }?;
        unsafe { memory::write(out_len, len) }
    })
}

/// Evaluate source. Scripts yield their completion value, modules their
/// evaluation promise. An empty filename uses the configured default.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_eval_js_source(
    filename_ptr: *const u8,
    filename_len: usize,
    source_ptr: *const u8,
    source_len: usize,
    is_module: i32,
    out_handle: *mut u64,
) -> i32 {
    state::run("eval_js_source", |state| {
        require_out(out_handle)?;
        let filename = unsafe { memory::text(filename_ptr, filename_len) }?;
        let source = unsafe { memory::text(source_ptr, source_len) }?;

        let bridge = state.bridge()?;
        let filename = if filename.is_empty() {
            bridge.config().default_filename.clone()
        } else {
            filename.to_string()
        };
        let handle = bridge.eval_source(&filename, source, is_module != 0)?;
        unsafe { write_handle(out_handle, handle) }
    })
}

/// Run a bytecode blob. Module blobs are evaluated without name resolution
/// and yield their evaluation promise.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_eval_js_bytecode(
    blob_ptr: *const u8,
    blob_len: usize,
    out_handle: *mut u64,
) -> i32 {
    state::run("eval_js_bytecode", |state| {
        require_out(out_handle)?;
        let blob = unsafe { memory::bytes(blob_ptr, blob_len) }?;
        let handle = state.bridge()?.eval_bytecode(blob)?;
        unsafe { write_handle(out_handle, handle) }
    })
}

/// Load a module blob and return its namespace object.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_load_js_bytecode(
    blob_ptr: *const u8,
    blob_len: usize,
    out_handle: *mut u64,
) -> i32 {
    state::run("load_js_bytecode", |state| {
        require_out(out_handle)?;
        let blob = unsafe { memory::bytes(blob_ptr, blob_len) }?;
        let handle = state.bridge()?.load_bytecode(blob)?;
        unsafe { write_handle(out_handle, handle) }
    })
}

// ============================================================================
// Values
// ============================================================================

/// Handle to the global object.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_global_object(out_handle: *mut u64) -> i32 {
    state::run("global_object", |state| {
        require_out(out_handle)?;
        let handle = state.bridge()?.global_object()?;
        unsafe { write_handle(out_handle, handle) }
    })
}

/// Call `target[name](...args)` with `this = target`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_call_js_function(
    target: u64,
    name_ptr: *const u8,
    name_len: usize,
    args_ptr: *const u64,
    args_len: usize,
    out_handle: *mut u64,
) -> i32 {
    state::run("call_js_function", |state| {
        require_out(out_handle)?;
        let name = unsafe { memory::text(name_ptr, name_len) }?;
        let args: Vec<ValueHandle> = if args_len == 0 {
            Vec::new()
        } else if args_ptr.is_null() {
            return Err(Failure::invalid_argument("null argument array with non-zero length"));
        } else {
            unsafe { std::slice::from_raw_parts(args_ptr, args_len) }
                .iter()
                .map(|raw| ValueHandle::from_raw(*raw))
                .collect()
        };

        let handle = state
            .bridge()?
            .call_function_with(ValueHandle::from_raw(target), name, &args)?;
        unsafe { write_handle(out_handle, handle) }
    })
}

/// Read `target[name]`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_get_js_obj_property(
    target: u64,
    name_ptr: *const u8,
    name_len: usize,
    out_handle: *mut u64,
) -> i32 {
    state::run("get_js_obj_property", |state| {
        require_out(out_handle)?;
        let name = unsafe { memory::text(name_ptr, name_len) }?;
        let handle = state
            .bridge()?
            .get_property(ValueHandle::from_raw(target), name)?;
        unsafe { write_handle(out_handle, handle) }
    })
}

/// String form of a value, valid until the next call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_get_js_string(
    handle: u64,
    out_ptr: *mut *const u8,
    out_len: *mut usize,
) -> i32 {
    state::run("get_js_string", |state| {
        require_out(out_ptr)?;
        require_out(out_len)?;
        let text = state.bridge()?.get_string(ValueHandle::from_raw(handle))?;
        let (ptr, len) = state.hold(text.into_bytes());
        unsafe { memory::write(out_ptr, ptr) }?;
        unsafe { memory::write(out_len, len) }
    })
}

/// Create a string value.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_new_js_string(
    text_ptr: *const u8,
    text_len: usize,
    out_handle: *mut u64,
) -> i32 {
    state::run("new_js_string", |state| {
        require_out(out_handle)?;
        let text = unsafe { memory::text(text_ptr, text_len) }?;
        let handle = state.bridge()?.new_string(text)?;
        unsafe { write_handle(out_handle, handle) }
    })
}

/// Release a handle.
#[unsafe(no_mangle)]
pub extern "C" fn qjsbridge_release_js_value(handle: u64) -> i32 {
    state::run("release_js_value", |state| {
        state.bridge()?.release(ValueHandle::from_raw(handle))?;
        Ok(())
    })
}

// ============================================================================
// Promises and host calls
// ============================================================================

/// The value a promise settled with, its rejection reason, or `undefined`
/// while pending.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_get_promise_result(handle: u64, out_handle: *mut u64) -> i32 {
    state::run("get_promise_result", |state| {
        require_out(out_handle)?;
        let result = state
            .bridge()?
            .get_promise_result(ValueHandle::from_raw(handle))?;
        unsafe { write_handle(out_handle, result) }
    })
}

/// Settle async call `call_id`.
///
/// With `rejected == 0` the promise resolves with `value` (null when `value`
/// is the null handle). Otherwise it is rejected with a `HostCallError` whose
/// message is the string form of `value`. When `out_completion` is not null
/// it receives `0` resolved, `1` rejected, `2` already settled or `3` unknown id.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_promise_callback(
    call_id: u64,
    value: u64,
    rejected: i32,
    out_completion: *mut i32,
) -> i32 {
    state::run("promise_callback", |state| {
        let bridge = state.bridge()?;
        let value = ValueHandle::from_raw(value);
        let outcome = if rejected != 0 {
            let message = if value.is_null() {
                "rejected by host".to_string()
            } else {
                bridge.get_string(value)?
            };
            AsyncOutcome::Reject(message)
        } else if value.is_null() {
            AsyncOutcome::ResolveJson(serde_json::Value::Null)
        } else {
            AsyncOutcome::Resolve(value)
        };

        let completion = bridge.complete_async_call(AsyncCallId::from_raw(call_id), outcome)?;
        if !out_completion.is_null() {
            unsafe { out_completion.write(completion_code(completion)) };
        }
        Ok(())
    })
}

/// Install a native function on the namespace object.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_register_host_function(
    name_ptr: *const u8,
    name_len: usize,
    arity: u32,
    function: Option<RawHostFn>,
) -> i32 {
    state::run("register_host_function", |state| {
        let name = unsafe { memory::text(name_ptr, name_len) }?;
        let function =
            function.ok_or_else(|| Failure::invalid_argument("null host function pointer"))?;
        state
            .bridge()?
            .register_host_function(name, arity, host::RawHostFunction::new(name, function))?;
        Ok(())
    })
}

/// Send async requests to `dispatcher` as script makes them. A null
/// dispatcher goes back to queueing them for `qjsbridge_take_async_request`.
#[unsafe(no_mangle)]
pub extern "C" fn qjsbridge_set_async_dispatcher(dispatcher: Option<RawAsyncDispatch>) -> i32 {
    state::run("set_async_dispatcher", |state| {
        let bridge = state.bridge()?;
        match dispatcher {
            Some(function) => bridge.set_async_dispatcher(host::dispatcher(function)),
            None => bridge.clear_async_dispatcher(),
        }
        Ok(())
    })
}

/// Take the oldest queued async request.
///
/// Writes its call id and JSON payload, or call id `0` when none is queued.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_take_async_request(
    out_call_id: *mut u64,
    out_ptr: *mut *const u8,
    out_len: *mut usize,
) -> i32 {
    state::run("take_async_request", |state| {
        require_out(out_call_id)?;
        require_out(out_ptr)?;
        require_out(out_len)?;

        let fresh = state.bridge()?.take_async_requests();
        state.requests.extend(fresh);

        let (call_id, ptr, len) = match state.requests.pop_front() {
            Some(request) => {
                let payload = serde_json::to_vec(&request.payload)
                    .map_err(|err| Failure::new(Status::Engine, err.to_string()))?;
                let (ptr, len) = state.hold(payload);
                (request.call_id.into_raw(), ptr, len)
            }
            None => (0, std::ptr::null(), 0),
        };
        unsafe { memory::write(out_call_id, call_id) }?;
        unsafe { memory::write(out_ptr, ptr) }?;
        unsafe { memory::write(out_len, len) }
    })
}

// ============================================================================
// Diagnostics and memory
// ============================================================================

/// Message of the most recent failure on this thread; empty after a success.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_last_error(out_ptr: *mut *const u8, out_len: *mut usize) -> i32 {
    state::inspect(|state| {
        require_out(out_ptr)?;
        require_out(out_len)?;
        let message = state.last_error.clone().unwrap_or_default();
        let (ptr, len) = state.hold(message.into_bytes());
        unsafe { memory::write(out_ptr, ptr) }?;
        unsafe { memory::write(out_len, len) }
    })
}

/// Allocate `size` bytes for a host function result. Returns null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn qjsbridge_alloc(size: usize) -> *mut u8 {
    memory::alloc(size)
}

/// Free memory from `qjsbridge_alloc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn qjsbridge_free(ptr: *mut u8, size: usize) {
    unsafe { memory::free(ptr, size) }
}
