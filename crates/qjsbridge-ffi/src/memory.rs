// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Buffers crossing the boundary

use crate::status::Failure;
use std::alloc::Layout;

const ALIGN: usize = 8;

pub(crate) fn alloc(size: usize) -> *mut u8 {
    if size == 0 {
        return std::ptr::null_mut();
    }
    let Ok(layout) = Layout::from_size_align(size, ALIGN) else {
        return std::ptr::null_mut();
    };
    unsafe { std::alloc::alloc(layout) }
}

/// # Safety
///
/// `ptr` must come from [`alloc`] with the same `size`.
pub(crate) unsafe fn free(ptr: *mut u8, size: usize) {
    if ptr.is_null() || size == 0 {
        return;
    }
    let Ok(layout) = Layout::from_size_align(size, ALIGN) else {
        return;
    };
    unsafe { std::alloc::dealloc(ptr, layout) }
}

/// Borrow `len` bytes at `ptr`. A zero length accepts a null pointer.
///
/// # Safety
///
/// A non-null `ptr` must be valid for `len` bytes for the duration of the call.
pub(crate) unsafe fn bytes<'a>(ptr: *const u8, len: usize) -> Result<&'a [u8], Failure> {
    if len == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(Failure::invalid_argument("null buffer with non-zero length"));
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len) })
}

/// Borrow `len` bytes at `ptr` as UTF-8.
///
/// # Safety
///
/// As for [`bytes`].
pub(crate) unsafe fn text<'a>(ptr: *const u8, len: usize) -> Result<&'a str, Failure> {
    let bytes = unsafe { bytes(ptr, len) }?;
    std::str::from_utf8(bytes).map_err(|err| Failure::invalid_argument(format!("invalid UTF-8: {err}")))
}

/// Write through an out-pointer.
///
/// # Safety
///
/// A non-null `out` must be valid for writes.
pub(crate) unsafe fn write<T>(out: *mut T, value: T) -> Result<(), Failure> {
    if out.is_null() {
        return Err(Failure::invalid_argument("null output pointer"));
    }
    unsafe { out.write(value) };
    Ok(())
}
