// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Opaque value handles
//!
//! A [`ValueHandle`] names an engine value kept alive by its bridge. Hosts only
//! store and replay the integer; the bridge checks on every use that the handle
//! belongs to it, that the slot was not released and that the slot was not
//! reused since.
//!
//! Layout of the 64-bit value:
//!
//! | bits   | field                                |
//! |--------|--------------------------------------|
//! | 63..48 | runtime tag (unique per bridge)      |
//! | 47..32 | slot generation                      |
//! | 31..0  | slot index                           |

use crate::error::{BridgeError, Result};
use rquickjs::{Ctx, Persistent, Value};
use std::fmt;
use std::sync::atomic::{AtomicU16, Ordering};

static NEXT_RUNTIME_TAG: AtomicU16 = AtomicU16::new(1);

/// Allocate a runtime tag for a new bridge. Zero is skipped so no handle is ever null.
pub(crate) fn next_runtime_tag() -> u16 {
    loop {
        let tag = NEXT_RUNTIME_TAG.fetch_add(1, Ordering::Relaxed);
        if tag != 0 {
            return tag;
        }
    }
}

/// Opaque reference to an engine value, valid within the bridge that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct ValueHandle(u64);

impl ValueHandle {
    /// The null handle. Never issued by a bridge.
    pub const NULL: Self = Self(0);

    pub(crate) fn new(runtime_tag: u16, generation: u16, index: u32) -> Self {
        Self(((runtime_tag as u64) << 48) | ((generation as u64) << 32) | index as u64)
    }

    /// Rebuild a handle from the integer a host stored.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The integer form passed across the host boundary.
    pub const fn into_raw(self) -> u64 {
        self.0
    }

    /// Whether this is [`ValueHandle::NULL`].
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    pub(crate) fn runtime_tag(self) -> u16 {
        (self.0 >> 48) as u16
    }

    pub(crate) fn generation(self) -> u16 {
        (self.0 >> 32) as u16
    }

    pub(crate) fn index(self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for ValueHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

struct Slot {
    generation: u16,
    value: Option<Persistent<Value<'static>>>,
}

/// Slot table keeping handle targets alive.
pub(crate) struct HandleTable {
    runtime_tag: u16,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl HandleTable {
    pub(crate) fn new(runtime_tag: u16) -> Self {
        Self {
            runtime_tag,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    /// Keep `value` alive and hand out a handle for it.
    pub(crate) fn insert<'js>(&mut self, ctx: &Ctx<'js>, value: Value<'js>) -> ValueHandle {
        let persistent = Persistent::save(ctx, value);
        self.live += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(persistent);
            let handle = ValueHandle::new(self.runtime_tag, slot.generation, index);
            tracing::trace!(event = "handle.insert", %handle, reused = true);
            return handle;
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 1,
            value: Some(persistent),
        });
        let handle = ValueHandle::new(self.runtime_tag, 1, index);
        tracing::trace!(event = "handle.insert", %handle, reused = false);
        handle
    }

    fn slot(&self, handle: ValueHandle) -> Option<&Persistent<Value<'static>>> {
        if handle.runtime_tag() != self.runtime_tag {
            return None;
        }
        self.slots
            .get(handle.index() as usize)
            .filter(|slot| slot.generation == handle.generation())
            .and_then(|slot| slot.value.as_ref())
    }

    /// Whether `handle` currently names a live value of this table.
    pub(crate) fn contains(&self, handle: ValueHandle) -> bool {
        self.slot(handle).is_some()
    }

    /// Restore the value behind `handle` into `ctx`.
    pub(crate) fn get<'js>(&self, ctx: &Ctx<'js>, handle: ValueHandle) -> Result<Value<'js>> {
        let persistent = self
            .slot(handle)
            .ok_or(BridgeError::InvalidHandle(handle))?;
        Ok(persistent.clone().restore(ctx)?)
    }

    /// Drop the value behind `handle`. Returns false for unknown handles.
    pub(crate) fn release(&mut self, handle: ValueHandle) -> bool {
        if !self.contains(handle) {
            return false;
        }
        let slot = &mut self.slots[handle.index() as usize];
        slot.value = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index());
        self.live -= 1;
        tracing::trace!(event = "handle.release", %handle);
        true
    }

    /// Number of live handles.
    pub(crate) fn len(&self) -> usize {
        self.live
    }

    /// Drop every value. Must run before the owning runtime is freed.
    pub(crate) fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.live = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};

    #[test]
    fn test_handle_layout() {
        let handle = ValueHandle::new(7, 3, 42);
        assert_eq!(handle.runtime_tag(), 7);
        assert_eq!(handle.generation(), 3);
        assert_eq!(handle.index(), 42);
        assert_eq!(ValueHandle::from_raw(handle.into_raw()), handle);
        assert!(ValueHandle::NULL.is_null());
        assert!(!handle.is_null());
    }

    #[test]
    fn test_runtime_tags_are_distinct() {
        let a = next_runtime_tag();
        let b = next_runtime_tag();
        assert_ne!(a, b);
        assert_ne!(a, 0);
        assert_ne!(b, 0);
    }

    #[test]
    fn test_released_slot_rejects_stale_handle() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let mut table = HandleTable::new(next_runtime_tag());

        context.with(|ctx| {
            let first = table.insert(&ctx, Value::new_int(ctx.clone(), 1));
            assert_eq!(table.len(), 1);
            assert!(table.release(first));
            assert!(!table.release(first));
            assert!(matches!(
                table.get(&ctx, first),
                Err(BridgeError::InvalidHandle(_))
            ));

            // Same slot, new generation
            let second = table.insert(&ctx, Value::new_int(ctx.clone(), 2));
            assert_eq!(second.index(), first.index());
            assert_ne!(second, first);
            assert!(table.get(&ctx, first).is_err());
            let value = table.get(&ctx, second).unwrap();
            assert_eq!(value.as_int(), Some(2));
        });

        table.clear();
    }

    #[test]
    fn test_foreign_handle_is_rejected() {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        let mut ours = HandleTable::new(next_runtime_tag());
        let mut theirs = HandleTable::new(next_runtime_tag());

        context.with(|ctx| {
            let handle = theirs.insert(&ctx, Value::new_bool(ctx.clone(), true));
            assert!(!ours.contains(handle));
            assert!(ours.get(&ctx, handle).is_err());
            ours.insert(&ctx, Value::new_null(ctx.clone()));
        });

        ours.clear();
        theirs.clear();
    }
}
