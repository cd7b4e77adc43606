// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Globals installed on every bridge context
//!
//! The engine intrinsics (JSON, Promise, Map/Set, typed arrays, BigInt, ...)
//! come with the full context. The bridge adds:
//!
//! - `print(...args)`
//! - the host namespace object (`env` by default) with the async entry point

pub(crate) mod print;

pub(crate) use print::OutputBuffer;

use crate::config::BridgeConfig;
use crate::host::async_bridge::{self, SharedAsyncCalls};
use rquickjs::{Ctx, Object};

/// Install the bridge globals and return the namespace object.
pub(crate) fn install<'js>(
    ctx: &Ctx<'js>,
    config: &BridgeConfig,
    output: OutputBuffer,
    async_calls: SharedAsyncCalls,
) -> rquickjs::Result<Object<'js>> {
    let global = ctx.globals();
    print::install(ctx, &global, config.print, output)?;

    let namespace = Object::new(ctx.clone())?;
    async_bridge::install(ctx, &namespace, &config.async_entry, async_calls)?;
    global.set(config.namespace.as_str(), namespace.clone())?;

    tracing::debug!(
        event = "globals.install",
        namespace = %config.namespace,
        async_entry = %config.async_entry
    );
    Ok(namespace)
}
