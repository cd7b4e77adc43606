// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Host functions callable from script
//!
//! Host functions live as properties of the namespace object (`env` by
//! default). Synchronous functions are registered through
//! [`HostFunctionRegistry`]; asynchronous host work goes through the single
//! async entry point in [`async_bridge`].

pub mod async_bridge;
mod registry;

pub use async_bridge::{
    AsyncCallId, AsyncDispatcher, AsyncOutcome, AsyncRequest, Completion,
};
pub(crate) use registry::HostFunctionRegistry;
pub use registry::{HostFunction, HostFunctionDescriptor};

use crate::error::HOST_CALL_ERROR_NAME;
use rquickjs::function::Constructor;
use rquickjs::{Ctx, Object, Value};

/// Build the error delivered to script for a failed host call.
pub(crate) fn host_call_error<'js>(ctx: &Ctx<'js>, message: &str) -> rquickjs::Result<Value<'js>> {
    let constructor: Constructor = ctx.globals().get("Error")?;
    let error: Object = constructor.construct((message,))?;
    error.set("name", HOST_CALL_ERROR_NAME)?;
    Ok(error.into_value())
}
