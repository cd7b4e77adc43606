// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Value classification reported to hosts

use rquickjs::{Ctx, FromJs, Promise, Type, Value};
use std::fmt;

/// Kind of the value behind a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `undefined`
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Boolean,
    /// Integer or floating point number
    Number,
    /// BigInt
    BigInt,
    /// String
    String,
    /// Symbol
    Symbol,
    /// Array
    Array,
    /// Function or constructor
    Function,
    /// Promise
    Promise,
    /// Any other object
    Object,
    /// Anything the bridge does not classify
    Other,
}

impl ValueKind {
    pub(crate) fn of(value: &Value<'_>) -> Self {
        match value.type_of() {
            Type::Uninitialized | Type::Undefined => Self::Undefined,
            Type::Null => Self::Null,
            Type::Bool => Self::Boolean,
            Type::Int | Type::Float => Self::Number,
            Type::BigInt => Self::BigInt,
            Type::String => Self::String,
            Type::Symbol => Self::Symbol,
            Type::Array => Self::Array,
            Type::Function | Type::Constructor => Self::Function,
            Type::Promise => Self::Promise,
            Type::Object | Type::Exception => Self::Object,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Undefined => "undefined",
            Self::Null => "null",
            Self::Boolean => "boolean",
            Self::Number => "number",
            Self::BigInt => "bigint",
            Self::String => "string",
            Self::Symbol => "symbol",
            Self::Array => "array",
            Self::Function => "function",
            Self::Promise => "promise",
            Self::Object => "object",
            Self::Other => "other",
        };
        f.write_str(name)
    }
}

/// Settlement state of a promise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromiseStatus {
    /// Not settled yet
    Pending,
    /// Resolved with a value
    Fulfilled,
    /// Rejected with a reason
    Rejected,
}

/// Settled promise contents: `Ok` for a fulfilled value, `Err` for a rejection reason.
pub(crate) type Settlement<'js> = Option<Result<Value<'js>, Value<'js>>>;

/// View `value` as a promise, if it is one.
pub(crate) fn as_promise<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> Option<Promise<'js>> {
    if !value.is_promise() {
        return None;
    }
    Promise::from_js(ctx, value).ok()
}

/// Read a promise's settlement without waiting. `None` while pending.
pub(crate) fn settlement<'js>(
    ctx: &Ctx<'js>,
    promise: &Promise<'js>,
) -> rquickjs::Result<Settlement<'js>> {
    match promise.result::<Value<'js>>() {
        None => Ok(None),
        Some(Ok(value)) => Ok(Some(Ok(value))),
        // The rejection reason is thrown into the context
        Some(Err(rquickjs::Error::Exception)) => Ok(Some(Err(ctx.catch()))),
        Some(Err(err)) => Err(err),
    }
}
