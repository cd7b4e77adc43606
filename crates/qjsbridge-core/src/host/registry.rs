// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Synchronous host function registry

use super::host_call_error;
use crate::convert::{js_to_json, json_to_js};
use rquickjs::function::Rest;
use rquickjs::{Ctx, Function, Object, Value};
use std::collections::BTreeMap;

/// A native function script can call.
///
/// Arguments arrive as JSON: `undefined`, functions and symbols become `null`,
/// and missing arguments up to the declared arity are `null`. An `Err` is
/// thrown into script as an `Error` named `HostCallError`.
pub trait HostFunction {
    /// Run the function.
    fn call(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, String>;
}

impl<F> HostFunction for F
where
    F: Fn(&[serde_json::Value]) -> Result<serde_json::Value, String>,
{
    fn call(&self, args: &[serde_json::Value]) -> Result<serde_json::Value, String> {
        self(args)
    }
}

/// Name and arity of a registered host function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFunctionDescriptor {
    /// Property name on the namespace object
    pub name: String,
    /// Declared parameter count, reported as the function's `length`
    pub arity: u32,
}

/// Tracks what is installed on the namespace.
#[derive(Default)]
pub(crate) struct HostFunctionRegistry {
    functions: BTreeMap<String, HostFunctionDescriptor>,
}

impl HostFunctionRegistry {
    /// Install `function` on `namespace`, replacing any previous binding of the same name.
    pub(crate) fn install<'js>(
        &mut self,
        ctx: &Ctx<'js>,
        namespace: &Object<'js>,
        descriptor: HostFunctionDescriptor,
        function: Box<dyn HostFunction>,
    ) -> rquickjs::Result<Option<HostFunctionDescriptor>> {
        let name = descriptor.name.clone();
        let arity = descriptor.arity as usize;

        let trampoline_name = name.clone();
        let trampoline = Function::new(
            ctx.clone(),
            move |ctx: Ctx<'js>, args: Rest<Value<'js>>| -> rquickjs::Result<Value<'js>> {
                let mut json_args = args
                    .0
                    .iter()
                    .map(js_to_json)
                    .collect::<rquickjs::Result<Vec<_>>>()?;
                if json_args.len() < arity {
                    json_args.resize(arity, serde_json::Value::Null);
                }

                tracing::trace!(
                    event = "host.call",
                    function = %trampoline_name,
                    argc = json_args.len()
                );

                match function.call(&json_args) {
                    Ok(result) => json_to_js(&ctx, &result),
                    Err(message) => {
                        tracing::debug!(
                            event = "host.call.failed",
                            function = %trampoline_name,
                            %message
                        );
                        Err(ctx.throw(host_call_error(&ctx, &message)?))
                    }
                }
            },
        )?
        .with_name(&name)?;
        trampoline.set_length(arity)?;

        namespace.set(name.as_str(), trampoline)?;

        let previous = self.functions.insert(name.clone(), descriptor);
        if let Some(previous) = &previous {
            tracing::warn!(
                event = "host.register.overwrite",
                function = %name,
                previous_arity = previous.arity,
                "Host function replaced an existing binding"
            );
        } else {
            tracing::debug!(event = "host.register", function = %name, arity);
        }
        Ok(previous)
    }

    pub(crate) fn descriptors(&self) -> Vec<HostFunctionDescriptor> {
        self.functions.values().cloned().collect()
    }
}
