// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The bridge: one engine runtime and context plus everything hosts reach
//! them through.

use super::jobs::{self, DrainReport};
use super::value::{self, PromiseStatus, ValueKind};
use crate::codec::{self, CompiledUnit, UnitKind, engine};
use crate::config::BridgeConfig;
use crate::convert::{self, to_bridge_error};
use crate::error::{BridgeError, ModuleStage, Result, ScriptException};
use crate::globals::{self, OutputBuffer};
use crate::handle::{self, HandleTable, ValueHandle};
use crate::host::async_bridge::{self, PendingAsyncCalls, SharedAsyncCalls};
use crate::host::{
    AsyncCallId, AsyncDispatcher, AsyncOutcome, AsyncRequest, Completion, HostFunction,
    HostFunctionDescriptor, HostFunctionRegistry,
};
use crate::module_system::{ModuleRegistry, resolver};
use rquickjs::function::{Rest, This};
use rquickjs::{Context, Ctx, Function, Module, Object, Persistent, Promise, Runtime, Value};
use std::cell::RefCell;
use std::rc::Rc;

/// What was still alive when a bridge shut down
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Handles the host never released
    pub live_handles: usize,
    /// Async calls the host never completed
    pub abandoned_calls: Vec<AsyncCallId>,
    /// Modules loaded over the bridge's lifetime
    pub loaded_modules: Vec<String>,
}

impl ShutdownReport {
    /// Whether nothing was left behind
    pub fn is_clean(&self) -> bool {
        self.live_handles == 0 && self.abandoned_calls.is_empty()
    }
}

/// An embedded engine instance.
///
/// A bridge owns one runtime and one context and is confined to the thread
/// that created it. Values cross the host boundary as [`ValueHandle`]s.
/// Every entry point that can queue engine jobs drains them before
/// returning.
pub struct Bridge {
    config: BridgeConfig,
    handles: HandleTable,
    async_calls: SharedAsyncCalls,
    host_functions: HostFunctionRegistry,
    modules: ModuleRegistry,
    output: OutputBuffer,
    job_failures: Vec<ScriptException>,
    namespace: Persistent<Object<'static>>,
    // Persisted values above are released before the context and runtime.
    context: Context,
    runtime: Runtime,
}

fn module_failure(ctx: &Ctx<'_>, name: &str, stage: ModuleStage, err: rquickjs::Error) -> BridgeError {
    BridgeError::module(name, stage, convert::catch_exception(ctx, err).message)
}

impl Bridge {
    /// Create a runtime and context and install the bridge globals.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Runtime::new().map_err(|err| BridgeError::RuntimeInit(err.to_string()))?;
        let modules = ModuleRegistry::default();
        let (resolver, loader) = modules.hooks();
        runtime.set_loader(resolver, loader);

        let context =
            Context::full(&runtime).map_err(|err| BridgeError::RuntimeInit(err.to_string()))?;

        let output: OutputBuffer = Rc::new(RefCell::new(Vec::new()));
        let async_calls: SharedAsyncCalls = Rc::new(RefCell::new(PendingAsyncCalls::new()));

        let namespace = context
            .with(|ctx| -> rquickjs::Result<Persistent<Object<'static>>> {
                let namespace = globals::install(&ctx, &config, output.clone(), async_calls.clone())?;
                Ok(Persistent::save(&ctx, namespace))
            })
            .map_err(|err| BridgeError::RuntimeInit(err.to_string()))?;

        let runtime_tag = handle::next_runtime_tag();
        tracing::debug!(event = "bridge.init", runtime_tag, namespace = %config.namespace);

        Ok(Self {
            config,
            handles: HandleTable::new(runtime_tag),
            async_calls,
            host_functions: HostFunctionRegistry::default(),
            modules,
            output,
            job_failures: Vec::new(),
            namespace,
            context,
            runtime,
        })
    }

    /// The configuration this bridge was created with
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Create an empty object as global `name` and return it.
    pub fn create_namespace(&mut self, name: &str) -> Result<ValueHandle> {
        if name.is_empty() {
            return Err(BridgeError::invalid_argument("namespace name must not be empty"));
        }
        let handles = &mut self.handles;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let object = Object::new(ctx.clone())?;
            ctx.globals().set(name, object.clone())?;
            Ok(handles.insert(&ctx, object.into_value()))
        })
    }

    /// Handle to the global object
    pub fn global_object(&mut self) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        self.context
            .with(|ctx| -> Result<ValueHandle> { Ok(handles.insert(&ctx, ctx.globals().into_value())) })
    }

    /// Handle to the host namespace object
    pub fn namespace_object(&mut self) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        let namespace = &self.namespace;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let namespace = namespace.clone().restore(&ctx)?;
            Ok(handles.insert(&ctx, namespace.into_value()))
        })
    }

    // ---- Compilation and evaluation ----

    /// Compile source without running it.
    pub fn compile(&self, filename: &str, source: &str, is_module: bool) -> Result<CompiledUnit> {
        codec::compile(filename, source, UnitKind::from_module_flag(is_module))
    }

    /// Evaluate script source under the default filename.
    pub fn eval(&mut self, source: &str) -> Result<ValueHandle> {
        let filename = self.config.default_filename.clone();
        self.eval_source(&filename, source, false)
    }

    /// Evaluate source. Scripts yield their completion value; modules are
    /// evaluated by [`Bridge::load_module_source`].
    pub fn eval_source(&mut self, filename: &str, source: &str, is_module: bool) -> Result<ValueHandle> {
        if is_module {
            return self.load_module_source(filename, source);
        }
        let (c_filename, c_source) = codec::source_cstrings(filename, source)?;
        tracing::debug!(event = "bridge.eval_source", filename, len = source.len());

        let handles = &mut self.handles;
        let result = self.context.with(|ctx| -> Result<ValueHandle> {
            let value = engine::eval_script(&ctx, &c_filename, &c_source)
                .map_err(|err| to_bridge_error(&ctx, err))?;
            Ok(handles.insert(&ctx, value))
        });
        self.drain();
        result
    }

    /// Run a compiled script unit.
    pub fn evaluate(&mut self, unit: &CompiledUnit) -> Result<ValueHandle> {
        if unit.kind() == UnitKind::Module {
            return Err(BridgeError::module(
                unit.name(),
                ModuleStage::Evaluate,
                "module units are loaded with load_bytecode",
            ));
        }
        tracing::debug!(event = "bridge.evaluate", name = unit.name());

        let handles = &mut self.handles;
        let result = self.context.with(|ctx| -> Result<ValueHandle> {
            let value = engine::run_script(&ctx, unit.bytecode())
                .map_err(|err| to_bridge_error(&ctx, err))?;
            Ok(handles.insert(&ctx, value))
        });
        self.drain();
        result
    }

    /// Deserialize and run a blob.
    ///
    /// Script units yield their completion value. Module units are evaluated
    /// without resolving them by name and yield the evaluation promise.
    pub fn eval_bytecode(&mut self, blob: &[u8]) -> Result<ValueHandle> {
        let unit = CompiledUnit::deserialize(blob)?;
        match unit.kind() {
            UnitKind::Script => self.evaluate(&unit),
            UnitKind::Module => self.evaluate_module_unit(&unit),
        }
    }

    fn evaluate_module_unit(&mut self, unit: &CompiledUnit) -> Result<ValueHandle> {
        let name = unit.name().to_string();
        if !self.modules.is_declared(&name) {
            self.declare_module(unit)?;
        }
        self.drain();

        // A module the loader hook declared has no evaluation promise of its
        // own; its import promise settles once the body has run.
        let handles = &mut self.handles;
        let modules = &self.modules;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let promise = match modules.evaluation(&ctx, &name)? {
                Some(evaluation) => evaluation,
                None => Module::import(&ctx, name.clone())
                    .map_err(|err| module_failure(&ctx, &name, ModuleStage::Resolve, err))?,
            };
            Ok(handles.insert(&ctx, promise.into_value()))
        })
    }

    /// Read a module unit into the engine, resolve its imports and start
    /// running its body. The caller drains jobs afterwards.
    fn declare_module(&mut self, unit: &CompiledUnit) -> Result<()> {
        let name = unit.name();
        self.modules.check_linkable(name, unit.bytecode())?;

        let modules = &mut self.modules;
        self.context.with(|ctx| -> Result<()> {
            let record = engine::ModuleRecord::read(&ctx, unit.bytecode())
                .map_err(|err| module_failure(&ctx, name, ModuleStage::NameExtraction, err))?;
            modules.store(name, unit.bytecode());

            let record = record
                .resolve()
                .map_err(|err| module_failure(&ctx, name, ModuleStage::Resolve, err))?;
            let evaluation = record
                .evaluate()
                .map_err(|err| module_failure(&ctx, name, ModuleStage::Evaluate, err))?;
            modules.record_evaluation(&ctx, name, evaluation);
            tracing::debug!(event = "module.declared", name);
            Ok(())
        })
    }

    // ---- Modules ----

    /// Load a module blob and return its namespace object.
    ///
    /// A module is declared and run once. Loading it again returns the
    /// cached namespace, or picks up a module whose evaluation had not
    /// finished, without running its body a second time.
    pub fn load_bytecode(&mut self, blob: &[u8]) -> Result<ValueHandle> {
        let unit = CompiledUnit::deserialize(blob)?;
        if unit.kind() != UnitKind::Module {
            return Err(BridgeError::module(
                unit.name(),
                ModuleStage::NameExtraction,
                "unit is a script, not a module",
            ));
        }
        let name = unit.name().to_string();
        if let Some(handle) = self.cached_namespace(&name)? {
            return Ok(handle);
        }

        if !self.modules.is_declared(&name) {
            self.declare_module(&unit)?;
        }
        self.drain();

        // Resolve the namespace by name.
        let modules = &self.modules;
        let import = self.context.with(|ctx| -> Result<Persistent<Promise<'static>>> {
            if let Some(evaluation) = modules.evaluation(&ctx, &name)? {
                if let Some(Err(reason)) = value::settlement(&ctx, &evaluation)? {
                    let exception = convert::describe_exception(&ctx, reason);
                    return Err(BridgeError::module(&name, ModuleStage::Evaluate, exception.message));
                }
            }
            let import = Module::import(&ctx, name.clone())
                .map_err(|err| module_failure(&ctx, &name, ModuleStage::Resolve, err))?;
            Ok(Persistent::save(&ctx, import))
        })?;
        self.drain();

        let handles = &mut self.handles;
        let modules = &mut self.modules;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let import = import.restore(&ctx)?;
            match value::settlement(&ctx, &import)? {
                Some(Ok(namespace)) => {
                    let namespace = namespace.into_object().ok_or_else(|| {
                        BridgeError::module(
                            &name,
                            ModuleStage::Resolve,
                            "import did not produce a namespace object",
                        )
                    })?;
                    modules.cache.insert(&ctx, name.clone(), namespace.clone());
                    tracing::debug!(event = "module.loaded", name = %name);
                    Ok(handles.insert(&ctx, namespace.into_value()))
                }
                Some(Err(reason)) => Err(BridgeError::module(
                    &name,
                    ModuleStage::Resolve,
                    convert::describe_exception(&ctx, reason).message,
                )),
                None => Err(BridgeError::module(
                    &name,
                    ModuleStage::Resolve,
                    "module evaluation has not finished",
                )),
            }
        })
    }

    fn cached_namespace(&mut self, name: &str) -> Result<Option<ValueHandle>> {
        if !self.modules.cache.has(name) {
            return Ok(None);
        }
        let handles = &mut self.handles;
        let cache = &mut self.modules.cache;
        self.context.with(|ctx| -> Result<Option<ValueHandle>> {
            let namespace = cache.get(&ctx, name)?;
            Ok(namespace.map(|namespace| handles.insert(&ctx, namespace.into_value())))
        })
    }

    /// Compile and evaluate module source; returns the evaluation promise.
    ///
    /// The module is named like a compiled unit (see
    /// [`crate::module_system::resolver::canonical`]). A name already loaded
    /// is refused.
    pub fn load_module_source(&mut self, filename: &str, source: &str) -> Result<ValueHandle> {
        let name = resolver::canonical(filename);
        tracing::debug!(event = "bridge.load_module_source", filename, name = %name);
        if self.modules.is_declared(&name) {
            return Err(BridgeError::module(
                &name,
                ModuleStage::Evaluate,
                "a module with this name is already loaded",
            ));
        }

        let handles = &mut self.handles;
        let modules = &mut self.modules;
        let result = self.context.with(|ctx| -> Result<ValueHandle> {
            let promise = Module::evaluate(ctx.clone(), name.as_str(), source)
                .map_err(|err| module_failure(&ctx, &name, ModuleStage::Evaluate, err))?;
            modules.record_evaluation(&ctx, &name, promise.clone());
            Ok(handles.insert(&ctx, promise.into_value()))
        });
        self.drain();
        result
    }

    /// Store a module blob for other modules to import by name, without running it.
    pub fn register_module(&mut self, blob: &[u8]) -> Result<String> {
        let unit = CompiledUnit::deserialize(blob)?;
        if unit.kind() != UnitKind::Module {
            return Err(BridgeError::invalid_argument(format!(
                "'{}' is a script, not a module",
                unit.name()
            )));
        }
        self.modules.store(unit.name(), unit.bytecode());
        tracing::debug!(event = "module.register", name = unit.name());
        Ok(unit.name().to_string())
    }

    /// Names of the modules loaded so far
    pub fn loaded_modules(&self) -> Vec<String> {
        self.modules.names()
    }

    // ---- Calls and values ----

    /// Call `target[name]()` with `this = target`.
    pub fn call_function(&mut self, target: ValueHandle, name: &str) -> Result<ValueHandle> {
        self.call_function_with(target, name, &[])
    }

    /// Call `target[name](...args)` with `this = target`.
    pub fn call_function_with(
        &mut self,
        target: ValueHandle,
        name: &str,
        args: &[ValueHandle],
    ) -> Result<ValueHandle> {
        tracing::debug!(event = "bridge.call_function", function = name, argc = args.len());

        let handles = &mut self.handles;
        let result = self.context.with(|ctx| -> Result<ValueHandle> {
            let object = handles
                .get(&ctx, target)?
                .into_object()
                .ok_or_else(|| BridgeError::type_error(format!("cannot call '{name}' on a non-object")))?;
            let property: Value = object.get(name).map_err(|err| to_bridge_error(&ctx, err))?;
            let function: Function = property
                .into_function()
                .ok_or_else(|| BridgeError::type_error(format!("'{name}' is not a function")))?;
            let args = args
                .iter()
                .map(|arg| handles.get(&ctx, *arg))
                .collect::<Result<Vec<_>>>()?;

            let value: Value = function
                .call((This(object), Rest(args)))
                .map_err(|err| to_bridge_error(&ctx, err))?;
            Ok(handles.insert(&ctx, value))
        });
        self.drain();
        result
    }

    /// Read `target[name]`.
    pub fn get_property(&mut self, target: ValueHandle, name: &str) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let object = handles
                .get(&ctx, target)?
                .into_object()
                .ok_or_else(|| BridgeError::type_error(format!("cannot read '{name}' of a non-object")))?;
            let value: Value = object.get(name).map_err(|err| to_bridge_error(&ctx, err))?;
            Ok(handles.insert(&ctx, value))
        })
    }

    /// String form of a value, as `String(value)` gives it.
    pub fn get_string(&self, handle: ValueHandle) -> Result<String> {
        let handles = &self.handles;
        self.context.with(|ctx| -> Result<String> {
            let value = handles.get(&ctx, handle)?;
            convert::coerce_string(&ctx, value).map_err(|err| to_bridge_error(&ctx, err))
        })
    }

    /// Create a string value.
    pub fn new_string(&mut self, text: &str) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let string = rquickjs::String::from_str(ctx.clone(), text)?;
            Ok(handles.insert(&ctx, string.into_value()))
        })
    }

    /// Numeric value of a number.
    pub fn get_number(&self, handle: ValueHandle) -> Result<f64> {
        let handles = &self.handles;
        self.context.with(|ctx| -> Result<f64> {
            let value = handles.get(&ctx, handle)?;
            value.as_number().ok_or_else(|| {
                BridgeError::type_error(format!("expected a number, found {}", ValueKind::of(&value)))
            })
        })
    }

    /// Create a number value.
    pub fn new_number(&mut self, number: f64) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        self.context.with(|ctx| -> Result<ValueHandle> {
            Ok(handles.insert(&ctx, Value::new_number(ctx.clone(), number)))
        })
    }

    /// JSON form of a value. `undefined`, functions and symbols become `null`.
    pub fn to_json(&self, handle: ValueHandle) -> Result<serde_json::Value> {
        let handles = &self.handles;
        self.context.with(|ctx| -> Result<serde_json::Value> {
            let value = handles.get(&ctx, handle)?;
            convert::js_to_json(&value).map_err(|err| to_bridge_error(&ctx, err))
        })
    }

    /// Build a value from JSON.
    pub fn from_json(&mut self, json: &serde_json::Value) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let value = convert::json_to_js(&ctx, json)?;
            Ok(handles.insert(&ctx, value))
        })
    }

    /// Kind of the value behind `handle`
    pub fn value_kind(&self, handle: ValueHandle) -> Result<ValueKind> {
        let handles = &self.handles;
        self.context
            .with(|ctx| -> Result<ValueKind> { Ok(ValueKind::of(&handles.get(&ctx, handle)?)) })
    }

    /// Release a handle. The value may be collected once nothing else refers to it.
    pub fn release(&mut self, handle: ValueHandle) -> Result<()> {
        if self.handles.release(handle) {
            Ok(())
        } else {
            Err(BridgeError::InvalidHandle(handle))
        }
    }

    /// Number of handles not yet released
    pub fn live_handles(&self) -> usize {
        self.handles.len()
    }

    // ---- Promises ----

    /// The value a promise settled with: the fulfilled value, the rejection
    /// reason, or `undefined` while pending.
    pub fn get_promise_result(&mut self, handle: ValueHandle) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let promise = value::as_promise(&ctx, handles.get(&ctx, handle)?)
                .ok_or_else(|| BridgeError::type_error("value is not a promise"))?;
            let result = match value::settlement(&ctx, &promise)? {
                None => Value::new_undefined(ctx.clone()),
                Some(Ok(value)) | Some(Err(value)) => value,
            };
            Ok(handles.insert(&ctx, result))
        })
    }

    /// Settlement state of a promise
    pub fn promise_state(&self, handle: ValueHandle) -> Result<PromiseStatus> {
        let handles = &self.handles;
        self.context.with(|ctx| -> Result<PromiseStatus> {
            let promise = value::as_promise(&ctx, handles.get(&ctx, handle)?)
                .ok_or_else(|| BridgeError::type_error("value is not a promise"))?;
            Ok(match value::settlement(&ctx, &promise)? {
                None => PromiseStatus::Pending,
                Some(Ok(_)) => PromiseStatus::Fulfilled,
                Some(Err(_)) => PromiseStatus::Rejected,
            })
        })
    }

    /// The fulfilled value of a promise. A rejection is returned as an error
    /// and a pending promise as [`BridgeError::PromisePending`].
    pub fn await_promise(&mut self, handle: ValueHandle) -> Result<ValueHandle> {
        let handles = &mut self.handles;
        self.context.with(|ctx| -> Result<ValueHandle> {
            let promise = value::as_promise(&ctx, handles.get(&ctx, handle)?)
                .ok_or_else(|| BridgeError::type_error("value is not a promise"))?;
            match value::settlement(&ctx, &promise)? {
                None => Err(BridgeError::PromisePending),
                Some(Ok(value)) => Ok(handles.insert(&ctx, value)),
                Some(Err(reason)) => Err(BridgeError::from_exception(
                    convert::describe_exception(&ctx, reason),
                )),
            }
        })
    }

    // ---- Host functions ----

    /// Install a host function on the namespace object.
    ///
    /// Returns the descriptor of the binding it replaced, if any.
    pub fn register_host_function<F>(
        &mut self,
        name: &str,
        arity: u32,
        function: F,
    ) -> Result<Option<HostFunctionDescriptor>>
    where
        F: HostFunction + 'static,
    {
        if name.is_empty() {
            return Err(BridgeError::invalid_argument("host function name must not be empty"));
        }
        if name == self.config.async_entry {
            return Err(BridgeError::invalid_argument(format!(
                "'{name}' is reserved for the async entry point"
            )));
        }

        let descriptor = HostFunctionDescriptor {
            name: name.to_string(),
            arity,
        };
        let namespace = &self.namespace;
        let registry = &mut self.host_functions;
        self.context.with(|ctx| -> Result<Option<HostFunctionDescriptor>> {
            let namespace = namespace.clone().restore(&ctx)?;
            Ok(registry.install(&ctx, &namespace, descriptor, Box::new(function))?)
        })
    }

    /// Host functions installed so far, by name
    pub fn host_functions(&self) -> Vec<HostFunctionDescriptor> {
        self.host_functions.descriptors()
    }

    // ---- Async host calls ----

    /// Send async requests to `dispatcher` as script makes them.
    pub fn set_async_dispatcher<D>(&mut self, dispatcher: D)
    where
        D: AsyncDispatcher + 'static,
    {
        self.async_calls
            .borrow_mut()
            .set_dispatcher(Some(Box::new(dispatcher)));
    }

    /// Go back to queueing requests for [`Bridge::take_async_requests`].
    pub fn clear_async_dispatcher(&mut self) {
        self.async_calls.borrow_mut().set_dispatcher(None);
    }

    /// Requests queued since the last call, oldest first.
    pub fn take_async_requests(&mut self) -> Vec<AsyncRequest> {
        self.async_calls.borrow_mut().take_queued()
    }

    /// Ids of calls waiting for the host
    pub fn pending_async_calls(&self) -> Vec<AsyncCallId> {
        self.async_calls.borrow().pending_ids()
    }

    /// Settle an async call and run the reactions it unblocks.
    ///
    /// Completing a call twice, or an id never issued, changes nothing and is
    /// reported through the returned [`Completion`].
    pub fn complete_async_call(&mut self, call_id: AsyncCallId, outcome: AsyncOutcome) -> Result<Completion> {
        if let AsyncOutcome::Resolve(handle) = &outcome {
            if !self.handles.contains(*handle) {
                return Err(BridgeError::InvalidHandle(*handle));
            }
        }

        let handles = &self.handles;
        let calls = &self.async_calls;
        let completion = self.context.with(|ctx| -> Result<Completion> {
            let settlement = match outcome {
                AsyncOutcome::Resolve(handle) => Ok(handles.get(&ctx, handle)?),
                AsyncOutcome::ResolveJson(json) => Ok(convert::json_to_js(&ctx, &json)?),
                AsyncOutcome::Reject(message) => Err(message),
            };
            async_bridge::settle(calls, &ctx, call_id, settlement)
        })?;

        if matches!(completion, Completion::Resolved | Completion::Rejected) {
            self.drain();
        }
        Ok(completion)
    }

    // ---- Jobs and output ----

    /// Run pending jobs until the queue is empty.
    pub fn drain(&mut self) -> DrainReport {
        let report = jobs::drain(&self.runtime);
        self.job_failures.extend(report.failures.iter().cloned());
        report
    }

    /// Exceptions thrown by jobs since the last call
    pub fn take_job_failures(&mut self) -> Vec<ScriptException> {
        std::mem::take(&mut self.job_failures)
    }

    /// Lines printed under [`crate::PrintTarget::Buffer`] since the last call
    pub fn take_output(&mut self) -> Vec<String> {
        std::mem::take(&mut *self.output.borrow_mut())
    }

    /// Tear the bridge down, reporting what was left behind.
    pub fn shutdown(self) -> ShutdownReport {
        let abandoned_calls = self.async_calls.borrow_mut().clear();
        for call_id in &abandoned_calls {
            tracing::warn!(
                event = "bridge.shutdown.abandoned_call",
                %call_id,
                "Async call was never completed"
            );
        }

        let report = ShutdownReport {
            live_handles: self.handles.len(),
            abandoned_calls,
            loaded_modules: self.modules.names(),
        };
        tracing::debug!(
            event = "bridge.shutdown",
            live_handles = report.live_handles,
            abandoned_calls = report.abandoned_calls.len()
        );
        report
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        // Everything persisted must go before the runtime is freed.
        self.async_calls.borrow_mut().clear();
        self.modules.clear();
        self.handles.clear();
    }
}
