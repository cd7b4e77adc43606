// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Engine calls the safe API does not cover: compile-only evaluation,
//! bytecode writing, and reading back script and module bytecode.
//!
//! Failures that leave an exception pending in the context are reported as
//! `rquickjs::Error::Exception`, like the rest of rquickjs.

use super::UnitKind;
use rquickjs::{Ctx, Exception, FromJs, Promise, Value, qjs};
use std::ffi::CStr;
use std::ptr::NonNull;

fn is_exception(value: qjs::JSValue) -> bool {
    unsafe { qjs::JS_VALUE_GET_NORM_TAG(value) == qjs::JS_TAG_EXCEPTION }
}

fn is_module(value: qjs::JSValue) -> bool {
    unsafe { qjs::JS_VALUE_GET_NORM_TAG(value) == qjs::JS_TAG_MODULE }
}

/// Compile `source` without running it and write the result as bytecode.
///
/// Module records created here belong to `ctx` and are freed with it, so
/// callers compile in a scratch context.
pub(crate) fn compile(
    ctx: &Ctx<'_>,
    filename: &CStr,
    source: &CStr,
    kind: UnitKind,
) -> rquickjs::Result<Vec<u8>> {
    let raw = ctx.as_raw().as_ptr();
    let eval_type = match kind {
        UnitKind::Script => qjs::JS_EVAL_TYPE_GLOBAL,
        UnitKind::Module => qjs::JS_EVAL_TYPE_MODULE,
    };
    let flags = (eval_type | qjs::JS_EVAL_FLAG_COMPILE_ONLY) as i32;
    let source_len = source.to_bytes().len();

    unsafe {
        let compiled = qjs::JS_Eval(raw, source.as_ptr(), source_len as _, filename.as_ptr(), flags);
        if is_exception(compiled) {
            return Err(rquickjs::Error::Exception);
        }

        let mut len: qjs::size_t = 0;
        let buf = qjs::JS_WriteObject(raw, &mut len, compiled, qjs::JS_WRITE_OBJ_BYTECODE as i32);
        // Module values must not be freed through JS_FreeValue.
        if !is_module(compiled) {
            qjs::JS_FreeValue(raw, compiled);
        }
        if buf.is_null() {
            return Err(rquickjs::Error::Exception);
        }

        let bytes = std::slice::from_raw_parts(buf, len as usize).to_vec();
        qjs::js_free(raw, buf.cast());
        Ok(bytes)
    }
}

/// Evaluate script source under `filename`, returning the completion value.
pub(crate) fn eval_script<'js>(
    ctx: &Ctx<'js>,
    filename: &CStr,
    source: &CStr,
) -> rquickjs::Result<Value<'js>> {
    let raw = ctx.as_raw().as_ptr();
    let source_len = source.to_bytes().len();

    unsafe {
        let result = qjs::JS_Eval(
            raw,
            source.as_ptr(),
            source_len as _,
            filename.as_ptr(),
            qjs::JS_EVAL_TYPE_GLOBAL as i32,
        );
        if is_exception(result) {
            return Err(rquickjs::Error::Exception);
        }
        Ok(Value::from_raw(ctx.clone(), result))
    }
}

/// Read script bytecode and run it, returning the completion value.
pub(crate) fn run_script<'js>(ctx: &Ctx<'js>, bytecode: &[u8]) -> rquickjs::Result<Value<'js>> {
    let raw = ctx.as_raw().as_ptr();

    unsafe {
        let function = qjs::JS_ReadObject(
            raw,
            bytecode.as_ptr(),
            bytecode.len() as _,
            qjs::JS_READ_OBJ_BYTECODE as i32,
        );
        if is_exception(function) {
            return Err(rquickjs::Error::Exception);
        }
        if is_module(function) {
            return Err(Exception::throw_type(
                ctx,
                "module bytecode cannot be evaluated as a script",
            ));
        }

        // JS_EvalFunction takes ownership of the function.
        let result = qjs::JS_EvalFunction(raw, function);
        if is_exception(result) {
            return Err(rquickjs::Error::Exception);
        }
        Ok(Value::from_raw(ctx.clone(), result))
    }
}

/// A module read from bytecode, not yet evaluated.
///
/// The record belongs to the context's module list; nothing is freed when it
/// is dropped.
pub(crate) struct ModuleRecord<'js> {
    ctx: Ctx<'js>,
    def: NonNull<qjs::JSModuleDef>,
}

impl<'js> ModuleRecord<'js> {
    /// Read module bytecode into the context.
    pub(crate) fn read(ctx: &Ctx<'js>, bytecode: &[u8]) -> rquickjs::Result<Self> {
        let raw = ctx.as_raw().as_ptr();

        unsafe {
            let value = qjs::JS_ReadObject(
                raw,
                bytecode.as_ptr(),
                bytecode.len() as _,
                qjs::JS_READ_OBJ_BYTECODE as i32,
            );
            if is_exception(value) {
                return Err(rquickjs::Error::Exception);
            }
            if !is_module(value) {
                qjs::JS_FreeValue(raw, value);
                return Err(Exception::throw_type(ctx, "bytecode is not a module"));
            }
            let def = NonNull::new(qjs::JS_VALUE_GET_PTR(value).cast::<qjs::JSModuleDef>())
                .ok_or_else(|| Exception::throw_internal(ctx, "module record is null"))?;
            Ok(Self {
                ctx: ctx.clone(),
                def,
            })
        }
    }

    fn as_value(&self) -> qjs::JSValue {
        unsafe { qjs::JS_MKPTR(qjs::JS_TAG_MODULE, self.def.as_ptr().cast()) }
    }

    /// Name the module was compiled under
    pub(crate) fn name(&self) -> rquickjs::Result<String> {
        let raw = self.ctx.as_raw().as_ptr();

        unsafe {
            let atom = qjs::JS_GetModuleName(raw, self.def.as_ptr());
            let text = qjs::JS_AtomToCString(raw, atom);
            qjs::JS_FreeAtom(raw, atom);
            if text.is_null() {
                return Err(rquickjs::Error::Exception);
            }
            let name = CStr::from_ptr(text).to_string_lossy().into_owned();
            qjs::JS_FreeCString(raw, text);
            Ok(name)
        }
    }

    /// Resolve the module's imports through the loader hook.
    ///
    /// Bytecode modules come out of the reader with their requested modules
    /// unbound; evaluating one in that state dereferences null records. On
    /// failure the engine frees every unresolved record, this one included.
    pub(crate) fn resolve(self) -> rquickjs::Result<Self> {
        let raw = self.ctx.as_raw().as_ptr();
        if unsafe { qjs::JS_ResolveModule(raw, self.as_value()) } < 0 {
            return Err(rquickjs::Error::Exception);
        }
        Ok(self)
    }

    /// Link and run the module body, returning the evaluation promise.
    pub(crate) fn evaluate(self) -> rquickjs::Result<Promise<'js>> {
        let raw = self.ctx.as_raw().as_ptr();

        let result = unsafe {
            // JS_EvalFunction consumes one reference to the module value.
            let value = qjs::JS_DupValue(raw, self.as_value());
            qjs::JS_EvalFunction(raw, value)
        };
        if is_exception(result) {
            return Err(rquickjs::Error::Exception);
        }
        let value = unsafe { Value::from_raw(self.ctx.clone(), result) };
        Promise::from_js(&self.ctx, value)
    }
}
