// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Conversions between engine values, JSON and exceptions

use crate::error::{BridgeError, ScriptException};
use rquickjs::{Array, Coerced, Ctx, Exception, FromJs, IntoJs, Object, Value};

/// Nesting limit for JSON conversion. Cyclic objects hit it instead of recursing forever.
const MAX_JSON_DEPTH: usize = 128;

/// Build an engine value from JSON.
pub(crate) fn json_to_js<'js>(
    ctx: &Ctx<'js>,
    value: &serde_json::Value,
) -> rquickjs::Result<Value<'js>> {
    match value {
        serde_json::Value::Null => Ok(Value::new_null(ctx.clone())),
        serde_json::Value::Bool(b) => Ok(Value::new_bool(ctx.clone(), *b)),
        serde_json::Value::Number(n) => {
            if let Some(int) = n.as_i64().and_then(|i| i32::try_from(i).ok()) {
                Ok(Value::new_int(ctx.clone(), int))
            } else {
                Ok(n.as_f64().map_or_else(
                    || Value::new_null(ctx.clone()),
                    |f| Value::new_number(ctx.clone(), f),
                ))
            }
        }
        serde_json::Value::String(s) => s.as_str().into_js(ctx),
        serde_json::Value::Array(items) => {
            let array = Array::new(ctx.clone())?;
            for (i, item) in items.iter().enumerate() {
                array.set(i, json_to_js(ctx, item)?)?;
            }
            Ok(array.into_value())
        }
        serde_json::Value::Object(map) => {
            let object = Object::new(ctx.clone())?;
            for (key, item) in map {
                object.set(key.as_str(), json_to_js(ctx, item)?)?;
            }
            Ok(object.into_value())
        }
    }
}

/// Convert an engine value to JSON. Undefined, functions and symbols become null.
pub(crate) fn js_to_json(value: &Value<'_>) -> rquickjs::Result<serde_json::Value> {
    to_json_at(value, 0)
}

fn to_json_at(value: &Value<'_>, depth: usize) -> rquickjs::Result<serde_json::Value> {
    if depth > MAX_JSON_DEPTH {
        return Err(Exception::throw_range(
            value.ctx(),
            "value is nested too deeply to convert to JSON",
        ));
    }

    if value.is_null() || value.is_undefined() {
        return Ok(serde_json::Value::Null);
    }
    if let Some(b) = value.as_bool() {
        return Ok(serde_json::Value::Bool(b));
    }
    if let Some(i) = value.as_int() {
        return Ok(serde_json::Value::from(i));
    }
    if let Some(f) = value.as_float() {
        return Ok(serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null));
    }
    if let Some(s) = value.as_string() {
        return Ok(serde_json::Value::String(s.to_string()?));
    }
    if value.is_function() || value.is_symbol() {
        return Ok(serde_json::Value::Null);
    }
    if let Some(array) = value.as_array() {
        let mut items = Vec::with_capacity(array.len());
        for item in array.iter::<Value<'_>>() {
            items.push(to_json_at(&item?, depth + 1)?);
        }
        return Ok(serde_json::Value::Array(items));
    }
    if let Some(object) = value.as_object() {
        let mut map = serde_json::Map::new();
        for prop in object.props::<String, Value<'_>>() {
            let (key, item) = prop?;
            map.insert(key, to_json_at(&item, depth + 1)?);
        }
        return Ok(serde_json::Value::Object(map));
    }
    Ok(serde_json::Value::Null)
}

/// String form of a value, as `String(value)` would produce it.
pub(crate) fn coerce_string<'js>(ctx: &Ctx<'js>, value: Value<'js>) -> rquickjs::Result<String> {
    Ok(Coerced::<String>::from_js(ctx, value)?.0)
}

/// Describe a thrown value.
pub(crate) fn describe_exception<'js>(ctx: &Ctx<'js>, thrown: Value<'js>) -> ScriptException {
    let mut exception = ScriptException::message(String::new());

    if let Some(object) = thrown.as_object() {
        exception.name = object.get::<_, Option<String>>("name").ok().flatten();
        if let Some(error) = Exception::from_object(object.clone()) {
            exception.stack = error.stack().filter(|stack| !stack.is_empty());
        }
    }

    exception.message = match coerce_string(ctx, thrown) {
        Ok(text) => text,
        Err(err) => format!("(exception could not be converted to a string: {err})"),
    };
    exception
}

/// Turn an engine error into a [`ScriptException`], taking the pending exception if one was thrown.
pub(crate) fn catch_exception(ctx: &Ctx<'_>, err: rquickjs::Error) -> ScriptException {
    if matches!(err, rquickjs::Error::Exception) {
        let thrown = ctx.catch();
        describe_exception(ctx, thrown)
    } else {
        ScriptException::message(err.to_string())
    }
}

/// Map an engine error at the bridge boundary. Thrown values become [`BridgeError::Eval`]
/// or [`BridgeError::HostCall`]; everything else stays an engine error.
pub(crate) fn to_bridge_error(ctx: &Ctx<'_>, err: rquickjs::Error) -> BridgeError {
    if matches!(err, rquickjs::Error::Exception) {
        BridgeError::from_exception(catch_exception(ctx, err))
    } else {
        BridgeError::Engine(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rquickjs::{Context, Runtime};
    use serde_json::json;

    fn with_ctx<F: FnOnce(Ctx<'_>)>(f: F) {
        let runtime = Runtime::new().unwrap();
        let context = Context::full(&runtime).unwrap();
        context.with(f);
    }

    #[test]
    fn test_json_conversion_preserves_structure() {
        with_ctx(|ctx| {
            let input = json!({"name": "sleep", "duration": 500, "ratio": 0.5, "tags": ["a", null, true]});
            let value = json_to_js(&ctx, &input).unwrap();
            assert_eq!(js_to_json(&value).unwrap(), input);
        });
    }

    #[test]
    fn test_undefined_and_functions_become_null() {
        with_ctx(|ctx| {
            let value: Value = ctx.eval("({ a: undefined, f() {}, n: NaN })").unwrap();
            assert_eq!(js_to_json(&value).unwrap(), json!({"a": null, "f": null, "n": null}));
        });
    }

    #[test]
    fn test_cyclic_values_are_rejected() {
        with_ctx(|ctx| {
            let value: Value = ctx.eval("const o = {}; o.self = o; o").unwrap();
            assert!(js_to_json(&value).is_err());
            let _ = ctx.catch();
        });
    }

    #[test]
    fn test_exception_description() {
        with_ctx(|ctx| {
            let err = ctx
                .eval::<Value, _>("throw new TypeError('bad input')")
                .unwrap_err();
            let exception = catch_exception(&ctx, err);
            assert_eq!(exception.name.as_deref(), Some("TypeError"));
            assert_eq!(exception.message, "TypeError: bad input");

            let err = ctx.eval::<Value, _>("throw 42").unwrap_err();
            let exception = catch_exception(&ctx, err);
            assert_eq!(exception.name, None);
            assert_eq!(exception.message, "42");
        });
    }
}
