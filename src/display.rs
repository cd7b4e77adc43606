// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Terminal rendering of values and errors

use owo_colors::OwoColorize;
use qjsbridge_core::{Bridge, BridgeError, PromiseStatus, ValueHandle, ValueKind};

/// Render a value with syntax coloring.
pub fn format_value(bridge: &mut Bridge, handle: ValueHandle) -> qjsbridge_core::Result<String> {
    let kind = bridge.value_kind(handle)?;
    Ok(match kind {
        ValueKind::Undefined => "undefined".blue().dimmed().to_string(),
        ValueKind::Null => "null".blue().to_string(),
        ValueKind::Boolean | ValueKind::Number => bridge.get_string(handle)?.yellow().to_string(),
        ValueKind::BigInt => format!("{}n", bridge.get_string(handle)?).yellow().to_string(),
        ValueKind::String => format!("'{}'", bridge.get_string(handle)?).green().to_string(),
        ValueKind::Symbol => bridge.get_string(handle)?.magenta().to_string(),
        ValueKind::Function => "[Function]".magenta().to_string(),
        ValueKind::Promise => format_promise(bridge, handle)?,
        ValueKind::Array | ValueKind::Object => {
            serde_json::to_string(&bridge.to_json(handle)?)?.cyan().to_string()
        }
        ValueKind::Other => bridge.get_string(handle)?,
    })
}

fn format_promise(bridge: &mut Bridge, handle: ValueHandle) -> qjsbridge_core::Result<String> {
    let state = bridge.promise_state(handle)?;
    if state == PromiseStatus::Pending {
        return Ok(format!("Promise {{ {} }}", "<pending>".dimmed()));
    }

    let result = bridge.get_promise_result(handle)?;
    let inner = format_value(bridge, result);
    bridge.release(result)?;
    let inner = inner?;
    Ok(match state {
        PromiseStatus::Rejected => format!("Promise {{ {} {inner} }}", "<rejected>".red()),
        _ => format!("Promise {{ {inner} }}"),
    })
}

/// Whether a value is worth echoing after a non-interactive run.
pub fn is_silent(bridge: &Bridge, handle: ValueHandle) -> qjsbridge_core::Result<bool> {
    Ok(bridge.value_kind(handle)? == ValueKind::Undefined)
}

/// Print an error, its kind in color.
pub fn print_error(error: &BridgeError) {
    let text = error.to_string();
    match text.split_once(':') {
        Some((head, rest)) => eprintln!("{}:{rest}", head.red().bold()),
        None => eprintln!("{}", text.red()),
    }
    if let BridgeError::Eval(exception) | BridgeError::HostCall(exception) = error {
        if let Some(stack) = &exception.stack {
            eprintln!("{}", stack.trim_end().dimmed());
        }
    }
}
