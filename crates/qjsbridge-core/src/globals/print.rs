// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! The `print` builtin

use crate::config::PrintTarget;
use rquickjs::function::Rest;
use rquickjs::{Coerced, Ctx, Function, Object};
use std::cell::RefCell;
use std::rc::Rc;

/// Lines captured under [`PrintTarget::Buffer`]
pub(crate) type OutputBuffer = Rc<RefCell<Vec<String>>>;

/// Install `print(...args)`: string forms joined by a space, one line per call.
pub(crate) fn install<'js>(
    ctx: &Ctx<'js>,
    global: &Object<'js>,
    target: PrintTarget,
    buffer: OutputBuffer,
) -> rquickjs::Result<()> {
    let print = Function::new(ctx.clone(), move |args: Rest<Coerced<String>>| {
        let line = args
            .0
            .into_iter()
            .map(|arg| arg.0)
            .collect::<Vec<_>>()
            .join(" ");

        match target {
            PrintTarget::Stdout => println!("{line}"),
            PrintTarget::Log => tracing::info!(target: "qjsbridge::print", "{line}"),
            PrintTarget::Buffer => buffer.borrow_mut().push(line),
            PrintTarget::Discard => {}
        }
    })?
    .with_name("print")?;

    global.set("print", print)
}
