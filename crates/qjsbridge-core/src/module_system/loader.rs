// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Loader hooks: registered module bytecode by name, and empty placeholder
//! modules for compilation

use rquickjs::loader::Loader;
use rquickjs::module::Declared;
use rquickjs::{Ctx, Module};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// Module bytecode keyed by module name
pub(crate) type ModuleStore = Rc<RefCell<HashMap<String, Vec<u8>>>>;

/// Names of the modules the loader hook declared in the engine
pub(crate) type LoadedNames = Rc<RefCell<BTreeSet<String>>>;

/// Loader hook installed on the runtime
#[derive(Clone)]
pub(crate) struct ModuleLoader {
    store: ModuleStore,
    loaded: LoadedNames,
}

impl ModuleLoader {
    pub(crate) fn new(store: ModuleStore, loaded: LoadedNames) -> Self {
        Self { store, loaded }
    }
}

impl Loader for ModuleLoader {
    fn load<'js>(&mut self, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Module<'js, Declared>> {
        let bytecode = self.store.borrow().get(name).cloned().ok_or_else(|| {
            rquickjs::Error::new_loading_message(name, "no module registered under this name")
        })?;

        tracing::debug!(event = "module.load", name, bytes = bytecode.len());

        // Only bytecode that passed envelope validation enters the store.
        let module = unsafe { Module::load(ctx.clone(), &bytecode) }?;
        self.loaded.borrow_mut().insert(name.to_string());
        Ok(module)
    }
}

/// Loader hook of scratch runtimes: every import is an empty module.
///
/// Imports are linked when the compiled unit is evaluated in a bridge, so
/// nothing about the placeholder ends up in the bytecode. A recording loader
/// also notes each name it was asked for.
#[derive(Debug, Clone, Default)]
pub(crate) struct PlaceholderLoader {
    requested: Option<LoadedNames>,
}

impl PlaceholderLoader {
    pub(crate) fn recording(requested: LoadedNames) -> Self {
        Self {
            requested: Some(requested),
        }
    }
}

impl Loader for PlaceholderLoader {
    fn load<'js>(&mut self, ctx: &Ctx<'js>, name: &str) -> rquickjs::Result<Module<'js, Declared>> {
        tracing::trace!(event = "module.placeholder", name);
        if let Some(requested) = &self.requested {
            requested.borrow_mut().insert(name.to_string());
        }
        Module::declare(ctx.clone(), name, "")
    }
}
