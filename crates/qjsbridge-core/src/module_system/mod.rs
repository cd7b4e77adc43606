// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module system
//!
//! A module loaded from bytecode goes through three steps, each with its own
//! failure stage (see [`crate::ModuleStage`]):
//!
//! 1. the unit is read into the engine and its name is taken from the module record
//! 2. the module body runs, registering exports and top-level effects
//! 3. the namespace is resolved by name through the engine's import hook
//!
//! Before step 1 the unit is read in a scratch runtime to check its record
//! name and that every static import is loaded or registered: an engine that
//! fails to resolve a module keeps its half-linked record around under that
//! name, so a missing import must be caught before the live context sees it.
//!
//! Loaded bytecode stays in a store that the loader hook serves, so modules
//! can `import` each other by name. A module is declared in the engine once:
//! its evaluation promise is kept from step 2 on, so a module whose top-level
//! `await` had not settled is picked up again at step 3 instead of running a
//! second time. Resolved namespaces are cached: loading the same module again
//! returns the same namespace object.

mod cache;
mod loader;
pub mod resolver;

pub(crate) use cache::ModuleCache;
pub(crate) use loader::{LoadedNames, ModuleLoader, ModuleStore, PlaceholderLoader};
pub(crate) use resolver::ModuleResolver;

use crate::codec::engine::ModuleRecord;
use crate::convert;
use crate::error::{BridgeError, ModuleStage, Result};
use rquickjs::{Context, Ctx, Persistent, Promise, Runtime};
use std::collections::{BTreeMap, BTreeSet};

/// Names the static imports of module `bytecode` resolve to.
///
/// The record is read in a scratch runtime whose loader hands out empty
/// modules, so nothing is declared in a bridge. Fails at `NameExtraction`
/// when the record is not named `name`.
pub(crate) fn static_imports(name: &str, bytecode: &[u8]) -> Result<BTreeSet<String>> {
    let requested = LoadedNames::default();
    let runtime = Runtime::new()?;
    runtime.set_loader(ModuleResolver, PlaceholderLoader::recording(requested.clone()));
    let scratch = Context::full(&runtime)?;

    scratch.with(|ctx| -> Result<()> {
        let failure = |stage: ModuleStage, err: rquickjs::Error| {
            BridgeError::module(name, stage, convert::catch_exception(&ctx, err).message)
        };
        let record = ModuleRecord::read(&ctx, bytecode)
            .map_err(|err| failure(ModuleStage::NameExtraction, err))?;
        let record_name = record
            .name()
            .map_err(|err| failure(ModuleStage::NameExtraction, err))?;
        if record_name != name {
            return Err(BridgeError::module(
                name,
                ModuleStage::NameExtraction,
                format!("module record is named '{record_name}'"),
            ));
        }
        record
            .resolve()
            .map_err(|err| failure(ModuleStage::Resolve, err))?;
        Ok(())
    })?;

    let names = requested.borrow().clone();
    Ok(names)
}

/// Per-bridge module state
#[derive(Default)]
pub(crate) struct ModuleRegistry {
    /// Bytecode the loader hook can instantiate
    pub(crate) store: ModuleStore,
    /// Namespaces of modules loaded and resolved
    pub(crate) cache: ModuleCache,
    /// Evaluation promises of the modules the bridge declared itself
    evaluations: BTreeMap<String, Persistent<Promise<'static>>>,
    /// Modules the loader hook declared while serving imports
    imported: LoadedNames,
}

impl ModuleRegistry {
    /// Resolver and loader hooks sharing this registry's store
    pub(crate) fn hooks(&self) -> (ModuleResolver, ModuleLoader) {
        (
            ModuleResolver,
            ModuleLoader::new(self.store.clone(), self.imported.clone()),
        )
    }

    /// Keep `bytecode` available to the loader under `name`.
    pub(crate) fn store(&self, name: &str, bytecode: &[u8]) {
        let previous = self
            .store
            .borrow_mut()
            .insert(name.to_string(), bytecode.to_vec());
        if previous.is_some() {
            tracing::debug!(event = "module.store.replace", name);
        }
    }

    /// Whether the engine already has a module record named `name`
    pub(crate) fn is_declared(&self, name: &str) -> bool {
        self.cache.has(name)
            || self.evaluations.contains_key(name)
            || self.imported.borrow().contains(name)
    }

    /// Check that module `name` and everything it imports can be linked.
    ///
    /// Imports already declared are taken as they are; stored ones are
    /// checked the same way, recursively.
    pub(crate) fn check_linkable(&self, name: &str, bytecode: &[u8]) -> Result<()> {
        let mut seen = BTreeSet::from([name.to_string()]);
        let mut queue = vec![(name.to_string(), bytecode.to_vec())];

        while let Some((importer, bytecode)) = queue.pop() {
            for import in static_imports(&importer, &bytecode)? {
                if self.is_declared(&import) || !seen.insert(import.clone()) {
                    continue;
                }
                let stored = self.store.borrow().get(&import).cloned();
                let Some(bytecode) = stored else {
                    return Err(BridgeError::module(
                        name,
                        ModuleStage::Resolve,
                        format!(
                            "'{importer}' imports '{import}', which is neither loaded nor registered"
                        ),
                    ));
                };
                queue.push((import, bytecode));
            }
        }
        Ok(())
    }

    /// Evaluation promise of a module the bridge declared
    pub(crate) fn evaluation<'js>(
        &self,
        ctx: &Ctx<'js>,
        name: &str,
    ) -> rquickjs::Result<Option<Promise<'js>>> {
        self.evaluations
            .get(name)
            .map(|promise| promise.clone().restore(ctx))
            .transpose()
    }

    /// Record that `name` was declared and started evaluating.
    pub(crate) fn record_evaluation<'js>(&mut self, ctx: &Ctx<'js>, name: &str, promise: Promise<'js>) {
        self.evaluations
            .insert(name.to_string(), Persistent::save(ctx, promise));
    }

    /// Names of every module loaded through the bridge
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self.cache.keys().cloned().collect();
        names.extend(self.evaluations.keys().cloned());
        names.extend(self.imported.borrow().iter().cloned());
        names.into_iter().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.cache.clear();
        self.evaluations.clear();
        self.imported.borrow_mut().clear();
        self.store.borrow_mut().clear();
    }
}
