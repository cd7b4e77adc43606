// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Namespace cache for loaded modules

use rquickjs::{Ctx, Object, Persistent};
use std::collections::BTreeMap;

/// Cached module entry
pub(crate) struct CachedModule {
    /// The module's namespace object
    namespace: Persistent<Object<'static>>,
    /// How many times the module was requested
    loads: usize,
}

/// Loaded modules by name
#[derive(Default)]
pub(crate) struct ModuleCache {
    cache: BTreeMap<String, CachedModule>,
}

impl ModuleCache {
    /// Record a freshly resolved namespace.
    pub(crate) fn insert<'js>(&mut self, ctx: &Ctx<'js>, name: String, namespace: Object<'js>) {
        self.cache.insert(
            name,
            CachedModule {
                namespace: Persistent::save(ctx, namespace),
                loads: 1,
            },
        );
    }

    /// Namespace of a loaded module, counting the request.
    pub(crate) fn get<'js>(
        &mut self,
        ctx: &Ctx<'js>,
        name: &str,
    ) -> rquickjs::Result<Option<Object<'js>>> {
        let Some(entry) = self.cache.get_mut(name) else {
            return Ok(None);
        };
        entry.loads += 1;
        tracing::trace!(event = "module.cache.hit", name, loads = entry.loads);
        entry.namespace.clone().restore(ctx).map(Some)
    }

    /// Check if a module is cached
    pub(crate) fn has(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Get all cached module names
    pub(crate) fn keys(&self) -> impl Iterator<Item = &String> {
        self.cache.keys()
    }

    /// Clear the entire cache
    pub(crate) fn clear(&mut self) {
        self.cache.clear();
    }
}
