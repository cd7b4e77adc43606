// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Module name resolution
//!
//! Modules are identified by the filename they were compiled under.
//! Specifiers starting with `./` or `../` are joined to the importing module's
//! directory; any other specifier is already a module name.

use rquickjs::Ctx;
use rquickjs::loader::Resolver;

/// Whether `specifier` is relative to the importing module
pub fn is_relative(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../")
}

/// Resolve `specifier` as imported from the module named `base`.
pub fn normalize(base: &str, specifier: &str) -> String {
    if !is_relative(specifier) {
        return specifier.to_string();
    }

    let mut segments: Vec<&str> = match base.rfind('/') {
        Some(idx) => base[..idx].split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };

    for part in specifier.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    if base.starts_with('/') {
        format!("/{joined}")
    } else {
        joined
    }
}

/// The name a module is known by once imported.
///
/// `./` and `../` prefixes and `.`/`..` segments are folded the way
/// [`normalize`] folds a relative import from a top-level module, so a unit
/// compiled as `./answer.js` is stored, resolved and cached as `answer.js`.
pub fn canonical(name: &str) -> String {
    let folds = is_relative(name)
        || name
            .split('/')
            .any(|segment| segment == "." || segment == "..");
    if !folds {
        return name.to_string();
    }
    let (base, rest) = match name.strip_prefix('/') {
        Some(rest) => ("/", rest),
        None => ("", name),
    };
    let relative = if is_relative(rest) {
        rest.to_string()
    } else {
        format!("./{rest}")
    };
    normalize(base, &relative)
}

/// Resolver hook installed on the runtime
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct ModuleResolver;

impl Resolver for ModuleResolver {
    fn resolve<'js>(&mut self, _ctx: &Ctx<'js>, base: &str, name: &str) -> rquickjs::Result<String> {
        let resolved = normalize(base, name);
        tracing::trace!(event = "module.resolve", base, name, %resolved);
        Ok(resolved)
    }
}
