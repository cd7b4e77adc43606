// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bytecode codec
//!
//! Source is compiled without running it, written out as engine bytecode and
//! wrapped in an envelope (see [`envelope`]). Blobs are validated before any
//! engine reader sees them.

pub(crate) mod engine;
pub mod envelope;

pub use envelope::{DecodeError, ENGINE_TAG, FORMAT_VERSION, UnitHeader};

use crate::convert;
use crate::error::{BridgeError, Result};
use crate::module_system::resolver::{self, ModuleResolver};
use crate::module_system::PlaceholderLoader;
use rquickjs::{Context, Runtime};
use std::ffi::CString;
use std::fmt;

/// Whether a unit is a classic script or a module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Global script; evaluation yields its completion value
    Script,
    /// Module; evaluation registers exports
    Module,
}

impl UnitKind {
    /// Kind for an `is_module` flag
    pub fn from_module_flag(is_module: bool) -> Self {
        if is_module { Self::Module } else { Self::Script }
    }

    pub(crate) fn as_byte(self) -> u8 {
        match self {
            Self::Script => 0,
            Self::Module => 1,
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Script),
            1 => Some(Self::Module),
            _ => None,
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Script => f.write_str("script"),
            Self::Module => f.write_str("module"),
        }
    }
}

/// A compiled, not yet executed unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledUnit {
    name: String,
    kind: UnitKind,
    bytecode: Vec<u8>,
}

impl CompiledUnit {
    /// Unit name: the filename it was compiled under, and the module identity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Script or module
    pub fn kind(&self) -> UnitKind {
        self.kind
    }

    /// Raw engine bytecode
    pub fn bytecode(&self) -> &[u8] {
        &self.bytecode
    }

    /// Wrap the bytecode in an envelope.
    pub fn serialize(&self) -> Vec<u8> {
        envelope::encode(self.kind, &self.name, &self.bytecode)
    }

    /// Validate a blob and recover the unit.
    pub fn deserialize(blob: &[u8]) -> std::result::Result<Self, DecodeError> {
        let (header, payload) = envelope::decode(blob)?;
        Ok(Self {
            name: header.name,
            kind: header.kind,
            bytecode: payload.to_vec(),
        })
    }

    /// Validate a blob and report its header.
    pub fn inspect(blob: &[u8]) -> std::result::Result<UnitHeader, DecodeError> {
        envelope::decode(blob).map(|(header, _)| header)
    }
}

/// Engine-ready copies of a filename and its source.
pub(crate) fn source_cstrings(filename: &str, source: &str) -> Result<(CString, CString)> {
    if filename.len() > u16::MAX as usize {
        return Err(BridgeError::invalid_argument("filename is too long"));
    }
    let c_filename = CString::new(filename)
        .map_err(|_| BridgeError::invalid_argument("filename contains a NUL byte"))?;
    let c_source = CString::new(source).map_err(|_| BridgeError::Compile {
        filename: filename.to_string(),
        message: "source contains a NUL byte".to_string(),
    })?;
    Ok((c_filename, c_source))
}

/// Compile `source` under `filename` without executing it.
///
/// Compilation gets a runtime of its own whose loader answers every import
/// with an empty module: the engine resolves a module's imports while
/// compiling it, but the bytecode only records their names. Module units are
/// named the way the resolver names imports (see [`resolver::canonical`]).
pub(crate) fn compile(filename: &str, source: &str, kind: UnitKind) -> Result<CompiledUnit> {
    let name = match kind {
        UnitKind::Script => filename.to_string(),
        UnitKind::Module => resolver::canonical(filename),
    };
    let (c_filename, c_source) = source_cstrings(&name, source)?;

    let runtime = Runtime::new()?;
    runtime.set_loader(ModuleResolver, PlaceholderLoader::default());
    let scratch = Context::full(&runtime)?;
    let bytecode = scratch.with(|ctx| {
        engine::compile(&ctx, &c_filename, &c_source, kind).map_err(|err| BridgeError::Compile {
            filename: filename.to_string(),
            message: convert::catch_exception(&ctx, err).message,
        })
    })?;

    tracing::debug!(
        event = "codec.compile",
        filename,
        name = %name,
        %kind,
        bytes = bytecode.len(),
        "Compiled unit"
    );

    Ok(CompiledUnit {
        name,
        kind,
        bytecode,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_and_serialize_script() {
        let unit = compile("answer.js", "6 * 7", UnitKind::Script).unwrap();
        assert_eq!(unit.name(), "answer.js");
        assert!(!unit.bytecode().is_empty());

        let blob = unit.serialize();
        let header = CompiledUnit::inspect(&blob).unwrap();
        assert_eq!(header.kind, UnitKind::Script);
        assert_eq!(header.payload_len, unit.bytecode().len());
        assert_eq!(CompiledUnit::deserialize(&blob).unwrap(), unit);
    }

    #[test]
    fn test_compile_error_reports_syntax_error() {
        let err = compile("bad.js", "let = ;", UnitKind::Script).unwrap_err();
        match err {
            BridgeError::Compile { filename, message } => {
                assert_eq!(filename, "bad.js");
                assert!(message.contains("SyntaxError"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_module_compile_does_not_resolve_imports() {
        let unit = compile(
            "main.js",
            "import { x } from './missing.js'; export const y = x + 1;",
            UnitKind::Module,
        )
        .unwrap();
        assert_eq!(unit.kind(), UnitKind::Module);
    }

    #[test]
    fn test_module_names_match_resolved_imports() {
        let unit = compile("./answer.js", "export const a = 1;", UnitKind::Module).unwrap();
        assert_eq!(unit.name(), "answer.js");

        let unit = compile("lib/../util/./fmt.js", "export {};", UnitKind::Module).unwrap();
        assert_eq!(unit.name(), "util/fmt.js");

        // Script names are only used for diagnostics.
        let unit = compile("./run.js", "1", UnitKind::Script).unwrap();
        assert_eq!(unit.name(), "./run.js");
    }

    #[test]
    fn test_payload_from_another_engine_build_is_rejected_by_the_reader() {
        let mut bridge = crate::Bridge::new(crate::BridgeConfig::default()).unwrap();

        let script = CompiledUnit {
            name: "foreign.js".to_string(),
            kind: UnitKind::Script,
            bytecode: vec![0xfe; 24],
        };
        assert!(bridge.eval_bytecode(&script.serialize()).is_err());

        let module = CompiledUnit {
            name: "foreign.js".to_string(),
            kind: UnitKind::Module,
            bytecode: vec![0xfe; 24],
        };
        let err = bridge.load_bytecode(&module.serialize()).unwrap_err();
        assert!(
            matches!(
                err,
                BridgeError::Module {
                    stage: crate::ModuleStage::NameExtraction,
                    ..
                }
            ),
            "{err}"
        );
        assert!(bridge.loaded_modules().is_empty());
    }

    #[test]
    fn test_nul_in_source_is_a_compile_error() {
        let err = compile("nul.js", "1\0+1", UnitKind::Script).unwrap_err();
        assert!(matches!(err, BridgeError::Compile { .. }));
    }
}
