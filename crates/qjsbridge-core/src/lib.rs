// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # qjsbridge-core
//!
//! An embedding bridge for the QuickJS engine.
//!
//! ## Overview
//!
//! A [`Bridge`] owns one engine runtime and context and exposes them to a
//! host program:
//! - Source compiled ahead of time into self-describing bytecode blobs
//! - Scripts and modules evaluated from source or bytecode
//! - Engine values referenced through opaque [`ValueHandle`]s
//! - Host functions installed on a namespace object (`env` by default)
//! - Async host calls: script receives a promise, the host settles it later
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use qjsbridge_core::{Bridge, BridgeConfig};
//!
//! let mut bridge = Bridge::new(BridgeConfig::default())?;
//! let result = bridge.eval("1 + 1")?;
//! assert_eq!(bridge.get_string(result)?, "2");
//! ```
//!
//! A bridge is confined to the thread that created it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
mod convert;
pub mod error;
mod globals;
mod handle;
pub mod host;
pub mod module_system;
pub mod runtime;

// Re-exports for convenience
pub use codec::{CompiledUnit, DecodeError, UnitHeader, UnitKind};
pub use config::{BridgeConfig, PrintTarget};
pub use error::{BridgeError, ErrorKind, ModuleStage, Result, ScriptException};
pub use handle::ValueHandle;
pub use host::{
    AsyncCallId, AsyncDispatcher, AsyncOutcome, AsyncRequest, Completion, HostFunction,
    HostFunctionDescriptor,
};
pub use runtime::{Bridge, DrainReport, PromiseStatus, ShutdownReport, ValueKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
