// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the bridge

use crate::codec::DecodeError;
use crate::handle::ValueHandle;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Name given to errors raised for failed host calls.
pub const HOST_CALL_ERROR_NAME: &str = "HostCallError";

/// A script exception captured at the boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptException {
    /// The `name` property of the thrown value, when it has one
    pub name: Option<String>,
    /// String form of the thrown value
    pub message: String,
    /// Stack trace, when the engine recorded one
    pub stack: Option<String>,
}

impl ScriptException {
    /// Exception carrying only a message.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            name: None,
            message: message.into(),
            stack: None,
        }
    }

    /// Whether this exception is a rejected or failed host call.
    pub fn is_host_call(&self) -> bool {
        self.name.as_deref() == Some(HOST_CALL_ERROR_NAME)
    }
}

impl fmt::Display for ScriptException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Step of a module load that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleStage {
    /// Reading the unit and extracting its name
    NameExtraction,
    /// Running the module body
    Evaluate,
    /// Resolving the module namespace by name
    Resolve,
}

impl fmt::Display for ModuleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stage = match self {
            Self::NameExtraction => "name extraction",
            Self::Evaluate => "evaluation",
            Self::Resolve => "resolution",
        };
        f.write_str(stage)
    }
}

/// Coarse classification of a [`BridgeError`], stable across the C boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Source failed to compile
    Compile,
    /// Bytecode blob was rejected
    Deserialize,
    /// Uncaught script exception
    EvalException,
    /// Module load failed
    Module,
    /// Host call failed or was rejected
    HostCall,
    /// Stale, released or foreign handle
    InvalidHandle,
    /// Caller passed an unusable argument
    InvalidArgument,
    /// Promise has not settled yet
    PromisePending,
    /// Engine or runtime failure
    Engine,
    /// Configuration or I/O failure
    Config,
}

/// Errors that can occur in the bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Source text failed to compile
    #[error("Compile error in '{filename}': {message}")]
    Compile {
        /// File name the source was compiled under
        filename: String,
        /// String form of the syntax error
        message: String,
    },

    /// Bytecode blob failed validation
    #[error("Invalid bytecode: {0}")]
    Deserialize(#[from] DecodeError),

    /// Uncaught exception during evaluation
    #[error("Uncaught {0}")]
    Eval(ScriptException),

    /// Module load failed at a given stage
    #[error("Module '{module}' failed during {stage}: {reason}")]
    Module {
        /// Module name
        module: String,
        /// Step that failed
        stage: ModuleStage,
        /// Failure detail
        reason: String,
    },

    /// Host call failed or was rejected
    #[error("Host call failed: {0}")]
    HostCall(ScriptException),

    /// Handle is stale, released, or belongs to another bridge
    #[error("Invalid value handle {0}")]
    InvalidHandle(ValueHandle),

    /// Wrong kind of value for the operation
    #[error("TypeError: {0}")]
    TypeError(String),

    /// Unusable argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Promise is still pending
    #[error("Promise is still pending")]
    PromisePending,

    /// Runtime or context construction failed
    #[error("Failed to initialize runtime: {0}")]
    RuntimeInit(String),

    /// Engine error
    #[error("{0}")]
    Engine(#[from] rquickjs::Error),

    /// File system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Invalid configuration in {}: {reason}", .path.display())]
    Config {
        /// Where the configuration came from
        path: PathBuf,
        /// Parse or validation failure
        reason: String,
    },

    /// JSON conversion error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BridgeError {
    /// Create a new TypeError
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::TypeError(msg.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Create a module error
    pub fn module(module: impl Into<String>, stage: ModuleStage, reason: impl Into<String>) -> Self {
        Self::Module {
            module: module.into(),
            stage,
            reason: reason.into(),
        }
    }

    /// Classify an uncaught exception. Host call failures keep their own kind.
    pub fn from_exception(exception: ScriptException) -> Self {
        if exception.is_host_call() {
            Self::HostCall(exception)
        } else {
            Self::Eval(exception)
        }
    }

    /// Coarse classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Compile { .. } => ErrorKind::Compile,
            Self::Deserialize(_) => ErrorKind::Deserialize,
            Self::Eval(_) | Self::TypeError(_) => ErrorKind::EvalException,
            Self::Module { .. } => ErrorKind::Module,
            Self::HostCall(_) => ErrorKind::HostCall,
            Self::InvalidHandle(_) => ErrorKind::InvalidHandle,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::PromisePending => ErrorKind::PromisePending,
            Self::RuntimeInit(_) | Self::Engine(_) => ErrorKind::Engine,
            Self::Io(_) | Self::Config { .. } | Self::Json(_) => ErrorKind::Config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_call_exceptions_are_classified() {
        let exception = ScriptException {
            name: Some(HOST_CALL_ERROR_NAME.to_string()),
            message: "HostCallError: boom".to_string(),
            stack: None,
        };
        let err = BridgeError::from_exception(exception);
        assert_eq!(err.kind(), ErrorKind::HostCall);

        let err = BridgeError::from_exception(ScriptException::message("Error: nope"));
        assert_eq!(err.kind(), ErrorKind::EvalException);
        assert_eq!(err.to_string(), "Uncaught Error: nope");
    }

    #[test]
    fn test_module_error_display() {
        let err = BridgeError::module("main.js", ModuleStage::Resolve, "not found");
        assert_eq!(
            err.to_string(),
            "Module 'main.js' failed during resolution: not found"
        );
    }
}
