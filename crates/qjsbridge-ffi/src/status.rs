// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Status codes returned by every export

use qjsbridge_core::{BridgeError, Completion, ErrorKind};

/// Result of an exported call. Zero is success; failures are negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Success
    Ok = 0,
    /// Source failed to compile
    Compile = -1,
    /// Bytecode blob was rejected
    Deserialize = -2,
    /// Uncaught script exception
    Eval = -3,
    /// Module load failed
    Module = -4,
    /// Host call failed or was rejected
    HostCall = -5,
    /// Stale, released or foreign handle
    InvalidHandle = -6,
    /// No bridge on this thread
    NotInitialized = -7,
    /// Null pointer, bad UTF-8 or otherwise unusable argument
    InvalidArgument = -8,
    /// Called back into the bridge while it was running
    Busy = -9,
    /// Engine or internal failure
    Engine = -10,
    /// Promise has not settled yet
    PromisePending = -11,
}

impl Status {
    /// The integer handed across the boundary
    pub const fn code(self) -> i32 {
        self as i32
    }
}

impl From<ErrorKind> for Status {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::Compile => Self::Compile,
            ErrorKind::Deserialize => Self::Deserialize,
            ErrorKind::EvalException => Self::Eval,
            ErrorKind::Module => Self::Module,
            ErrorKind::HostCall => Self::HostCall,
            ErrorKind::InvalidHandle => Self::InvalidHandle,
            ErrorKind::InvalidArgument | ErrorKind::Config => Self::InvalidArgument,
            ErrorKind::PromisePending => Self::PromisePending,
            ErrorKind::Engine => Self::Engine,
        }
    }
}

/// A failed export: the status to return and the message for `qjsbridge_last_error`.
#[derive(Debug)]
pub(crate) struct Failure {
    pub(crate) status: Status,
    pub(crate) message: String,
}

impl Failure {
    pub(crate) fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Status::InvalidArgument, message)
    }
}

impl From<BridgeError> for Failure {
    fn from(err: BridgeError) -> Self {
        Self::new(err.kind().into(), err.to_string())
    }
}

/// Integer form of a [`Completion`] written by `qjsbridge_promise_callback`.
pub(crate) fn completion_code(completion: Completion) -> i32 {
    match completion {
        Completion::Resolved => 0,
        Completion::Rejected => 1,
        Completion::AlreadySettled => 2,
        Completion::Unknown => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qjsbridge_core::ModuleStage;

    #[test]
    fn test_error_kinds_map_to_codes() {
        let err = BridgeError::module("main.js", ModuleStage::Resolve, "missing");
        assert_eq!(Failure::from(err).status.code(), -4);
        assert_eq!(Status::from(ErrorKind::PromisePending).code(), -11);
        assert_eq!(Status::from(ErrorKind::Config), Status::InvalidArgument);
    }
}
