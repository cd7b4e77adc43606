// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Bridge runtime, job draining and value classification.

pub mod bridge_runtime;
pub mod jobs;
pub mod value;

pub use bridge_runtime::{Bridge, ShutdownReport};
pub use jobs::DrainReport;
pub use value::{PromiseStatus, ValueKind};
