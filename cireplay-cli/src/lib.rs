// Copyright (c) The cireplay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The `cireplay` command-line harness.
//!
//! Runs JVM compiler replay scenarios from [`cireplay_runner`] against a real JVM.

#![warn(missing_docs)]

mod app;
mod errors;
mod output;

#[doc(hidden)]
pub use app::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::{OutputContext, OutputWriter};
