// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sift-router: the orchestrator that owns the worker pool, the
//! production and test queues, and the live routing entry tables.

pub mod api;
pub mod environment;
pub mod orchestrator;
pub mod table;
pub mod types;
mod worker;

pub use api::{RouterApi, TesterApi, TestFuture};
pub use environment::{Environment, EnvironmentBuilder};
pub use orchestrator::{Options, Orchestrator};
pub use types::{prod, test, DeliveryFn};
