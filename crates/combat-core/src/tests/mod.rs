//! Crate-level scenario, determinism and property tests.
//!
//! Unit tests live next to the code they cover. This module drives the public
//! combatant and server API against a fake world:
//! - **Integration tests**: arbitration, cooldowns, crowd control, off-hand
//!   skills, damage and the server loop, end to end
//! - **Determinism tests**: the same seed and inputs give the same envelopes
//! - **Property tests**: arbitration and cooldown invariants over random input
//!
//! # Test Structure
//!
//! - `integration.rs`: end-to-end scenarios
//! - `determinism.rs`: replay checks
//! - `properties.rs`: `proptest` suites
//! - `helpers.rs`: fake world, fake ledger and factory functions

mod determinism;
mod helpers;
mod integration;

pub use helpers::*;
