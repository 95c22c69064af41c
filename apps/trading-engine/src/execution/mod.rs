//! Order execution.
//!
//! This module owns order placement: the limit-then-market tactic, the
//! single-flight slot that serializes attempts, and the emergency
//! square-off path.

mod engine;
mod slot;

pub use engine::ExecutionEngine;
pub use slot::ExecutionSlot;
