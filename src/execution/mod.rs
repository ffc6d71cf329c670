//! Pipeline execution

pub mod engine;

pub use engine::{BuildEvent, EventHandler, ExecutionEngine};
