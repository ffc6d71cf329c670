//! Core domain models for relpipe
//!
//! This module defines the fundamental data structures that represent
//! build plans, pipelines, stages, and their runtime state.

pub mod config;
pub mod context;
pub mod fixup;
pub mod patch;
pub mod pipeline;
pub mod state;

pub use config::BuildPlan;
pub use context::*;
pub use pipeline::*;
pub use state::*;
