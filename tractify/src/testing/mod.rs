//! Testing utilities for graph assembly.
//!
//! This module provides:
//! - Dataset fixtures, in memory or materialised on disk
//! - A recording execution engine
//! - Stage factories that count instances or break their port contract

mod fixtures;
mod mocks;

pub use fixtures::{sample_parameters, DatasetFixture};
pub use mocks::{CountingStages, MisdeclaredStages, RecordingEngine};
