//! # Tractify
//!
//! Batch graph assembly for per-subject structural-connectivity pipelines.
//!
//! Tractify turns a list of subjects into one executable processing graph:
//!
//! - **Discovery**: locate structural and diffusion files in a BIDS-style dataset
//! - **Port binding**: resolve every input of the tractography stage per session
//! - **Composition**: nest session pipelines in subject graphs in one batch graph
//! - **Failure isolation**: skip sessions with missing inputs, scope crash logs per subject
//!
//! Running the graph belongs to an [`engine::ExecutionEngine`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tractify::prelude::*;
//!
//! let params = BatchParameters::from_json_file(Path::new("batch.json"))?;
//! let composer = BatchGraphComposer::from_parameters(params)?;
//! let batch = composer.compose_with_report()?;
//!
//! let summary = PlanOnlyEngine::new().run(&batch.graph).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod builder;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod errors;
pub mod graph;
pub mod observability;
pub mod policy;
pub mod resolver;
pub mod stages;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::builder::{
        AssemblyReport, BatchGraphComposer, ComposedBatch, SkipRecord, SubjectGraphBuilder,
    };
    pub use crate::config::{BatchParameters, PipelineVariant, SessionFiles};
    pub use crate::discovery::{DatasetLayout, FileQuery, Layout, QueryScope};
    pub use crate::engine::{ExecutionEngine, ExecutionPlan, PlanOnlyEngine, RunSummary};
    pub use crate::errors::{
        GraphValidationError, MissingInputError, PortMismatchError, TractifyError,
    };
    pub use crate::graph::{Connection, Graph, Node, PortSpec, PortValue};
    pub use crate::observability::{init_logging, LoggingConfig};
    pub use crate::policy::{ExecutionPolicy, SubjectFailurePolicy};
    pub use crate::resolver::{InputSource, PortBindingResolver, PortBindings};
    pub use crate::stages::{StageGraphFactory, TractographyStages};
}
