//! Graph composition for a batch of subjects.
//!
//! The batch graph nests three levels of composites:
//!
//! ```text
//! tractify_wf
//! └── single_subject_<id>_wf              (one per subject)
//!     └── sub_<id>_ses_<ses>_preproc_wf   (one per session)
//!         ├── tract_wf
//!         └── tract_output_wf             (full variant only)
//! ```

mod batch;
mod report;
mod subject;

#[cfg(test)]
mod integration_tests;

pub use batch::{BatchGraphComposer, ComposedBatch};
pub use report::{AssemblyReport, SkipRecord};
pub use subject::{SubjectAssembly, SubjectGraphBuilder};

/// Name of the top-level batch graph.
pub const BATCH_GRAPH: &str = "tractify_wf";

/// Name of a subject graph.
#[must_use]
pub fn subject_graph_name(subject_id: &str) -> String {
    format!("single_subject_{subject_id}_wf")
}

/// Name of a session pipeline graph.
#[must_use]
pub fn session_graph_name(subject_id: &str, session_id: &str) -> String {
    format!("sub_{subject_id}_ses_{session_id}_preproc_wf")
}
