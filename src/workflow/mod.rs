pub mod document_flow;
pub mod progress;
pub mod workflow_ctx;

pub use document_flow::DocumentWorkflow;
pub use progress::ProgressReporter;
pub use workflow_ctx::{WorkflowContext, WorkflowRun, WorkflowState};
