pub mod decision;
pub mod exam;
pub mod extraction;
pub mod job;
pub mod loaders;
pub mod progress;
pub mod roster;

pub use decision::{DecisionRecord, FailureRecord, RunStatus, ValidationResult, WorkflowResponse};
pub use exam::{parse_required_exams, validate_required_exams, ComparisonVerdict, VerdictStatus};
pub use extraction::{Document, ExtractionOutput};
pub use job::DocumentJob;
pub use loaders::{load_all_jobs, load_toml_to_job};
pub use progress::{ProgressEvent, ProgressStep, WorkflowEvent};
pub use roster::{Roster, RosterOutcome};
