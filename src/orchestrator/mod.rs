//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责批量处理和流程调度，只做调度和统计，不做具体业务判断。
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理 Vec<DocumentJob>)
//!     ↓
//! job_processor (处理单个 DocumentJob)
//!     ↓
//! workflow::DocumentWorkflow (提取 → 名册 → 候选 CPF → 比对)
//!     ↓
//! services (能力层：extraction / roster / recovery / reconciliation / audit)
//!     ↓
//! infrastructure (基础设施：JsExecutor) + clients (LLM)
//! ```

pub mod batch_processor;
pub mod job_processor;

pub use batch_processor::{App, ProcessingStats};
pub use job_processor::{process_job, JobOutcome};
