//! # Exam Liberation
//!
//! 体检文档放行校验：文档 → CPF → BRMED 名册 → 检索增强的 LLM 比对 → 放行结论
//!
//! ## 架构设计
//!
//! 本系统采用严格的四层架构：
//!
//! ### ① 基础设施层（Infrastructure）
//! - `infrastructure/` - 持有稀缺资源（Page），只暴露能力
//! - `JsExecutor` - 门户自动化使用的唯一 page owner
//! - `clients/` - LLM / Embedding 客户端（带重试）
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，每个服务只有一种能力
//! - `ExtractionService` - 文档转文本，提取 CPF 和检查项目
//! - `PortalRosterLookup` - 在 BRMED 门户查询必检名册
//! - `IdentifierRecovery` - 从文本中恢复候选 CPF
//! - `ReconciliationEngine` - 同义词检索 + 模型比对
//! - `Validator` / `AuditWriter` - 放行结论和审计文件
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一份文档"的完整处理流程
//! - `WorkflowContext` - 协作方集合（启动时构建一次）
//! - `DocumentWorkflow` - 流程编排（提取 → 名册 → 候选 CPF → 比对）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量任务处理器，管理并发
//! - `orchestrator/job_processor` - 单个任务处理器，写结果文件

pub mod browser;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use infrastructure::JsExecutor;
pub use models::{
    ComparisonVerdict, DecisionRecord, Document, FailureRecord, ProgressEvent, ProgressStep,
    VerdictStatus, WorkflowEvent, WorkflowResponse,
};
pub use orchestrator::{process_job, App};
pub use workflow::{DocumentWorkflow, ProgressReporter, WorkflowContext};
