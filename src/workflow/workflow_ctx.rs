//! 工作流上下文
//!
//! [`WorkflowContext`] 在启动时构建一次，持有全部协作方，之后只读共享；
//! [`WorkflowRun`] 记录"我正在处理哪份文档、已经试过哪些 CPF"。

use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::clients::LlmClient;
use crate::config::Config;
use crate::error::AppResult;
use crate::services::{
    AuditWriter, CommandConverter, DocumentExtractor, EmbeddingIndex, ExamSimilarityIndex,
    ExtractionService, IdentifierRecovery, PortalRosterLookup, ReconciliationEngine, RosterLookup,
    Validator,
};

/// 协作方集合（不可变）
pub struct WorkflowContext {
    pub extractor: Arc<dyn DocumentExtractor>,
    pub roster: Arc<dyn RosterLookup>,
    pub recovery: Arc<IdentifierRecovery>,
    pub validator: Arc<Validator>,
}

impl WorkflowContext {
    pub fn new(
        extractor: Arc<dyn DocumentExtractor>,
        roster: Arc<dyn RosterLookup>,
        recovery: Arc<IdentifierRecovery>,
        validator: Arc<Validator>,
    ) -> Self {
        Self {
            extractor,
            roster,
            recovery,
            validator,
        }
    }

    /// 按配置构建真实协作方；相似度索引在这里加载一次
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        let llm = Arc::new(LlmClient::new(config));

        let extractor = ExtractionService::new(
            Arc::new(CommandConverter::new(&config.converter_command)),
            llm.clone(),
        )
        .with_archive_dir(&config.ocr_results_dir);

        let mut engine = ReconciliationEngine::new(llm.clone(), config.similarity_neighbors);
        if let Some(index) =
            EmbeddingIndex::load_optional(Path::new(&config.similarity_index_path)).await?
        {
            engine = engine.with_similarity(Arc::new(ExamSimilarityIndex::new(
                Arc::new(index),
                llm.clone(),
            )));
        }

        let validator = Validator::new(Arc::new(engine), AuditWriter::new(&config.audit_dir));
        info!("✓ 工作流协作方初始化完成");

        Ok(Self::new(
            Arc::new(extractor),
            Arc::new(PortalRosterLookup::new(config)),
            Arc::new(IdentifierRecovery::new(llm)),
            Arc::new(validator),
        ))
    }
}

/// 状态机的状态
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowState {
    Started,
    Extracting,
    LookingUp(String),
    Reconciling,
    Completed,
    Failed,
}

/// 单次运行的可变记录
#[derive(Debug, Clone)]
pub struct WorkflowRun {
    /// 文档标签（仅用于日志显示）
    pub label: String,
    history: Vec<WorkflowState>,
    tried: Vec<String>,
}

impl WorkflowRun {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            history: vec![WorkflowState::Started],
            tried: Vec::new(),
        }
    }

    pub fn transition(&mut self, next: WorkflowState) {
        self.history.push(next);
    }

    pub fn state(&self) -> &WorkflowState {
        self.history.last().unwrap_or(&WorkflowState::Started)
    }

    pub fn history(&self) -> &[WorkflowState] {
        &self.history
    }

    /// 记为已尝试；之前已经试过则返回 false
    pub fn mark_tried(&mut self, cpf: &str) -> bool {
        if self.was_tried(cpf) {
            return false;
        }
        self.tried.push(cpf.to_string());
        true
    }

    pub fn was_tried(&self, cpf: &str) -> bool {
        self.tried.iter().any(|c| c == cpf)
    }

    /// 按尝试顺序
    pub fn tried(&self) -> &[String] {
        &self.tried
    }
}

impl Display for WorkflowRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[文档 {}]", self.label)
    }
}
