//! 批量文档处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量文档任务的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：校验配置，构建工作流协作方（LLM、索引、门户）
//! 2. **批量加载**：扫描并加载所有待处理的任务清单（`Vec<DocumentJob>`）
//! 3. **并发控制**：使用 Semaphore 限制同时处理的文档数
//! 4. **全局统计**：汇总所有任务的处理结果
//!
//! 工作流是无状态的，每个任务拿到一个克隆即可并发运行。

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{load_all_jobs, DocumentJob};
use crate::orchestrator::job_processor::{self, JobOutcome};
use crate::utils::logging;
use crate::workflow::{DocumentWorkflow, WorkflowContext};

/// 应用主结构
pub struct App {
    config: Config,
    workflow: DocumentWorkflow,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        config.validate()?;
        let ctx = WorkflowContext::from_config(&config).await?;
        Ok(Self::with_context(config, Arc::new(ctx)))
    }

    /// 使用现成的协作方构建（测试或嵌入时使用）
    pub fn with_context(config: Config, ctx: Arc<WorkflowContext>) -> Self {
        Self {
            config,
            workflow: DocumentWorkflow::new(ctx),
        }
    }

    pub fn workflow(&self) -> &DocumentWorkflow {
        &self.workflow
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<ProcessingStats> {
        info!("\n📁 正在扫描待处理的任务清单...");
        let jobs = load_all_jobs(&self.config.jobs_folder).await?;

        if jobs.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(ProcessingStats::default());
        }

        logging::log_jobs_loaded(jobs.len(), self.config.max_concurrent_documents);

        let stats = self.process_all_jobs(jobs).await?;

        logging::print_final_stats(
            stats.completed,
            stats.liberated,
            stats.failed,
            stats.total,
            &self.config.output_folder,
        );

        Ok(stats)
    }

    /// 并发处理所有任务
    async fn process_all_jobs(&self, jobs: Vec<DocumentJob>) -> Result<ProcessingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_documents));
        let mut stats = ProcessingStats {
            total: jobs.len(),
            ..Default::default()
        };

        let mut handles = Vec::with_capacity(jobs.len());
        for (idx, job) in jobs.into_iter().enumerate() {
            let job_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let workflow = self.workflow.clone();
            let output_folder = self.config.output_folder.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                job_processor::process_job(&workflow, &job, job_index, &output_folder).await
            });
            handles.push((job_index, handle));
        }

        for (job_index, handle) in handles {
            match handle.await {
                Ok(Ok(outcome)) => stats.record(outcome),
                Ok(Err(e)) => {
                    error!("[任务 {}] ❌ 结果写入失败: {}", job_index, e);
                    stats.failed += 1;
                }
                Err(e) => {
                    error!("[任务 {}] 任务执行失败: {}", job_index, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

/// 处理统计
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ProcessingStats {
    /// 完成比对（无论是否放行）
    pub completed: usize,
    pub liberated: usize,
    pub failed: usize,
    pub total: usize,
}

impl ProcessingStats {
    fn record(&mut self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Completed { liberated } => {
                self.completed += 1;
                if liberated {
                    self.liberated += 1;
                }
            }
            JobOutcome::NoRoster | JobOutcome::Failed => self.failed += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_record() {
        let mut stats = ProcessingStats::default();
        stats.record(JobOutcome::Completed { liberated: true });
        stats.record(JobOutcome::Completed { liberated: false });
        stats.record(JobOutcome::NoRoster);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.liberated, 1);
        assert_eq!(stats.failed, 1);
    }
}
