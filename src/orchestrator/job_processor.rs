//! 单个文档任务处理器 - 编排层
//!
//! ## 职责
//!
//! 1. **校验任务**：必检列表不能有空项
//! 2. **读取文档**：按清单路径读取文档字节
//! 3. **流程调度**：以流式方式运行 `DocumentWorkflow`，逐条记录进度事件
//! 4. **结果落盘**：把决策记录（或错误）写入 `OUTPUT_FOLDER/<标签>.json`

use std::path::{Path, PathBuf};

use serde_json::json;
use tracing::{debug, error, info};

use crate::error::{AppError, AppResult};
use crate::models::{Document, DocumentJob, WorkflowEvent, WorkflowResponse};
use crate::workflow::DocumentWorkflow;

/// 单个任务的结局
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// 完成比对，附带是否放行
    Completed { liberated: bool },
    /// 找不到名册
    NoRoster,
    /// 提取失败或输入错误
    Failed,
}

/// 处理单个文档任务
///
/// # 返回
/// 返回任务结局；只有结果文件写入失败才返回 `Err`
pub async fn process_job(
    workflow: &DocumentWorkflow,
    job: &DocumentJob,
    job_index: usize,
    output_folder: &str,
) -> AppResult<JobOutcome> {
    let label = job.label();
    log_job_start(job_index, &label, job);

    let response = match prepare(job).await {
        Ok((document, exams)) => stream_workflow(workflow, document, exams, job_index).await,
        Err(e) => Err(e.to_string()),
    };

    let output_path = output_path(output_folder, &label);
    let outcome = match &response {
        Ok(resultado) => {
            write_json(&output_path, resultado).await?;
            match resultado {
                WorkflowResponse::Completed(_) => JobOutcome::Completed {
                    liberated: resultado.is_liberated(),
                },
                WorkflowResponse::Failed(_) => JobOutcome::NoRoster,
            }
        }
        Err(message) => {
            error!("[任务 {}] ❌ {}", job_index, message);
            write_json(&output_path, &json!({ "status": "falha", "erro": message })).await?;
            JobOutcome::Failed
        }
    };

    log_job_complete(job_index, &label, outcome, &output_path);
    Ok(outcome)
}

/// 校验清单并读取文档
async fn prepare(job: &DocumentJob) -> AppResult<(Document, Vec<String>)> {
    let exams = job.validated_exams()?;
    let document = Document::from_path(&job.document_path()).await?;
    Ok((document, exams))
}

/// 消费事件流直到结束事件
async fn stream_workflow(
    workflow: &DocumentWorkflow,
    document: Document,
    exams: Vec<String>,
    job_index: usize,
) -> Result<WorkflowResponse, String> {
    let mut events = workflow.run_streaming(document, exams);

    while let Some(event) = events.recv().await {
        match event {
            WorkflowEvent::Progress(progress) => {
                debug!(
                    "[任务 {}] {}% {}",
                    job_index,
                    progress.progress,
                    progress.message
                );
            }
            WorkflowEvent::Result { event, resultado } => {
                debug!("[任务 {}] {}% {}", job_index, event.progress, event.message);
                return Ok(resultado);
            }
            WorkflowEvent::Error(event) => return Err(event.message),
        }
    }

    Err("Fluxo encerrado sem resultado".to_string())
}

fn output_path(output_folder: &str, label: &str) -> PathBuf {
    let safe: String = label
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    Path::new(output_folder).join(format!("{}.json", safe))
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> AppResult<()> {
    let display = path.display().to_string();
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::file_write_failed(&display, e))?;
    }
    let content = serde_json::to_string_pretty(value).map_err(|e| {
        AppError::file_write_failed(&display, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    })?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| AppError::file_write_failed(&display, e))
}

// ========== 日志辅助函数 ==========

fn log_job_start(job_index: usize, label: &str, job: &DocumentJob) {
    info!("[任务 {}] 开始处理", job_index);
    info!("[任务 {}] 名称: {}", job_index, label);
    info!("[任务 {}] 文档: {}", job_index, job.document_path().display());
    info!("[任务 {}] 必检项目数: {}", job_index, job.exames_obrigatorios.len());
}

fn log_job_complete(job_index: usize, label: &str, outcome: JobOutcome, output: &Path) {
    let summary = match outcome {
        JobOutcome::Completed { liberated: true } => "🟢 放行",
        JobOutcome::Completed { liberated: false } => "🔴 不放行",
        JobOutcome::NoRoster => "⚠️ 查不到名册",
        JobOutcome::Failed => "❌ 失败",
    };
    info!("[任务 {}] {} - {}", job_index, label, summary);
    info!("[任务 {}] 结果文件: {}\n", job_index, output.display());
}
