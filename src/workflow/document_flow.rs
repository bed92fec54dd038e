//! 文档处理流程 - 流程层
//!
//! 核心职责：定义"一份文档"从提取到放行结论的完整流程
//!
//! 流程顺序：
//! 1. 提取（失败即终止）
//! 2. 主 CPF 查名册
//! 3. 查不到 → 恢复候选 CPF，逐个尝试（跳过已试过的）
//! 4. 比对 + 审计 → 决策记录（比对出错也会完成）

use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tracing::{error, info, warn};

use crate::error::AppResult;
use crate::models::{
    validate_required_exams, DecisionRecord, Document, FailureRecord, ProgressEvent, ProgressStep,
    Roster, RosterOutcome, WorkflowEvent, WorkflowResponse,
};
use crate::utils::cpf;
use crate::workflow::progress::ProgressReporter;
use crate::workflow::workflow_ctx::{WorkflowContext, WorkflowRun, WorkflowState};

/// 候选 CPF 尝试的进度上限（名册获取成功是 60）
const FALLBACK_PROGRESS_CAP: i32 = 55;

/// 文档处理流程
///
/// - 编排提取、名册查询、候选恢复和比对
/// - 决定何时重试、何时放弃
/// - 不持有任何资源，只依赖上下文中的协作方
#[derive(Clone)]
pub struct DocumentWorkflow {
    ctx: Arc<WorkflowContext>,
}

impl DocumentWorkflow {
    pub fn new(ctx: Arc<WorkflowContext>) -> Self {
        Self { ctx }
    }

    /// 处理一份文档
    ///
    /// 只有提取失败（以及必检列表不合法）会返回 `Err`；查不到名册返回
    /// `WorkflowResponse::Failed`，比对出错体现在决策记录的 `erro` 中。
    pub async fn run(
        &self,
        document: &Document,
        exames_obrigatorios: &[String],
        reporter: &mut ProgressReporter,
    ) -> AppResult<WorkflowResponse> {
        let required = validate_required_exams(exames_obrigatorios)?;
        let mut run = WorkflowRun::new(document.file_name.clone());
        info!("{} 🚀 开始处理，必检项目 {} 个", run, required.len());

        // ========== 1. 提取 ==========
        run.transition(WorkflowState::Extracting);
        reporter.report(10, ProgressStep::Ocr, "Processando documento com OCR...");
        let extraction = match self.ctx.extractor.extract(document).await {
            Ok(extraction) => extraction,
            Err(e) => {
                error!("{} ❌ 提取失败: {}", run, e);
                run.transition(WorkflowState::Failed);
                reporter.fail(format!("Erro no processamento do documento: {}", e));
                return Err(e);
            }
        };
        reporter.report(
            30,
            ProgressStep::Ocr,
            format!("OCR concluído. {} exames encontrados", extraction.exames.len()),
        );

        // ========== 2. 主 CPF ==========
        let mut found: Option<(String, Roster)> = None;
        match extraction.cpf.as_deref() {
            Some(primary) => {
                reporter.report(
                    40,
                    ProgressStep::Brmed,
                    format!("Consultando exames obrigatórios (CPF: {})", cpf::mask(primary)),
                );
                found = self.lookup_candidate(&mut run, primary).await;
                if found.is_none() {
                    reporter.report(
                        45,
                        ProgressStep::Brmed,
                        "CPF inicial falhou, buscando CPFs alternativos...",
                    );
                }
            }
            None => {
                info!("{} 文档中没有主 CPF，直接搜索候选", run);
                reporter.report(40, ProgressStep::Brmed, "CPF não encontrado, buscando alternativas...");
            }
        }

        // ========== 3. 候选 CPF ==========
        if found.is_none() {
            let candidates = self
                .ctx
                .recovery
                .recover_candidates(&extraction.markdown_content, extraction.cpf.as_deref())
                .await;
            info!("{} 🔍 找到 {} 个候选 CPF", run, candidates.len());

            let mut attempt = 0;
            for candidate in candidates {
                if run.was_tried(&candidate) {
                    continue;
                }
                attempt += 1;
                reporter.report(
                    (40 + attempt * 5).min(FALLBACK_PROGRESS_CAP),
                    ProgressStep::Brmed,
                    format!("Tentando CPF alternativo {}...", attempt),
                );
                found = self.lookup_candidate(&mut run, &candidate).await;
                if found.is_some() {
                    break;
                }
            }
        }

        let Some((cpf_final, roster)) = found else {
            error!("{} ❌ 没有可用的 CPF，已尝试 {} 个", run, run.tried().len());
            run.transition(WorkflowState::Failed);
            reporter.fail("Não foi possível extrair um CPF válido");
            return Ok(WorkflowResponse::Failed(FailureRecord::no_valid_cpf(
                run.tried().to_vec(),
                extraction,
            )));
        };
        reporter.report(
            60,
            ProgressStep::Brmed,
            format!("Exames obrigatórios obtidos: {} exames", roster.exames.len()),
        );

        // ========== 4. 比对 ==========
        run.transition(WorkflowState::Reconciling);
        reporter.report(70, ProgressStep::Validacao, "Validando exames com IA...");
        let validation = self
            .ctx
            .validator
            .validate(&cpf_final, &required, &extraction.exames, &roster.exames)
            .await;
        reporter.report(90, ProgressStep::Validacao, "Validação concluída, preparando resultado...");

        run.transition(WorkflowState::Completed);
        match &validation.erro {
            Some(erro) => {
                warn!("{} ⚠️ 比对出错，结果中附带错误: {}", run, erro);
                reporter.complete("Processamento concluído com erro na validação.");
            }
            None => {
                info!(
                    "{} ✅ 处理完成: {}",
                    run,
                    if validation.status_liberado { "放行" } else { "不放行" }
                );
                reporter.complete("Processamento concluído com sucesso!");
            }
        }

        Ok(WorkflowResponse::Completed(DecisionRecord::new(
            &cpf_final,
            extraction.exames,
            &roster.exames,
            run.tried().to_vec(),
            validation,
        )))
    }

    /// 在后台运行，返回事件流
    ///
    /// 最后一个事件是 `Result`（携带决策记录）或 `Error`（-1）。
    pub fn run_streaming(
        &self,
        document: Document,
        exames_obrigatorios: Vec<String>,
    ) -> UnboundedReceiver<WorkflowEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let flow = self.clone();

        tokio::spawn(async move {
            let mut reporter = ProgressReporter::new(document.file_name.clone(), tx.clone());
            let outcome = flow.run(&document, &exames_obrigatorios, &mut reporter).await;
            let terminal = reporter.take_terminal();

            let event = match outcome {
                Ok(resultado) => {
                    let event = terminal.unwrap_or_else(|| match &resultado {
                        WorkflowResponse::Completed(_) => {
                            ProgressEvent::new(100, ProgressStep::Concluido, "Processamento concluído")
                        }
                        WorkflowResponse::Failed(record) => {
                            ProgressEvent::new(-1, ProgressStep::Erro, record.mensagem.clone())
                        }
                    });
                    WorkflowEvent::Result { event, resultado }
                }
                Err(e) => WorkflowEvent::Error(
                    terminal.unwrap_or_else(|| ProgressEvent::new(-1, ProgressStep::Erro, e.to_string())),
                ),
            };
            let _ = tx.send(event);
        });

        rx
    }

    /// 查询一个 CPF 的名册；失败返回 None（驱动候选重试）
    async fn lookup_candidate(&self, run: &mut WorkflowRun, candidate: &str) -> Option<(String, Roster)> {
        run.mark_tried(candidate);
        run.transition(WorkflowState::LookingUp(candidate.to_string()));
        info!("{} 🌐 查询名册: CPF {}", run, cpf::mask(candidate));

        match self.ctx.roster.lookup(candidate).await {
            RosterOutcome::Found(roster) => {
                info!("{} ✓ 名册获取成功: {} 个必检项目", run, roster.exames.len());
                Some((candidate.to_string(), roster))
            }
            RosterOutcome::Error { erro } => {
                warn!("{} ⚠️ CPF {} 查询失败: {}", run, cpf::mask(candidate), erro);
                None
            }
        }
    }
}
