//! 工作流对外返回的决策记录

use serde::Serialize;

use super::exam::{same_exam_name, ComparisonVerdict, VerdictStatus};
use super::extraction::ExtractionOutput;

/// 列表为空时展示的占位文本
pub const NO_EXAMS_TEXT: &str = "Nenhum exame encontrado.";
pub const ANALYSIS_HEADER: &str = "Análise de comparação de exames:";
pub const LIBERATION_GRANTED: &str =
    "Todos os exames obrigatórios foram enviados. Liberação concedida.";
pub const NO_VALID_CPF: &str =
    "Não foi possível extrair um CPF válido ou consultar exames obrigatórios.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Sucesso,
    Falha,
}

/// 比对 + 审计的结果
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationResult {
    pub status_liberado: bool,
    pub mensagem: String,
    pub exames_comparativo: Vec<ComparisonVerdict>,
    pub exames_faltantes: Vec<String>,
    pub exames_presentes: Vec<String>,
    pub auditoria_salva_em: String,
    pub erro: Option<String>,
}

impl ValidationResult {
    /// 由比对表推导放行结论；缺失/已提交列表按名册顺序排列
    pub fn from_verdicts(verdicts: Vec<ComparisonVerdict>, roster: &[String]) -> Self {
        let mut exames_faltantes = names_with(&verdicts, VerdictStatus::Missing);
        let mut exames_presentes = names_with(&verdicts, VerdictStatus::Found);
        sort_by_roster(&mut exames_faltantes, roster);
        sort_by_roster(&mut exames_presentes, roster);

        let status_liberado = exames_faltantes.is_empty();
        let mensagem = if status_liberado {
            LIBERATION_GRANTED.to_string()
        } else {
            format!("Faltam exames obrigatórios: {}", exames_faltantes.join(", "))
        };

        Self {
            status_liberado,
            mensagem,
            exames_comparativo: verdicts,
            exames_faltantes,
            exames_presentes,
            auditoria_salva_em: String::new(),
            erro: None,
        }
    }

    /// 比对失败：不放行，错误写进消息和 erro
    pub fn failed(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            status_liberado: false,
            mensagem: message.clone(),
            erro: Some(message),
            ..Default::default()
        }
    }
}

fn names_with(verdicts: &[ComparisonVerdict], status: VerdictStatus) -> Vec<String> {
    verdicts
        .iter()
        .filter(|v| v.status == status)
        .map(|v| v.exame.clone())
        .collect()
}

/// 稳定排序：名册中的项目按名册位置，名册外的保持原顺序排在最后
fn sort_by_roster(names: &mut [String], roster: &[String]) {
    names.sort_by_key(|name| {
        roster
            .iter()
            .position(|r| same_exam_name(r, name))
            .unwrap_or(usize::MAX)
    });
}

fn joined_or_placeholder(exams: &[String]) -> String {
    if exams.is_empty() {
        NO_EXAMS_TEXT.to_string()
    } else {
        exams.join(", ")
    }
}

/// 正常完成（即使比对出错也走这里）
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub status: RunStatus,
    pub cpf_processado: String,
    pub exames_enviados: Vec<String>,
    pub exames_ocr: String,
    pub exames_brnet: String,
    pub analise_comparacao: String,
    pub tabela_comparacao: Vec<ComparisonVerdict>,
    pub decisao_final: String,
    pub status_liberado: bool,
    pub exames_faltantes: Vec<String>,
    pub exames_presentes: Vec<String>,
    pub cpfs_tentados: Vec<String>,
    pub auditoria_salva_em: String,
    pub erro: Option<String>,
}

impl DecisionRecord {
    pub fn new(
        cpf: &str,
        exames_enviados: Vec<String>,
        exames_brnet: &[String],
        cpfs_tentados: Vec<String>,
        validation: ValidationResult,
    ) -> Self {
        Self {
            status: RunStatus::Sucesso,
            cpf_processado: cpf.to_string(),
            exames_ocr: joined_or_placeholder(&exames_enviados),
            exames_brnet: joined_or_placeholder(exames_brnet),
            exames_enviados,
            analise_comparacao: ANALYSIS_HEADER.to_string(),
            tabela_comparacao: validation.exames_comparativo,
            decisao_final: validation.mensagem,
            status_liberado: validation.status_liberado,
            exames_faltantes: validation.exames_faltantes,
            exames_presentes: validation.exames_presentes,
            cpfs_tentados,
            auditoria_salva_em: validation.auditoria_salva_em,
            erro: validation.erro,
        }
    }
}

/// 所有候选 CPF 都查不到名册
#[derive(Debug, Clone, Serialize)]
pub struct FailureRecord {
    pub status: RunStatus,
    pub mensagem: String,
    pub exames_enviados: Vec<String>,
    pub cpfs_tentados: Vec<String>,
    pub ocr_info: ExtractionOutput,
}

impl FailureRecord {
    pub fn no_valid_cpf(cpfs_tentados: Vec<String>, ocr_info: ExtractionOutput) -> Self {
        Self {
            status: RunStatus::Falha,
            mensagem: NO_VALID_CPF.to_string(),
            exames_enviados: ocr_info.exames.clone(),
            cpfs_tentados,
            ocr_info,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WorkflowResponse {
    Completed(DecisionRecord),
    Failed(FailureRecord),
}

impl WorkflowResponse {
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkflowResponse::Completed(_))
    }

    /// 完成且允许放行
    pub fn is_liberated(&self) -> bool {
        match self {
            WorkflowResponse::Completed(record) => record.status_liberado && record.erro.is_none(),
            WorkflowResponse::Failed(_) => false,
        }
    }

    pub fn exames_enviados(&self) -> &[String] {
        match self {
            WorkflowResponse::Completed(record) => &record.exames_enviados,
            WorkflowResponse::Failed(record) => &record.exames_enviados,
        }
    }

    pub fn cpfs_tentados(&self) -> &[String] {
        match self {
            WorkflowResponse::Completed(record) => &record.cpfs_tentados,
            WorkflowResponse::Failed(record) => &record.cpfs_tentados,
        }
    }
}
