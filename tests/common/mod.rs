//! 集成测试用的内存协作方

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exam_liberation::clients::ChatModel;
use exam_liberation::error::{AppResult, ExtractionError};
use exam_liberation::models::{Document, ExtractionOutput, Roster, RosterOutcome};
use exam_liberation::services::{
    prompts, AuditWriter, DocumentExtractor, IdentifierRecovery, ReconciliationEngine,
    RosterLookup, SimilarityIndex, SynonymRecord, Validator,
};
use exam_liberation::WorkflowContext;

pub fn names(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// 固定返回一个提取结果
pub struct ScriptedExtractor {
    output: Option<ExtractionOutput>,
}

impl ScriptedExtractor {
    pub fn new(cpf: Option<&str>, exams: &[&str], text: &str) -> Arc<Self> {
        Arc::new(Self {
            output: Some(ExtractionOutput {
                cpf: cpf.map(str::to_string),
                exames: names(exams),
                markdown_content: text.to_string(),
                ..Default::default()
            }),
        })
    }

    /// 模拟转换失败
    pub fn failing() -> Arc<Self> {
        Arc::new(Self { output: None })
    }
}

#[async_trait]
impl DocumentExtractor for ScriptedExtractor {
    async fn extract(&self, document: &Document) -> AppResult<ExtractionOutput> {
        match &self.output {
            Some(output) => Ok(output.clone()),
            None => Err(ExtractionError::ConversionFailed {
                file_name: document.file_name.clone(),
                message: "arquivo corrompido".to_string(),
            }
            .into()),
        }
    }
}

/// 按 CPF 返回名册，记录每一次查询
#[derive(Default)]
pub struct ScriptedRoster {
    rosters: HashMap<String, Vec<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, cpf: &str, exams: &[&str]) -> Self {
        self.rosters.insert(cpf.to_string(), names(exams));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl RosterLookup for ScriptedRoster {
    async fn lookup(&self, cpf: &str) -> RosterOutcome {
        self.calls.lock().unwrap().push(cpf.to_string());
        match self.rosters.get(cpf) {
            Some(exames) => RosterOutcome::Found(Roster {
                nome: Some("PACIENTE TESTE".to_string()),
                exames: exames.clone(),
            }),
            None => RosterOutcome::error("Paciente não encontrado"),
        }
    }
}

/// 规则化的比对模型：名称互相包含（忽略大小写）即视为匹配
///
/// 全部 CPF 提取请求一律回答空列表，候选只来自正则扫描。
#[derive(Default)]
pub struct RuleChat {
    pub broken: bool,
}

impl RuleChat {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// 比对请求返回无法解析的文本
    pub fn broken() -> Arc<Self> {
        Arc::new(Self { broken: true })
    }
}

fn list_after(prompt: &str, label: &str) -> Vec<String> {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(label))
        .and_then(|json| serde_json::from_str(json.trim()).ok())
        .unwrap_or_default()
}

fn matches(a: &str, b: &str) -> bool {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    a.contains(&b) || b.contains(&a)
}

#[async_trait]
impl ChatModel for RuleChat {
    async fn complete(&self, system: &str, user: &str) -> AppResult<String> {
        if system == prompts::EXTRACT_ALL_CPFS {
            return Ok(r#"{"cpfs": []}"#.to_string());
        }
        if self.broken {
            return Ok("não sei responder".to_string());
        }

        let required = list_after(user, "- Exames Obrigatórios: ");
        let sent = list_after(user, "- Exames Recebidos: ");

        let mut verdicts: Vec<serde_json::Value> = required
            .iter()
            .map(|exam| {
                let status = if sent.iter().any(|s| matches(exam, s)) {
                    "encontrado"
                } else {
                    "faltante"
                };
                serde_json::json!({ "exame": exam, "status": status, "justificativa": "regra" })
            })
            .collect();
        for exam in sent.iter().filter(|s| !required.iter().any(|r| matches(r, s))) {
            verdicts.push(serde_json::json!({ "exame": exam, "status": "extra_no_ocr" }));
        }

        Ok(serde_json::json!({ "comparacao": verdicts }).to_string())
    }
}

/// 每个项目返回一条固定同义词
pub struct StaticSimilarity;

#[async_trait]
impl SimilarityIndex for StaticSimilarity {
    async fn neighbors(&self, exam: &str, _k: usize) -> AppResult<Vec<SynonymRecord>> {
        Ok(vec![SynonymRecord {
            exame_principal: exam.to_string(),
            sinonimos: vec![exam.to_lowercase()],
        }])
    }
}

pub fn engine(chat: Arc<RuleChat>) -> ReconciliationEngine {
    ReconciliationEngine::new(chat, 5).with_similarity(Arc::new(StaticSimilarity))
}

pub fn context(
    extractor: Arc<ScriptedExtractor>,
    roster: Arc<ScriptedRoster>,
    chat: Arc<RuleChat>,
    audit_dir: &Path,
) -> Arc<WorkflowContext> {
    let validator = Validator::new(Arc::new(engine(chat.clone())), AuditWriter::new(audit_dir));
    Arc::new(WorkflowContext::new(
        extractor,
        roster,
        Arc::new(IdentifierRecovery::new(chat)),
        Arc::new(validator),
    ))
}

pub fn document() -> Document {
    Document::new("BR MED - PERIÓDICO.pdf", b"%PDF-1.4".to_vec())
}
