//! 检查项目比对引擎 - 业务能力层
//!
//! 1. 必检项目去重，并发查询每项的近邻同义词
//! 2. 同义词 + 必检名称合并为有序的同义词上下文
//! 3. 交给模型逐项判定 found / missing / extra
//! 4. 解析模型回复（允许单键包裹）

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{parse_json_response, ChatModel};
use crate::error::{AppResult, ReconciliationError};
use crate::models::exam::same_exam_name;
use crate::models::{ComparisonVerdict, VerdictStatus};
use crate::services::prompts;
use crate::services::similarity_index::SimilarityIndex;

/// 模型回复：裸数组，或只有一个键的对象包着数组
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VerdictEnvelope {
    Bare(Vec<ComparisonVerdict>),
    Wrapped(SingleKeyWrapper),
}

#[derive(Debug, Deserialize)]
#[serde(try_from = "BTreeMap<String, Vec<ComparisonVerdict>>")]
struct SingleKeyWrapper(Vec<ComparisonVerdict>);

impl TryFrom<BTreeMap<String, Vec<ComparisonVerdict>>> for SingleKeyWrapper {
    type Error = String;

    fn try_from(map: BTreeMap<String, Vec<ComparisonVerdict>>) -> Result<Self, Self::Error> {
        if map.len() != 1 {
            return Err(format!("esperado um único campo, recebido {}", map.len()));
        }
        Ok(Self(map.into_values().flatten().collect()))
    }
}

impl VerdictEnvelope {
    fn into_verdicts(self) -> Vec<ComparisonVerdict> {
        match self {
            VerdictEnvelope::Bare(verdicts) => verdicts,
            VerdictEnvelope::Wrapped(SingleKeyWrapper(verdicts)) => verdicts,
        }
    }
}

/// 解析模型的比对回复
pub fn parse_verdicts(response: &str) -> AppResult<Vec<ComparisonVerdict>> {
    parse_json_response::<VerdictEnvelope>(response)
        .map(VerdictEnvelope::into_verdicts)
        .map_err(|e| ReconciliationError::UnexpectedShape(e.to_string()).into())
}

/// 按首次出现顺序去重
fn unique_in_order(items: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty() && seen.insert(s.to_string()))
        .map(str::to_string)
        .collect()
}

pub struct ReconciliationEngine {
    similarity: Option<Arc<dyn SimilarityIndex>>,
    chat: Arc<dyn ChatModel>,
    neighbors: usize,
}

impl ReconciliationEngine {
    pub fn new(chat: Arc<dyn ChatModel>, neighbors: usize) -> Self {
        Self {
            similarity: None,
            chat,
            neighbors,
        }
    }

    pub fn with_similarity(mut self, similarity: Arc<dyn SimilarityIndex>) -> Self {
        self.similarity = Some(similarity);
        self
    }

    /// 同义词上下文：近邻同义词 + 必检名称，排序去重
    ///
    /// 没有索引时为空。
    pub async fn synonym_context(&self, required: &[String]) -> AppResult<Vec<String>> {
        let Some(similarity) = &self.similarity else {
            return Ok(Vec::new());
        };
        if required.is_empty() {
            return Ok(Vec::new());
        }

        let lookups = required
            .iter()
            .map(|exam| similarity.neighbors(exam, self.neighbors));
        let results = join_all(lookups).await;

        let mut context: BTreeSet<String> = required.iter().cloned().collect();
        for result in results {
            for record in result? {
                context.extend(record.sinonimos.into_iter().map(|s| s.trim().to_string()));
            }
        }
        context.retain(|s| !s.is_empty());
        Ok(context.into_iter().collect())
    }

    /// 比对已提交项目和必检名册
    ///
    /// 模型漏判的必检项目补记为缺失，不会因此放行。
    pub async fn reconcile(&self, sent: &[String], required: &[String]) -> AppResult<Vec<ComparisonVerdict>> {
        let unique_required = unique_in_order(required);
        let context = self.synonym_context(&unique_required).await?;
        debug!("同义词上下文: {} 项", context.len());

        let prompt = prompts::compare_exams(&context, required, sent);
        let response = self.chat.complete(prompts::COMPARE_SYSTEM, &prompt).await?;
        let mut verdicts = parse_verdicts(&response)?;

        for exam in &unique_required {
            let judged = verdicts
                .iter()
                .any(|v| v.status != VerdictStatus::Extra && same_exam_name(&v.exame, exam));
            if !judged {
                warn!("模型未判定必检项目 '{}'，记为缺失", exam);
                verdicts.push(ComparisonVerdict::new(
                    exam.clone(),
                    VerdictStatus::Missing,
                    "Exame obrigatório não avaliado na comparação.",
                ));
            }
        }

        info!(
            "✓ 比对完成: {} 项结论，其中缺失 {} 项",
            verdicts.len(),
            verdicts
                .iter()
                .filter(|v| v.status == VerdictStatus::Missing)
                .count()
        );
        Ok(verdicts)
    }
}
