//! 候选 CPF 恢复 - 业务能力层
//!
//! 主 CPF 查不到名册时，从全文中找出其他可能的 CPF。
//! 文档里常常有多个 CPF（受检人、医生、负责人），首次提取经常选错。

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::clients::{parse_json_response, ChatModel};
use crate::services::prompts;
use crate::utils::cpf;

#[derive(Debug, Deserialize)]
struct CpfsPayload {
    #[serde(default)]
    cpfs: Vec<serde_json::Value>,
}

/// 候选 CPF 恢复
///
/// 先做正则扫描，再让模型做一次更宽泛的提取；结果按首次出现顺序去重，
/// 并排除已尝试的 CPF。永远不会失败，找不到时返回空列表。
pub struct IdentifierRecovery {
    chat: Option<Arc<dyn ChatModel>>,
}

impl IdentifierRecovery {
    pub fn new(chat: Arc<dyn ChatModel>) -> Self {
        Self { chat: Some(chat) }
    }

    /// 只做正则扫描
    pub fn pattern_only() -> Self {
        Self { chat: None }
    }

    pub async fn recover_candidates(&self, raw_text: &str, excluded: Option<&str>) -> Vec<String> {
        let excluded = excluded.and_then(cpf::normalize);
        let mut candidates: Vec<String> = Vec::new();
        let mut push = |candidate: String| {
            if excluded.as_deref() != Some(candidate.as_str()) && !candidates.contains(&candidate) {
                candidates.push(candidate);
            }
        };

        for candidate in cpf::find_all(raw_text) {
            push(candidate);
        }

        if let Some(chat) = &self.chat {
            for candidate in self.model_candidates(chat.as_ref(), raw_text, excluded.as_deref()).await {
                push(candidate);
            }
        }

        debug!("候选 CPF: {} 个", candidates.len());
        candidates
    }

    /// 模型提取全部 CPF，任何失败都视为没有结果
    async fn model_candidates(
        &self,
        chat: &dyn ChatModel,
        raw_text: &str,
        excluded: Option<&str>,
    ) -> Vec<String> {
        if raw_text.trim().is_empty() {
            return Vec::new();
        }

        let mut user_prompt = prompts::document_text(raw_text);
        if let Some(excluded) = excluded {
            user_prompt.push_str(&format!("\nExcluir CPF: {}", excluded));
        }

        let response = match chat.complete(prompts::EXTRACT_ALL_CPFS, &user_prompt).await {
            Ok(response) => response,
            Err(e) => {
                warn!("模型提取全部 CPF 失败: {}", e);
                return Vec::new();
            }
        };

        match parse_json_response::<CpfsPayload>(&response) {
            Ok(payload) => payload
                .cpfs
                .iter()
                .filter_map(|value| match value {
                    serde_json::Value::String(s) => cpf::normalize(s),
                    serde_json::Value::Number(n) => cpf::normalize(&n.to_string()),
                    _ => None,
                })
                .collect(),
            Err(e) => {
                warn!("模型返回的 CPF 列表无法解析: {}", e);
                Vec::new()
            }
        }
    }
}
