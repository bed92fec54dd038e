//! LLM API 客户端
//!
//! 对话补全和文本向量两个能力，分别以 [`ChatModel`] 和 [`Embedder`] trait 暴露，
//! 便于在测试中替换。具体实现基于 `async-openai`，兼容任何 OpenAI 风格的端点。

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
    },
    types::embeddings::CreateEmbeddingRequestArgs,
    Client,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{AppResult, LlmError};
use crate::utils::RetryPolicy;

/// 对话模型：系统提示 + 用户提示 -> 文本回复
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> AppResult<String>;
}

/// 向量模型
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>>;
}

/// 基于 async-openai 的客户端，同时实现两个 trait
pub struct LlmClient {
    client: Client<OpenAIConfig>,
    chat_model: String,
    embedding_model: String,
    retry: RetryPolicy,
}

impl LlmClient {
    pub fn new(config: &Config) -> Self {
        // 配置 OpenAI 客户端（兼容 OpenAI API 的服务）
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_api_base);

        Self {
            client: Client::with_config(openai_config),
            chat_model: config.chat_model.clone(),
            embedding_model: config.embedding_model.clone(),
            retry: config.retry_policy(),
        }
    }

    async fn chat_once(&self, system: &str, user: &str) -> AppResult<String> {
        let model = self.chat_model.as_str();
        let to_llm = |e| LlmError::from_openai(model, e);

        let messages = vec![
            ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(to_llm)?,
            ),
            ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(user)
                    .build()
                    .map_err(to_llm)?,
            ),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(0.0)
            .build()
            .map_err(to_llm)?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            to_llm(e)
        })?;

        let content = response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LlmError::EmptyResponse {
                model: model.to_string(),
            })?;

        debug!("LLM API 调用成功，响应长度: {} 字符", content.len());
        Ok(content.trim().to_string())
    }

    async fn embed_once(&self, text: &str) -> AppResult<Vec<f32>> {
        let model = self.embedding_model.as_str();
        let request = CreateEmbeddingRequestArgs::default()
            .model(model)
            .input(vec![text.to_string()])
            .build()
            .map_err(|e| LlmError::from_openai(model, e))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| {
                warn!("Embedding API 调用失败: {}", e);
                LlmError::from_openai(model, e)
            })?;

        response
            .data
            .into_iter()
            .next()
            .map(|item| item.embedding)
            .filter(|embedding| !embedding.is_empty())
            .ok_or_else(|| {
                LlmError::EmptyResponse {
                    model: model.to_string(),
                }
                .into()
            })
    }
}

#[async_trait]
impl ChatModel for LlmClient {
    async fn complete(&self, system: &str, user: &str) -> AppResult<String> {
        debug!("调用 LLM API，模型: {}", self.chat_model);
        debug!("用户消息长度: {} 字符", user.len());
        self.retry
            .run("LLM 对话", move || async move { self.chat_once(system, user).await })
            .await
    }
}

#[async_trait]
impl Embedder for LlmClient {
    async fn embed(&self, text: &str) -> AppResult<Vec<f32>> {
        self.retry
            .run("生成 embedding", move || async move { self.embed_once(text).await })
            .await
    }
}

/// 去掉模型常见的 ```json 代码块包裹
pub fn strip_json_fences(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// 把模型回复解析为 JSON
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T, LlmError> {
    serde_json::from_str(strip_json_fences(response))
        .map_err(|source| LlmError::invalid_json(response, source))
}
