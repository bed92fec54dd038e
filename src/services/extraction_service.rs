//! 文档提取服务 - 业务能力层
//!
//! 只负责"文档 -> {CPF, 检查项目, 全文}"这一能力，不关心后续流程。
//!
//! 处理顺序：
//! 1. 文档写入临时文件并转换为 markdown（临时文件在任何退出路径上都会被删除）
//! 2. 归档 markdown
//! 3. 正则提取主 CPF，找不到再问模型
//! 4. 模型提取检查项目

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::clients::{parse_json_response, ChatModel};
use crate::error::{AppError, AppResult, ExtractionError, LlmError};
use crate::models::{Document, ExtractionOutput};
use crate::services::document_converter::DocumentConverter;
use crate::services::prompts;
use crate::utils::cpf;

/// 提取能力
#[async_trait]
pub trait DocumentExtractor: Send + Sync {
    async fn extract(&self, document: &Document) -> AppResult<ExtractionOutput>;
}

#[derive(Debug, Deserialize)]
struct ExamsPayload {
    exames: Option<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
struct CpfPayload {
    cpf: Option<String>,
}

/// 文本类文档不经过转换器
const PLAIN_TEXT_EXTENSIONS: [&str; 2] = [".txt", ".md"];

pub struct ExtractionService {
    converter: Arc<dyn DocumentConverter>,
    chat: Arc<dyn ChatModel>,
    archive_dir: Option<PathBuf>,
}

impl ExtractionService {
    pub fn new(converter: Arc<dyn DocumentConverter>, chat: Arc<dyn ChatModel>) -> Self {
        Self {
            converter,
            chat,
            archive_dir: None,
        }
    }

    /// 把每次转换得到的 markdown 归档到指定目录
    pub fn with_archive_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.archive_dir = Some(dir.into());
        self
    }

    async fn to_markdown(&self, document: &Document) -> AppResult<String> {
        let extension = document.extension();
        if PLAIN_TEXT_EXTENSIONS.contains(&extension.as_str()) {
            debug!("文本文档，跳过转换: {}", document.file_name);
            return Ok(String::from_utf8_lossy(&document.bytes).to_string());
        }

        let temp_error = |source| ExtractionError::TempFile {
            file_name: document.file_name.clone(),
            source,
        };

        // 两者离开作用域时自动删除
        let mut input = tempfile::Builder::new()
            .prefix("documento_")
            .suffix(&extension)
            .tempfile()
            .map_err(temp_error)?;
        input
            .write_all(&document.bytes)
            .and_then(|_| input.flush())
            .map_err(temp_error)?;
        let output_dir = tempfile::tempdir().map_err(temp_error)?;

        self.converter
            .convert(input.path(), output_dir.path(), &document.file_name)
            .await
    }

    async fn archive(&self, document: &Document, markdown: &str) -> Option<String> {
        let dir = self.archive_dir.as_ref()?;
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let path = dir.join(format!("ocr_{}_{}.md", document.stem(), timestamp));

        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, markdown).await
        }
        .await;

        match result {
            Ok(()) => Some(path.display().to_string()),
            Err(e) => {
                warn!("归档 markdown 失败 {}: {}", path.display(), e);
                None
            }
        }
    }

    /// 模型兜底提取 CPF，失败只记录日志
    async fn cpf_from_model(&self, markdown: &str) -> Option<String> {
        let response = match self
            .chat
            .complete(prompts::EXTRACT_CPF, &prompts::document_text(markdown))
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("模型提取 CPF 失败: {}", e);
                return None;
            }
        };

        match parse_json_response::<CpfPayload>(&response) {
            Ok(payload) => payload.cpf.as_deref().and_then(cpf::normalize),
            Err(e) => {
                warn!("模型返回的 CPF 无法解析: {}", e);
                None
            }
        }
    }

    /// 模型提取检查项目
    ///
    /// 传输层失败（已重试）是致命的；其余问题降级为空列表 + 错误说明。
    async fn exams_from_model(&self, markdown: &str) -> AppResult<(Vec<String>, Option<String>)> {
        let response = match self
            .chat
            .complete(prompts::EXTRACT_EXAMS, &prompts::document_text(markdown))
            .await
        {
            Ok(response) => response,
            Err(AppError::Llm(e @ LlmError::Transport { .. })) => {
                return Err(ExtractionError::ExamExtraction(e).into());
            }
            Err(e) => {
                warn!("模型提取检查项目失败: {}", e);
                return Ok((Vec::new(), Some(format!("Ocorreu um erro inesperado: {}", e))));
            }
        };

        let payload = match parse_json_response::<ExamsPayload>(&response) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("检查项目 JSON 解析失败: {}", e);
                return Ok((
                    Vec::new(),
                    Some("Falha ao decodificar o JSON da resposta da IA.".to_string()),
                ));
            }
        };

        let Some(raw_exams) = payload.exames else {
            return Ok((
                Vec::new(),
                Some("Resposta da IA não contém a chave 'exames'.".to_string()),
            ));
        };

        let mut exams: Vec<String> = Vec::new();
        for exam in raw_exams.into_iter().flatten() {
            let exam = exam.trim().to_string();
            if !exam.is_empty() && !exams.contains(&exam) {
                exams.push(exam);
            }
        }
        Ok((exams, None))
    }
}

#[async_trait]
impl DocumentExtractor for ExtractionService {
    async fn extract(&self, document: &Document) -> AppResult<ExtractionOutput> {
        if document.bytes.is_empty() {
            return Err(ExtractionError::EmptyDocument {
                file_name: document.file_name.clone(),
            }
            .into());
        }

        info!("[{}] 📄 正在转换文档...", document.file_name);
        let markdown = self.to_markdown(document).await?;
        debug!("[{}] markdown 长度: {} 字符", document.file_name, markdown.len());

        let markdown_salvo_em = self.archive(document, &markdown).await;

        let cpf = match cpf::find_primary(&markdown) {
            Some(found) => Some(found),
            None => {
                debug!("[{}] 正则未找到 CPF，交给模型", document.file_name);
                self.cpf_from_model(&markdown).await
            }
        };

        let (exames, erro) = self.exams_from_model(&markdown).await?;
        info!(
            "[{}] ✓ 提取完成: CPF {}，{} 个检查项目",
            document.file_name,
            cpf.as_deref().map(cpf::mask).unwrap_or_else(|| "ausente".to_string()),
            exames.len()
        );

        Ok(ExtractionOutput {
            cpf,
            exames,
            markdown_content: markdown,
            erro,
            markdown_salvo_em,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::Mutex;

    /// 按顺序返回预设回复
    struct ScriptedChat {
        replies: Mutex<Vec<AppResult<String>>>,
    }

    impl ScriptedChat {
        fn new(replies: Vec<AppResult<String>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
            })
        }
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn complete(&self, _system: &str, _user: &str) -> AppResult<String> {
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok("{}".to_string()))
        }
    }

    struct FixedConverter(String);

    #[async_trait]
    impl DocumentConverter for FixedConverter {
        async fn convert(&self, input: &Path, _out: &Path, _name: &str) -> AppResult<String> {
            assert!(input.exists());
            Ok(self.0.clone())
        }
    }

    struct FailingConverter;

    #[async_trait]
    impl DocumentConverter for FailingConverter {
        async fn convert(&self, _input: &Path, _out: &Path, file_name: &str) -> AppResult<String> {
            Err(ExtractionError::ConversionFailed {
                file_name: file_name.to_string(),
                message: "corrompido".to_string(),
            }
            .into())
        }
    }

    /// 记录转换时拿到的临时路径
    struct CapturingConverter {
        fail: bool,
        seen: Mutex<Vec<PathBuf>>,
    }

    impl CapturingConverter {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                fail,
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<PathBuf> {
            self.seen.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl DocumentConverter for CapturingConverter {
        async fn convert(&self, input: &Path, out: &Path, file_name: &str) -> AppResult<String> {
            assert!(input.exists() && out.exists());
            self.seen
                .lock()
                .unwrap()
                .extend([input.to_path_buf(), out.to_path_buf()]);
            if self.fail {
                return Err(ExtractionError::ConversionFailed {
                    file_name: file_name.to_string(),
                    message: "corrompido".to_string(),
                }
                .into());
            }
            Ok("CE/67495788372".to_string())
        }
    }

    #[tokio::test]
    async fn test_temp_files_removed_on_every_exit_path() {
        for fail in [true, false] {
            let converter = CapturingConverter::new(fail);
            let chat = ScriptedChat::new(vec![Ok("{\"exames\": []}".to_string())]);
            let service = ExtractionService::new(converter.clone(), chat);

            let result = service.extract(&Document::new("aso.pdf", vec![1, 2])).await;
            assert_eq!(result.is_err(), fail);

            let seen = converter.seen();
            assert_eq!(seen.len(), 2);
            assert!(seen[0].to_string_lossy().ends_with(".pdf"));
            assert!(seen.iter().all(|path| !path.exists()));
        }
    }

    #[tokio::test]
    async fn test_regex_cpf_and_model_exams() {
        let chat = ScriptedChat::new(vec![Ok(
            "```json\n{\"exames\": [\"HEMOGRAMA\", \" GLICOSE \", \"HEMOGRAMA\"]}\n```".to_string(),
        )]);
        let service = ExtractionService::new(
            Arc::new(FixedConverter("Paciente CE/67495788372".to_string())),
            chat,
        );

        let output = service
            .extract(&Document::new("aso.pdf", vec![1, 2, 3]))
            .await
            .unwrap();
        assert_eq!(output.cpf.as_deref(), Some("67495788372"));
        assert_eq!(output.exames, vec!["HEMOGRAMA", "GLICOSE"]);
        assert!(output.erro.is_none());
    }

    #[tokio::test]
    async fn test_model_cpf_fallback_and_missing_exams_key() {
        let chat = ScriptedChat::new(vec![
            Ok("{\"cpf\": \"956.593.663-68\"}".to_string()),
            Ok("{\"resultado\": []}".to_string()),
        ]);
        let service = ExtractionService::new(Arc::new(FixedConverter("sem números".into())), chat);

        let output = service
            .extract(&Document::new("aso.pdf", vec![1]))
            .await
            .unwrap();
        assert_eq!(output.cpf.as_deref(), Some("95659366368"));
        assert!(output.exames.is_empty());
        assert_eq!(
            output.erro.as_deref(),
            Some("Resposta da IA não contém a chave 'exames'.")
        );
    }

    #[tokio::test]
    async fn test_plain_text_skips_converter_and_is_archived() {
        let archive = tempfile::tempdir().unwrap();
        let chat = ScriptedChat::new(vec![Ok("{\"exames\": [\"GAMA GT\"]}".to_string())]);
        let service = ExtractionService::new(Arc::new(FailingConverter), chat)
            .with_archive_dir(archive.path());

        let output = service
            .extract(&Document::new("laudo.md", b"CPF 67495788372\n## GAMA GT".to_vec()))
            .await
            .unwrap();
        assert_eq!(output.exames, vec!["GAMA GT"]);
        let saved = output.markdown_salvo_em.unwrap();
        assert!(saved.contains("ocr_laudo_"));
        assert!(Path::new(&saved).exists());
    }

    #[tokio::test]
    async fn test_conversion_failure_is_fatal() {
        let service = ExtractionService::new(Arc::new(FailingConverter), ScriptedChat::new(vec![]));
        let result = service.extract(&Document::new("aso.pdf", vec![1])).await;
        assert!(matches!(
            result,
            Err(AppError::Extraction(ExtractionError::ConversionFailed { .. }))
        ));
    }

    #[tokio::test]
    async fn test_transport_failure_is_fatal() {
        let chat = ScriptedChat::new(vec![Err(AppError::Llm(LlmError::Transport {
            model: "m".into(),
            message: "timeout".into(),
        }))]);
        let service = ExtractionService::new(Arc::new(FixedConverter("CE/67495788372".into())), chat);
        let result = service.extract(&Document::new("aso.pdf", vec![1])).await;
        assert!(matches!(
            result,
            Err(AppError::Extraction(ExtractionError::ExamExtraction(_)))
        ));
    }

    #[tokio::test]
    async fn test_empty_document_is_rejected() {
        let service = ExtractionService::new(Arc::new(FailingConverter), ScriptedChat::new(vec![]));
        let result = service.extract(&Document::new("aso.pdf", vec![])).await;
        assert!(matches!(
            result,
            Err(AppError::Extraction(ExtractionError::EmptyDocument { .. }))
        ));
    }
}
