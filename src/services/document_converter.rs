//! 文档转换 - 业务能力层
//!
//! 把 PDF/图片等文档转换为 markdown 文本。转换本身交给外部命令完成。

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{AppResult, ExtractionError};

/// 文档转换器
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    /// `input` 是磁盘上的临时文件，`output_dir` 是本次转换专用的空目录
    async fn convert(&self, input: &Path, output_dir: &Path, file_name: &str) -> AppResult<String>;
}

/// 调用外部命令转换
///
/// 命令模板中的 `{input}` 和 `{output_dir}` 会被替换；产物优先取
/// `output_dir` 中的 `.md` 文件，没有则取标准输出。
pub struct CommandConverter {
    command_template: String,
}

impl CommandConverter {
    pub fn new(command_template: impl Into<String>) -> Self {
        Self {
            command_template: command_template.into(),
        }
    }

    fn build_args(&self, input: &Path, output_dir: &Path) -> Vec<String> {
        let input = input.to_string_lossy();
        let output_dir = output_dir.to_string_lossy();
        self.command_template
            .split_whitespace()
            .map(|part| {
                part.replace("{input}", &input)
                    .replace("{output_dir}", &output_dir)
            })
            .collect()
    }
}

#[async_trait]
impl DocumentConverter for CommandConverter {
    async fn convert(&self, input: &Path, output_dir: &Path, file_name: &str) -> AppResult<String> {
        let args = self.build_args(input, output_dir);
        let Some((program, rest)) = args.split_first() else {
            return Err(conversion_failed(file_name, "comando de conversão vazio"));
        };
        debug!("执行转换命令: {} {:?}", program, rest);

        let output = Command::new(program)
            .args(rest)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| conversion_failed(file_name, format!("falha ao executar {}: {}", program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!("转换命令失败 ({}): {}", output.status, stderr.trim());
            return Err(conversion_failed(
                file_name,
                format!("{} terminou com {}: {}", program, output.status, stderr.trim()),
            ));
        }

        let markdown = match find_markdown(output_dir).await {
            Some(path) => tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| conversion_failed(file_name, format!("falha ao ler {}: {}", path.display(), e)))?,
            None => String::from_utf8_lossy(&output.stdout).to_string(),
        };

        if markdown.trim().is_empty() {
            return Err(ExtractionError::EmptyDocument {
                file_name: file_name.to_string(),
            }
            .into());
        }
        Ok(markdown)
    }
}

fn conversion_failed(file_name: &str, message: impl Into<String>) -> crate::error::AppError {
    ExtractionError::ConversionFailed {
        file_name: file_name.to_string(),
        message: message.into(),
    }
    .into()
}

async fn find_markdown(dir: &Path) -> Option<PathBuf> {
    let mut entries = tokio::fs::read_dir(dir).await.ok()?;
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("md") {
            return Some(path);
        }
    }
    None
}
