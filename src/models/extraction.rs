use std::path::Path;

use serde::Serialize;

use crate::error::{AppError, AppResult, InputError};

/// 上传的文档：原始字节 + 文件名
#[derive(Debug, Clone)]
pub struct Document {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// 从磁盘读取文档
    pub async fn from_path(path: &Path) -> AppResult<Self> {
        if !path.exists() {
            return Err(InputError::MissingDocument {
                path: path.display().to_string(),
            }
            .into());
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or(InputError::MissingFileName)?;
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::file_read_failed(path.display().to_string(), e))?;
        Ok(Self::new(file_name, bytes))
    }

    /// 小写扩展名，带点号（如 `.pdf`），没有扩展名时为空
    pub fn extension(&self) -> String {
        Path::new(&self.file_name)
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
            .unwrap_or_default()
    }

    /// 去掉扩展名的文件名
    pub fn stem(&self) -> String {
        Path::new(&self.file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "documento".to_string())
    }
}

/// 提取结果：主 CPF、检查项目、完整文本
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionOutput {
    pub cpf: Option<String>,
    pub exames: Vec<String>,
    pub markdown_content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub erro: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markdown_salvo_em: Option<String>,
}
