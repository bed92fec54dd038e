use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::exam::validate_required_exams;
use crate::error::AppResult;

/// 批处理任务清单（一个 TOML 文件对应一个文档）
///
/// ```toml
/// nome = "periodico_joao"
/// documento = "docs/BR MED - PERIÓDICO.pdf"
/// exames_obrigatorios = ["HEMOGRAMA", "GLICOSE"]
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentJob {
    /// 文档路径，相对路径按清单所在目录解析
    pub documento: String,
    pub exames_obrigatorios: Vec<String>,
    #[serde(default)]
    pub nome: Option<String>,
    /// 清单文件路径（加载时填充）
    #[serde(skip)]
    pub file_path: Option<String>,
}

impl DocumentJob {
    /// 日志和输出文件使用的标签
    pub fn label(&self) -> String {
        if let Some(nome) = self.nome.as_deref().filter(|n| !n.trim().is_empty()) {
            return nome.trim().to_string();
        }
        self.file_path
            .as_deref()
            .and_then(|p| Path::new(p).file_stem())
            .or_else(|| Path::new(&self.documento).file_stem())
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "documento".to_string())
    }

    pub fn document_path(&self) -> PathBuf {
        let doc = Path::new(&self.documento);
        if doc.is_absolute() {
            return doc.to_path_buf();
        }
        match self.file_path.as_deref().and_then(|p| Path::new(p).parent()) {
            Some(dir) => dir.join(doc),
            None => doc.to_path_buf(),
        }
    }

    /// 校验必检项目，返回去空白后的列表
    pub fn validated_exams(&self) -> AppResult<Vec<String>> {
        validate_required_exams(&self.exames_obrigatorios)
    }
}
