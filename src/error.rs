//! 错误类型
//!
//! 按关注点分层：每个能力一个子枚举，统一汇总到 [`AppError`]。
//! `Display` 文本会原样写入决策记录的 `erro` 字段，因此使用葡萄牙语。

use async_openai::error::OpenAIError;
use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 文档转换 / 提取错误（对单次流程是致命的）
    #[error("Erro na extração do documento: {0}")]
    Extraction(#[from] ExtractionError),
    /// 名册查询错误（只驱动 CPF 重试循环）
    #[error("Erro na consulta BRMED: {0}")]
    Lookup(#[from] LookupError),
    /// LLM / Embedding 调用错误
    #[error("Erro no modelo de linguagem: {0}")]
    Llm(#[from] LlmError),
    /// 相似度索引错误
    #[error("Erro no índice de similaridade: {0}")]
    Similarity(#[from] SimilarityError),
    /// 比对结果错误
    #[error("Erro ao comparar exames: {0}")]
    Reconciliation(#[from] ReconciliationError),
    /// 调用方输入格式错误
    #[error("Entrada inválida: {0}")]
    Input(#[from] InputError),
    /// 文件操作错误
    #[error("Erro de arquivo: {0}")]
    File(#[from] FileError),
    /// 配置错误
    #[error("Erro de configuração: {0}")]
    Config(#[from] ConfigError),
}

/// 文档提取错误
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("documento vazio: {file_name}")]
    EmptyDocument { file_name: String },
    #[error("falha ao converter {file_name}: {message}")]
    ConversionFailed { file_name: String, message: String },
    #[error("falha ao preparar arquivo temporário para {file_name}: {source}")]
    TempFile {
        file_name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("falha na extração de exames via IA: {0}")]
    ExamExtraction(#[source] LlmError),
}

/// 名册查询错误
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("falha no navegador: {0}")]
    Browser(String),
    #[error("tempo esgotado aguardando {step} ({secs}s)")]
    Timeout { step: String, secs: u64 },
    #[error("elemento não encontrado: {0}")]
    ElementNotFound(String),
    #[error("credenciais do portal não configuradas")]
    MissingCredentials,
    #[error("nenhum exame encontrado na guia do CPF {cpf}")]
    EmptyRoster { cpf: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 传输层失败（网络、超时），可以重试
    #[error("falha de transporte na chamada ao modelo {model}: {message}")]
    Transport { model: String, message: String },
    /// 服务端返回了格式良好的错误，不重试
    #[error("o modelo {model} retornou erro: {message}")]
    Api { model: String, message: String },
    #[error("resposta vazia do modelo {model}")]
    EmptyResponse { model: String },
    #[error("resposta do modelo não é um JSON válido ({preview}): {source}")]
    InvalidJson {
        preview: String,
        #[source]
        source: serde_json::Error,
    },
}

impl LlmError {
    /// 把 async-openai 的错误映射为本地分类
    pub fn from_openai(model: impl Into<String>, err: OpenAIError) -> Self {
        let model = model.into();
        match err {
            OpenAIError::Reqwest(e) => LlmError::Transport {
                model,
                message: e.to_string(),
            },
            OpenAIError::ApiError(api) => LlmError::Api {
                model,
                message: api.message,
            },
            other => LlmError::Api {
                model,
                message: other.to_string(),
            },
        }
    }

    /// 解析 JSON 失败
    pub fn invalid_json(response: &str, source: serde_json::Error) -> Self {
        LlmError::InvalidJson {
            preview: crate::utils::logging::truncate_text(response, 120),
            source,
        }
    }
}

/// 相似度索引错误
#[derive(Debug, Error)]
pub enum SimilarityError {
    #[error("falha ao carregar índice {path}: {message}")]
    IndexLoad { path: String, message: String },
    #[error("dimensão do embedding incompatível: esperado {expected}, recebido {found}")]
    DimensionMismatch { expected: usize, found: usize },
    #[error("embedding vazio para '{0}'")]
    EmptyEmbedding(String),
}

/// 比对结果错误
#[derive(Debug, Error)]
pub enum ReconciliationError {
    #[error("formato de comparação inesperado: {0}")]
    UnexpectedShape(String),
}

/// 调用方输入错误
#[derive(Debug, Error)]
pub enum InputError {
    #[error("exames obrigatórios devem ser um array JSON válido: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("exame obrigatório vazio na posição {index}")]
    BlankExamName { index: usize },
    #[error("documento não encontrado: {path}")]
    MissingDocument { path: String },
    #[error("nome de arquivo ausente")]
    MissingFileName,
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("falha ao ler {path}: {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("falha ao gravar {path}: {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("falha ao interpretar TOML {path}: {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("diretório não encontrado: {path}")]
    DirectoryNotFound { path: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} inválido: {reason}")]
    Invalid { key: String, reason: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Lookup(LookupError::Browser(err.to_string()))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Llm(LlmError::InvalidJson {
            preview: String::new(),
            source: err,
        })
    }
}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        AppError::File(FileError::TomlParseFailed {
            path: String::new(),
            source: err,
        })
    }
}

/// 没有模型名时使用；知道模型名的调用方用 [`LlmError::from_openai`]
impl From<OpenAIError> for AppError {
    fn from(err: OpenAIError) -> Self {
        AppError::Llm(LlmError::from_openai("desconhecido", err))
    }
}

// ========== 便捷方法 ==========

impl AppError {
    /// 是否属于可重试的瞬时故障（传输层）
    ///
    /// 服务端返回的格式良好的错误、解析错误等都不重试。
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Llm(LlmError::Transport { .. }))
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_are_transient() {
        let transport = AppError::Llm(LlmError::Transport {
            model: "gpt-4o-mini".into(),
            message: "connection reset".into(),
        });
        let api = AppError::Llm(LlmError::Api {
            model: "gpt-4o-mini".into(),
            message: "invalid api key".into(),
        });
        let lookup = AppError::Lookup(LookupError::MissingCredentials);

        assert!(transport.is_transient());
        assert!(!api.is_transient());
        assert!(!lookup.is_transient());
    }

    #[test]
    fn test_common_errors_convert_with_question_mark() {
        fn parse_json() -> AppResult<serde_json::Value> {
            Ok(serde_json::from_str("{não é json")?)
        }
        fn parse_toml() -> AppResult<toml::Table> {
            Ok(toml::from_str("documento = ")?)
        }
        fn openai() -> AppResult<()> {
            let result: Result<(), OpenAIError> =
                Err(OpenAIError::InvalidArgument("modelo vazio".into()));
            result?;
            Ok(())
        }

        assert!(matches!(parse_json(), Err(AppError::Llm(LlmError::InvalidJson { .. }))));
        assert!(matches!(
            parse_toml(),
            Err(AppError::File(FileError::TomlParseFailed { .. }))
        ));
        let err = openai().unwrap_err();
        assert!(matches!(err, AppError::Llm(LlmError::Api { .. })));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_display_is_caller_facing() {
        let err = AppError::Input(InputError::BlankExamName { index: 2 });
        assert_eq!(
            err.to_string(),
            "Entrada inválida: exame obrigatório vazio na posição 2"
        );
    }
}
