use std::time::Duration;

use crate::error::{AppResult, ConfigError};
use crate::utils::retry::RetryPolicy;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    pub openai_api_key: String,
    pub openai_api_base: String,
    /// 用于提取和比对的聊天模型
    pub chat_model: String,
    /// 用于相似度检索的 embedding 模型
    pub embedding_model: String,
    // --- 相似度索引 ---
    pub similarity_index_path: String,
    /// 每个必检项目检索的近邻数量
    pub similarity_neighbors: usize,
    // --- BRMED 门户 ---
    pub brmed_url: String,
    pub brmed_username: String,
    pub brmed_password: String,
    /// 设置后连接已运行的浏览器，否则启动无头浏览器
    pub browser_debug_port: Option<u16>,
    pub chrome_executable: Option<String>,
    /// 单个导航步骤的超时（秒）
    pub lookup_step_timeout_secs: u64,
    /// 等待名册页面的超时（秒）
    pub lookup_page_timeout_secs: u64,
    // --- 文档转换 ---
    /// 外部转换命令，支持 `{input}` 与 `{output_dir}` 占位符
    pub converter_command: String,
    // --- 输出目录 ---
    pub ocr_results_dir: String,
    pub lookup_results_dir: String,
    pub audit_dir: String,
    // --- 批处理 ---
    pub jobs_folder: String,
    pub output_folder: String,
    pub max_concurrent_documents: usize,
    // --- 重试 ---
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    // --- 日志 ---
    pub log_file: String,
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_api_key: String::new(),
            openai_api_base: "https://api.openai.com/v1".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
            similarity_index_path: "data/exam_similarity_index.json".to_string(),
            similarity_neighbors: 5,
            brmed_url: "https://operacoes.grupobrmed.com.br/".to_string(),
            brmed_username: String::new(),
            brmed_password: String::new(),
            browser_debug_port: None,
            chrome_executable: None,
            lookup_step_timeout_secs: 30,
            lookup_page_timeout_secs: 60,
            converter_command: "docling --to md --output {output_dir} {input}".to_string(),
            ocr_results_dir: "ocr_resultados".to_string(),
            lookup_results_dir: "resultados".to_string(),
            audit_dir: "auditoria_validacao".to_string(),
            jobs_folder: "jobs".to_string(),
            output_folder: "output".to_string(),
            max_concurrent_documents: 4,
            retry_max_attempts: 3,
            retry_base_delay_ms: 1_000,
            retry_max_delay_ms: 10_000,
            log_file: "logs/app.log".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    /// 从环境变量加载配置（先读取可选的 `.env` 文件）
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let default = Self::default();
        Self {
            openai_api_key: env_or("OPENAI_API_KEY", default.openai_api_key),
            openai_api_base: env_or("OPENAI_API_BASE", default.openai_api_base),
            chat_model: env_or("MODELO_GPT", default.chat_model),
            embedding_model: env_or("MODELO_EMBEDDING", default.embedding_model),
            similarity_index_path: env_or("EXAM_SIMILARITY_INDEX_PATH", default.similarity_index_path),
            similarity_neighbors: env_parse("K_VIZINHOS_EXAMES", default.similarity_neighbors),
            brmed_url: env_or("BRMED_URL", default.brmed_url),
            brmed_username: env_or("BRMED_USERNAME", default.brmed_username),
            brmed_password: env_or("BRMED_PASSWORD", default.brmed_password),
            browser_debug_port: std::env::var("BROWSER_DEBUG_PORT").ok().and_then(|v| v.parse().ok()),
            chrome_executable: std::env::var("CHROME_EXECUTABLE").ok().filter(|v| !v.is_empty()),
            lookup_step_timeout_secs: env_parse("LOOKUP_STEP_TIMEOUT_SECS", default.lookup_step_timeout_secs),
            lookup_page_timeout_secs: env_parse("LOOKUP_PAGE_TIMEOUT_SECS", default.lookup_page_timeout_secs),
            converter_command: env_or("CONVERTER_COMMAND", default.converter_command),
            ocr_results_dir: env_or("OCR_RESULTS_DIR", default.ocr_results_dir),
            lookup_results_dir: env_or("LOOKUP_RESULTS_DIR", default.lookup_results_dir),
            audit_dir: env_or("AUDIT_DIR", default.audit_dir),
            jobs_folder: env_or("JOBS_FOLDER", default.jobs_folder),
            output_folder: env_or("OUTPUT_FOLDER", default.output_folder),
            max_concurrent_documents: env_parse("MAX_CONCURRENT_DOCUMENTS", default.max_concurrent_documents).max(1),
            retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS", default.retry_max_attempts),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS", default.retry_base_delay_ms),
            retry_max_delay_ms: env_parse("RETRY_MAX_DELAY_MS", default.retry_max_delay_ms),
            log_file: env_or("LOG_FILE", default.log_file),
            verbose_logging: env_parse("VERBOSE_LOGGING", default.verbose_logging),
        }
    }

    /// 启动前校验关键配置
    pub fn validate(&self) -> AppResult<()> {
        if self.similarity_neighbors == 0 {
            return Err(invalid("K_VIZINHOS_EXAMES", "deve ser maior que zero"));
        }
        if self.retry_max_attempts == 0 {
            return Err(invalid("RETRY_MAX_ATTEMPTS", "deve ser maior que zero"));
        }
        if !self.converter_command.contains("{input}") {
            return Err(invalid("CONVERTER_COMMAND", "precisa conter o marcador {input}"));
        }
        Ok(())
    }

    /// LLM / embedding 调用使用的重试策略
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.retry_max_attempts,
            Duration::from_millis(self.retry_base_delay_ms),
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn lookup_step_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_step_timeout_secs)
    }

    pub fn lookup_page_timeout(&self) -> Duration {
        Duration::from_secs(self.lookup_page_timeout_secs)
    }
}

fn invalid(key: &str, reason: &str) -> crate::error::AppError {
    ConfigError::Invalid {
        key: key.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

fn env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_reference_deployment() {
        let config = Config::default();
        assert_eq!(config.similarity_neighbors, 5);
        assert_eq!(config.chat_model, "gpt-4o-mini");

        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_converter_without_input_marker() {
        let config = Config {
            converter_command: "docling --to md".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
