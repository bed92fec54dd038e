//! 审计写入服务 - 业务能力层
//!
//! 只负责"写审计记录"能力，不关心流程

use std::io::ErrorKind;
use std::path::PathBuf;

use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};
use crate::models::ComparisonVerdict;

/// 一次比对的审计记录
#[derive(Debug, Serialize)]
pub struct AuditRecord<'a> {
    pub cpf: &'a str,
    pub exames_obrigatorios: &'a [String],
    pub exames_brnet: &'a [String],
    pub exames_enviados: &'a [String],
    pub resultado: &'a [ComparisonVerdict],
}

/// 审计写入服务
///
/// 每次比对写一个 `validacao_<cpf>_<时间戳>.json`，运行时不会再读回。
/// 时间戳精确到毫秒；同名文件已存在时追加序号，不覆盖旧记录。
pub struct AuditWriter {
    dir: PathBuf,
}

impl AuditWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// 写入审计记录，返回文件路径
    pub async fn write(&self, record: &AuditRecord<'_>) -> AppResult<String> {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f");
        let base = format!("validacao_{}_{}", record.cpf, timestamp);

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AppError::file_write_failed(self.dir.display().to_string(), e))?;

        let json = serde_json::to_string_pretty(record).map_err(|e| {
            AppError::file_write_failed(self.dir.display().to_string(), std::io::Error::other(e))
        })?;

        let mut attempt = 0;
        loop {
            let name = match attempt {
                0 => format!("{}.json", base),
                n => format!("{}_{}.json", base, n),
            };
            let path = self.dir.join(name);
            let path_text = path.display().to_string();

            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(mut file) => {
                    debug!("写入审计记录: {}", path_text);
                    file.write_all(json.as_bytes())
                        .await
                        .and(file.flush().await)
                        .map_err(|e| AppError::file_write_failed(&path_text, e))?;
                    return Ok(path_text);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(AppError::file_write_failed(&path_text, e)),
            }
        }
    }
}
