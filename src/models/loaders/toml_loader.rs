use crate::error::{AppError, AppResult, FileError};
use crate::models::job::DocumentJob;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载一个任务清单
pub async fn load_toml_to_job(toml_file_path: &Path) -> AppResult<DocumentJob> {
    let path_text = toml_file_path.display().to_string();
    let content = fs::read_to_string(toml_file_path)
        .await
        .map_err(|e| AppError::file_read_failed(path_text.clone(), e))?;

    let mut job: DocumentJob = toml::from_str(&content).map_err(|source| FileError::TomlParseFailed {
        path: path_text.clone(),
        source,
    })?;

    // 设置文件路径
    job.file_path = Some(path_text);

    Ok(job)
}

/// 从文件夹中加载所有 TOML 任务清单（按文件名排序）
pub async fn load_all_jobs(folder_path: &str) -> AppResult<Vec<DocumentJob>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        return Err(FileError::DirectoryNotFound {
            path: folder_path.to_string(),
        }
        .into());
    }

    let mut toml_files = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(folder_path, e))?
    {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) == Some("toml") {
            toml_files.push(path);
        }
    }
    toml_files.sort();

    let mut jobs = Vec::new();
    for path in toml_files {
        tracing::info!(
            "正在加载: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_toml_to_job(&path).await {
            Ok(job) => {
                tracing::info!(
                    "成功加载任务 {}，{} 个必检项目",
                    job.label(),
                    job.exames_obrigatorios.len()
                );
                jobs.push(job);
            }
            Err(e) => {
                tracing::warn!("加载文件失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(jobs)
}
