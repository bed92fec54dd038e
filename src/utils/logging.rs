//! 日志工具模块
//!
//! 初始化 tracing（控制台 + 日志文件），并提供格式化输出的辅助函数

use std::fs::{self, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// 初始化日志系统
///
/// `RUST_LOG` 优先；否则按 `verbose` 选择 `debug` 或 `info`。
/// 日志同时输出到控制台和 `log_file`（追加写入，无 ANSI 颜色）。
pub fn init(log_file: &str, verbose: bool) -> Result<()> {
    if let Some(parent) = Path::new(log_file).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("无法创建日志目录: {}", parent.display()))?;
        }
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("无法打开日志文件: {}", log_file))?;

    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file)),
        )
        .try_init()
        .context("日志系统已初始化")?;

    Ok(())
}

/// 记录程序启动信息
pub fn log_startup(max_concurrent: usize, chat_model: &str) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 体检文档放行校验");
    info!("📊 最大并发文档数: {}", max_concurrent);
    info!("🤖 模型: {}", chat_model);
    info!("{}", "=".repeat(60));
}

/// 记录任务加载信息
pub fn log_jobs_loaded(total: usize, max_concurrent: usize) {
    info!("✓ 找到 {} 个待处理的文档任务", total);
    info!("📋 最多同时处理 {} 个文档\n", max_concurrent);
}

/// 打印最终统计信息
pub fn print_final_stats(completed: usize, liberated: usize, failed: usize, total: usize, output_folder: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 完成比对: {}/{}", completed, total);
    info!("🟢 放行: {}", liberated);
    info!("❌ 失败: {}", failed);
    info!("{}", "=".repeat(60));
    info!("\n结果已保存至: {}", output_folder);
}

/// 截断长文本用于日志显示
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text_counts_chars_not_bytes() {
        assert_eq!(truncate_text("RAIO-X DE TÓRAX", 20), "RAIO-X DE TÓRAX");
        assert_eq!(truncate_text("ÁCIDO ÚRICO", 5), "ÁCIDO...");
    }
}
