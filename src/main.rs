use anyhow::Result;
use exam_liberation::utils::logging;
use exam_liberation::{App, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // 加载配置
    let config = Config::from_env();

    // 初始化日志
    logging::init(&config.log_file, config.verbose_logging)?;
    logging::log_startup(config.max_concurrent_documents, &config.chat_model);

    // 初始化并运行应用
    App::initialize(config).await?.run().await?;

    Ok(())
}
