//! 浏览器生命周期

pub mod connection;
pub mod headless;

use chromiumoxide::Browser;
use tracing::{debug, warn};

use crate::error::AppResult;

pub use connection::connect_to_browser;
pub use headless::launch_headless_browser;

/// 一次门户查询使用的浏览器
///
/// 自己启动的浏览器在结束时关闭；连接到的外部浏览器保持打开。
pub struct BrowserSession {
    pub browser: Browser,
    owned: bool,
}

impl BrowserSession {
    /// 配置了调试端口则连接，否则启动无头浏览器
    pub async fn open(debug_port: Option<u16>, chrome_executable: Option<&str>) -> AppResult<Self> {
        match debug_port {
            Some(port) => Ok(Self {
                browser: connect_to_browser(port).await?,
                owned: false,
            }),
            None => Ok(Self {
                browser: launch_headless_browser(chrome_executable).await?,
                owned: true,
            }),
        }
    }

    pub async fn close(mut self) {
        if !self.owned {
            return;
        }
        if let Err(e) = self.browser.close().await {
            warn!("关闭浏览器失败: {}", e);
            return;
        }
        let _ = self.browser.wait().await;
        debug!("浏览器已关闭");
    }
}
