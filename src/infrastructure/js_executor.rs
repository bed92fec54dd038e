//! JS 执行器 - 基础设施层
//!
//! 持有唯一的 page 资源，只暴露"执行 JS"和"等待页面条件"的能力

use std::time::Duration;

use chromiumoxide::Page;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, timeout, Instant};
use tracing::debug;

use crate::error::{AppResult, LookupError};

/// 轮询间隔
const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JS 执行器
///
/// 职责：
/// - 持有唯一的 Page 资源
/// - 暴露 eval() 能力
/// - 不认识 CPF / 名册
/// - 不处理业务流程
pub struct JsExecutor {
    page: Page,
}

impl JsExecutor {
    /// 创建新的 JS 执行器
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    /// 获取 page 的引用（用于其他操作）
    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> AppResult<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result
            .into_value()
            .map_err(|e| LookupError::Browser(format!("resultado JS inválido: {}", e)))?;
        Ok(json_value)
    }

    /// 执行 JS 代码并反序列化为指定类型
    pub async fn eval_as<T: DeserializeOwned>(&self, js_code: impl Into<String>) -> AppResult<T> {
        let json_value = self.eval(js_code).await?;
        let typed_value = serde_json::from_value(json_value)
            .map_err(|e| LookupError::Browser(format!("resultado JS inesperado: {}", e)))?;
        Ok(typed_value)
    }

    /// 导航，超时视为查询失败
    pub async fn goto(&self, url: &str, limit: Duration) -> AppResult<()> {
        timeout(limit, self.page.goto(url))
            .await
            .map_err(|_| LookupError::Timeout {
                step: format!("navegação para {}", url),
                secs: limit.as_secs(),
            })??;
        Ok(())
    }

    /// 轮询直到 JS 条件表达式为真
    pub async fn wait_until(&self, condition_js: &str, step: &str, limit: Duration) -> AppResult<()> {
        let deadline = Instant::now() + limit;
        let js = format!("Boolean({})", condition_js);
        loop {
            // 页面跳转中 evaluate 可能失败，继续等
            if let Ok(true) = self.eval_as::<bool>(js.as_str()).await {
                debug!("条件满足: {}", step);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(LookupError::Timeout {
                    step: step.to_string(),
                    secs: limit.as_secs(),
                }
                .into());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// 等待页面加载完成（document.readyState）
    pub async fn wait_for_load(&self, step: &str, limit: Duration) -> AppResult<()> {
        self.wait_until("document.readyState === 'complete'", step, limit)
            .await
    }

    /// 等待元素出现并点击
    pub async fn click(&self, selector: &str, limit: Duration) -> AppResult<()> {
        let selector_js = js_string(selector);
        self.wait_until(
            &format!("document.querySelector({})", selector_js),
            selector,
            limit,
        )
        .await?;
        let clicked: bool = self
            .eval_as(format!(
                "(() => {{ const el = document.querySelector({}); if (!el) return false; \
                 el.scrollIntoView({{block: 'center'}}); el.click(); return true; }})()",
                selector_js
            ))
            .await?;
        if clicked {
            Ok(())
        } else {
            Err(LookupError::ElementNotFound(selector.to_string()).into())
        }
    }

    /// 等待包含指定文本的链接或按钮出现并点击
    pub async fn click_text(&self, text: &str, limit: Duration) -> AppResult<()> {
        let finder = find_by_text_js(text);
        self.wait_until(&finder, text, limit).await?;
        let clicked: bool = self
            .eval_as(format!(
                "(() => {{ const el = {}; if (!el) return false; el.click(); return true; }})()",
                finder
            ))
            .await?;
        if clicked {
            Ok(())
        } else {
            Err(LookupError::ElementNotFound(text.to_string()).into())
        }
    }

    /// 包含指定文本的链接的 href（没有则为 None）
    pub async fn href_of_text(&self, text: &str) -> AppResult<Option<String>> {
        self.eval_as(format!(
            "(() => {{ const el = {}; return el && el.href ? el.href : null; }})()",
            find_by_text_js(text)
        ))
        .await
    }

    /// 使用真实键盘事件向输入框输入文本
    pub async fn type_into(&self, selector: &str, text: &str) -> AppResult<()> {
        let element = self
            .page
            .find_element(selector)
            .await
            .map_err(|_| LookupError::ElementNotFound(selector.to_string()))?;
        element.click().await?;
        element.type_str(text).await?;
        Ok(())
    }

    /// 直接设置输入框的值（登录表单使用）
    pub async fn fill(&self, selector: &str, value: &str, limit: Duration) -> AppResult<()> {
        let selector_js = js_string(selector);
        self.wait_until(
            &format!("document.querySelector({})", selector_js),
            selector,
            limit,
        )
        .await?;
        self.eval(format!(
            "(() => {{ const el = document.querySelector({}); el.focus(); el.value = {}; \
             el.dispatchEvent(new Event('input', {{bubbles: true}})); \
             el.dispatchEvent(new Event('change', {{bubbles: true}})); }})()",
            selector_js,
            js_string(value)
        ))
        .await?;
        Ok(())
    }

    /// 页面可见文本
    pub async fn inner_text(&self) -> AppResult<String> {
        self.eval_as("document.body ? document.body.innerText : ''").await
    }
}

/// 转成 JS 字符串字面量
fn js_string(value: &str) -> String {
    JsonValue::String(value.to_string()).to_string()
}

fn find_by_text_js(text: &str) -> String {
    format!(
        "Array.from(document.querySelectorAll('a, button, span, li, input[type=submit]'))\
         .find(el => (el.innerText || el.value || '').trim().includes({}))",
        js_string(text)
    )
}
