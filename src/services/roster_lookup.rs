//! 名册查询服务 - 业务能力层
//!
//! 只负责"CPF -> 必检名册"能力。浏览器自动化的每一步都有超时，
//! 任何失败都折叠为 [`RosterOutcome::Error`]，不向上抛出。

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::target::TargetId;
use regex::Regex;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::browser::BrowserSession;
use crate::config::Config;
use crate::error::{AppError, AppResult, LookupError};
use crate::infrastructure::JsExecutor;
use crate::models::{Roster, RosterOutcome};
use crate::utils::cpf;

/// 名册查询能力
#[async_trait]
pub trait RosterLookup: Send + Sync {
    /// 查不到时返回结构化错误，不会 panic 也不会返回 Err
    async fn lookup(&self, cpf: &str) -> RosterOutcome;
}

// ========== 页面解析 ==========

static NAME_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Nome / Name:[ \t]*(.*?)(?:Identidade / ID Number:|\n|$)").expect("name regex")
});

const EXAMS_HEADER: &str = "4. Exames / Exams:";

/// 准备说明、页脚等非检查项目行
const SKIPPED_PHRASES: [&str; 11] = [
    "não requer preparo prévio",
    "jejum",
    "horas antes do exame",
    "evitar",
    "não ingerir",
    "manter dieta",
    "informar os medicamentos",
    "caso faça uso de óculos",
    "não se expor a sons fortes",
    "voltar imprimir",
    "copyright",
];

/// 解析"Guia de Encaminhamento"页面文本
pub fn parse_roster_page(content: &str) -> Roster {
    let nome = NAME_LINE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| {
            m.as_str()
                .split('\t')
                .next()
                .unwrap_or_default()
                .split("  ")
                .next()
                .unwrap_or_default()
                .trim()
                .to_string()
        })
        .filter(|n| !n.is_empty());

    let mut exames: Vec<String> = Vec::new();
    if let Some(start) = content.find(EXAMS_HEADER) {
        for line in content[start + EXAMS_HEADER.len()..].lines() {
            let Some(exam) = exam_from_line(line) else {
                continue;
            };
            if !exames.contains(&exam) {
                exames.push(exam);
            }
        }
    }

    Roster { nome, exames }
}

fn exam_from_line(line: &str) -> Option<String> {
    let clean = line.trim().replace('\t', " ");
    let lower = clean.to_lowercase();
    if clean.is_empty()
        || lower.starts_with("4. exames")
        || lower.starts_with("obrigatório")
        || SKIPPED_PHRASES.iter().any(|phrase| lower.contains(phrase))
    {
        return None;
    }

    // 双语行只取斜杠前的葡萄牙语部分
    let portuguese = clean.split('/').next().unwrap_or_default().trim();
    let starts_with_letter = portuguese.chars().next().is_some_and(char::is_alphabetic);
    starts_with_letter.then(|| collapse_spaces(portuguese))
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ========== 门户自动化 ==========

/// 通过浏览器操作 BRMED 门户
pub struct PortalRosterLookup {
    url: String,
    username: String,
    password: String,
    debug_port: Option<u16>,
    chrome_executable: Option<String>,
    step_timeout: Duration,
    page_timeout: Duration,
    results_dir: PathBuf,
}

impl PortalRosterLookup {
    pub fn new(config: &Config) -> Self {
        Self {
            url: config.brmed_url.clone(),
            username: config.brmed_username.clone(),
            password: config.brmed_password.clone(),
            debug_port: config.browser_debug_port,
            chrome_executable: config.chrome_executable.clone(),
            step_timeout: config.lookup_step_timeout(),
            page_timeout: config.lookup_page_timeout(),
            results_dir: PathBuf::from(&config.lookup_results_dir),
        }
    }

    async fn fetch_page_text(&self, session: &BrowserSession, cpf: &str) -> AppResult<String> {
        let step = self.step_timeout;
        let page = session.browser.new_page("about:blank").await?;
        let executor = JsExecutor::new(page);

        // --- 登录 ---
        debug!("打开门户登录页");
        executor.goto(&self.url, self.page_timeout).await?;
        executor.fill("input[name='username']", &self.username, step).await?;
        executor.fill("input[name='password']", &self.password, step).await?;
        executor.click("button[type='submit']", step).await?;

        // --- 进入 Operações 并选择按 CPF 搜索 ---
        executor.click_text("Operações", step).await?;
        executor.wait_for_load("Operações", step).await?;
        executor.page().reload().await?;
        executor.wait_for_load("recarregar Operações", step).await?;
        executor.click("#radio_cpf", step).await?;
        sleep(Duration::from_secs(1)).await;

        // --- 按 CPF 查询 ---
        debug!("查询 CPF {}", cpf::mask(cpf));
        executor.type_into("input[type='text']", cpf).await?;
        executor.click("input[type='submit'].button-bold", step).await?;
        executor.wait_for_load("consulta por CPF", step).await?;

        executor.click("table.tabledata a[href*='/paciente/']", step).await?;
        executor.click("a.close", step).await?;

        // --- 打开 Guia de Encaminhamento（同页跳转或新标签页）---
        const GUIA: &str = "Guia de Encaminhamento";
        executor
            .wait_until(&format!("document.body.innerText.includes('{}')", GUIA), GUIA, step)
            .await?;

        let href = executor.href_of_text(GUIA).await?;
        let guide = match href {
            Some(href) => {
                executor.goto(&href, self.page_timeout).await?;
                executor
            }
            None => {
                let before: Vec<TargetId> = session
                    .browser
                    .pages()
                    .await?
                    .iter()
                    .map(|p| p.target_id().clone())
                    .collect();
                executor.click_text(GUIA, step).await?;
                JsExecutor::new(self.wait_new_tab(session, &before).await?)
            }
        };

        guide.wait_for_load(GUIA, self.page_timeout).await?;
        guide
            .wait_until(
                &format!("document.body.innerText.includes('{}')", EXAMS_HEADER),
                EXAMS_HEADER,
                self.page_timeout,
            )
            .await?;
        guide.inner_text().await
    }

    async fn wait_new_tab(
        &self,
        session: &BrowserSession,
        before: &[TargetId],
    ) -> AppResult<chromiumoxide::Page> {
        let find = async {
            loop {
                let pages = session.browser.pages().await?;
                if let Some(page) = pages.into_iter().find(|p| !before.contains(p.target_id())) {
                    return Ok::<_, AppError>(page);
                }
                sleep(Duration::from_millis(250)).await;
            }
        };
        timeout(self.page_timeout, find)
            .await
            .map_err(|_| LookupError::Timeout {
                step: "nova aba da guia".to_string(),
                secs: self.page_timeout.as_secs(),
            })?
    }

    /// 保存原始页面文本和解析结果，失败只记录日志
    async fn dump(&self, cpf: &str, content: &str, roster: &Roster) {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let raw_path = self.results_dir.join(format!("debug_conteudo_{}_{}.txt", cpf, timestamp));
        let json_path = self.results_dir.join(format!("guia_{}_{}.json", cpf, timestamp));

        let result = async {
            tokio::fs::create_dir_all(&self.results_dir).await?;
            tokio::fs::write(&raw_path, content).await?;
            let json = serde_json::to_string_pretty(roster).unwrap_or_default();
            tokio::fs::write(&json_path, json).await
        }
        .await;

        match result {
            Ok(()) => debug!("名册已保存: {}", json_path.display()),
            Err(e) => warn!("保存名册页面失败: {}", e),
        }
    }

    async fn try_lookup(&self, cpf: &str) -> AppResult<Roster> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(LookupError::MissingCredentials.into());
        }

        let session =
            BrowserSession::open(self.debug_port, self.chrome_executable.as_deref()).await?;
        let fetched = self.fetch_page_text(&session, cpf).await;
        session.close().await;
        let content = fetched?;

        let roster = parse_roster_page(&content);
        self.dump(cpf, &content, &roster).await;

        if roster.exames.is_empty() {
            return Err(LookupError::EmptyRoster {
                cpf: cpf.to_string(),
            }
            .into());
        }
        Ok(roster)
    }
}

#[async_trait]
impl RosterLookup for PortalRosterLookup {
    async fn lookup(&self, cpf: &str) -> RosterOutcome {
        info!("🌐 查询 BRMED 名册: CPF {}", cpf::mask(cpf));
        match self.try_lookup(cpf).await {
            Ok(roster) => {
                info!("✓ 名册获取成功: {} 个必检项目", roster.exames.len());
                RosterOutcome::Found(roster)
            }
            Err(e) => {
                warn!("名册查询失败 (CPF {}): {}", cpf::mask(cpf), e);
                RosterOutcome::error(format!("Erro na automação: {}", e))
            }
        }
    }
}
