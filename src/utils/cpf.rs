//! CPF 扫描工具
//!
//! 文档中经常同时出现多个 CPF（受检人、医生、负责人），
//! 带 UF 前缀的写法（如 `CE/67495788372`）通常属于受检人，优先级最高。

use std::sync::LazyLock;

use regex::Regex;

/// CPF 位数
pub const CPF_LEN: usize = 11;

static UF_CPF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}/(\d{11})\b").expect("UF/CPF regex"));

static GENERIC_CPF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\d{3}[.\s]?\d{3}[.\s]?\d{3}[-\s]?\d{2}\b").expect("generic CPF regex")
});

/// 只保留数字；不是 11 位则返回 None
pub fn normalize(token: &str) -> Option<String> {
    let digits: String = token.chars().filter(|c| c.is_ascii_digit()).collect();
    (digits.len() == CPF_LEN).then_some(digits)
}

/// 主 CPF：优先 `UF/CPF`，否则取第一个通用格式的 CPF
pub fn find_primary(text: &str) -> Option<String> {
    if let Some(caps) = UF_CPF.captures(text) {
        return Some(caps[1].to_string());
    }
    GENERIC_CPF
        .find_iter(text)
        .find_map(|m| normalize(m.as_str()))
}

/// 按出现顺序列出所有 CPF（`UF/CPF` 在前），去重
pub fn find_all(text: &str) -> Vec<String> {
    let uf = UF_CPF.captures_iter(text).map(|caps| caps[1].to_string());
    let generic = GENERIC_CPF
        .find_iter(text)
        .filter_map(|m| normalize(m.as_str()));

    let mut found: Vec<String> = Vec::new();
    for cpf in uf.chain(generic) {
        if !found.contains(&cpf) {
            found.push(cpf);
        }
    }
    found
}

/// 日志和进度消息中只显示前三位
pub fn mask(cpf: &str) -> String {
    let prefix: String = cpf.chars().take(3).collect();
    format!("{}***", prefix)
}
