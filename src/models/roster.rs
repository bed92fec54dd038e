use serde::Serialize;

/// BRMED 门户返回的必检名册
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Roster {
    pub nome: Option<String>,
    pub exames: Vec<String>,
}

/// 名册查询结果
///
/// 查不到不是异常，而是一个结构化的错误结果，用来驱动 CPF 重试。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RosterOutcome {
    Found(Roster),
    Error { erro: String },
}

impl RosterOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        RosterOutcome::Error {
            erro: message.into(),
        }
    }
}
