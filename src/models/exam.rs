//! 检查项目与比对结论

use phf::phf_map;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AppResult, InputError};

/// 单个必检项目的比对结论
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VerdictStatus {
    /// 文档中找到了该项目（允许名称差异）
    Found,
    /// 必检项目在文档中缺失
    Missing,
    /// 文档中出现、但不在必检名册中的项目
    Extra,
}

/// 模型返回的状态写法并不统一，这里集中归一
static STATUS_ALIASES: phf::Map<&'static str, VerdictStatus> = phf_map! {
    "encontrado" => VerdictStatus::Found,
    "presente" => VerdictStatus::Found,
    "ok" => VerdictStatus::Found,
    "found" => VerdictStatus::Found,
    "faltante" => VerdictStatus::Missing,
    "faltando" => VerdictStatus::Missing,
    "faltando no ocr" => VerdictStatus::Missing,
    "missing" => VerdictStatus::Missing,
    "extra_no_ocr" => VerdictStatus::Extra,
    "extra no ocr" => VerdictStatus::Extra,
    "extra" => VerdictStatus::Extra,
};

impl VerdictStatus {
    /// 对外输出的规范写法
    pub fn as_str(self) -> &'static str {
        match self {
            VerdictStatus::Found => "encontrado",
            VerdictStatus::Missing => "faltante",
            VerdictStatus::Extra => "extra_no_ocr",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        STATUS_ALIASES
            .get(raw.trim().to_lowercase().as_str())
            .copied()
    }
}

impl Serialize for VerdictStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VerdictStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        VerdictStatus::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("status desconhecido: {}", raw)))
    }
}

/// 比对表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonVerdict {
    pub exame: String,
    pub status: VerdictStatus,
    #[serde(default)]
    pub justificativa: String,
}

impl ComparisonVerdict {
    pub fn new(exame: impl Into<String>, status: VerdictStatus, justificativa: impl Into<String>) -> Self {
        Self {
            exame: exame.into(),
            status,
            justificativa: justificativa.into(),
        }
    }
}

/// 名称比较：忽略首尾空白和大小写（含重音字母）
pub fn same_exam_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// 校验调用方传入的必检项目列表：去掉首尾空白，拒绝空名称
pub fn validate_required_exams(exams: &[String]) -> AppResult<Vec<String>> {
    exams
        .iter()
        .enumerate()
        .map(|(index, exam)| {
            let trimmed = exam.trim();
            if trimmed.is_empty() {
                Err(InputError::BlankExamName { index }.into())
            } else {
                Ok(trimmed.to_string())
            }
        })
        .collect()
}

/// 解析以 JSON 字符串形式传入的必检项目数组
pub fn parse_required_exams(json: &str) -> AppResult<Vec<String>> {
    let exams: Vec<String> = serde_json::from_str(json).map_err(InputError::InvalidJson)?;
    validate_required_exams(&exams)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_aliases_are_normalized() {
        assert_eq!(VerdictStatus::parse("Encontrado"), Some(VerdictStatus::Found));
        assert_eq!(VerdictStatus::parse(" missing "), Some(VerdictStatus::Missing));
        assert_eq!(VerdictStatus::parse("Faltando no OCR"), Some(VerdictStatus::Missing));
        assert_eq!(VerdictStatus::parse("extra_no_ocr"), Some(VerdictStatus::Extra));
        assert_eq!(VerdictStatus::parse("talvez"), None);
    }

    #[test]
    fn test_verdict_serializes_canonical_status() {
        let verdict = ComparisonVerdict::new("AUDIOMETRIA", VerdictStatus::Missing, "não recebido");
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "faltante");
    }

    #[test]
    fn test_verdict_without_justification_defaults_to_empty() {
        let verdict: ComparisonVerdict =
            serde_json::from_str(r#"{"exame": "GLICOSE", "status": "found"}"#).unwrap();
        assert_eq!(verdict.status, VerdictStatus::Found);
        assert!(verdict.justificativa.is_empty());
    }

    #[test]
    fn test_same_exam_name_handles_accents() {
        assert!(same_exam_name("RAIO-X DE TÓRAX ", "raio-x de tórax"));
        assert!(!same_exam_name("GLICOSE", "GLICEMIA"));
    }

    #[test]
    fn test_parse_required_exams() {
        let exams = parse_required_exams(r#"[" HEMOGRAMA ", "GLICOSE"]"#).unwrap();
        assert_eq!(exams, vec!["HEMOGRAMA", "GLICOSE"]);

        assert!(parse_required_exams(r#"{"exames": []}"#).is_err());
        assert!(parse_required_exams(r#"["GLICOSE", "  "]"#).is_err());
        assert!(parse_required_exams("[]").unwrap().is_empty());
    }
}
