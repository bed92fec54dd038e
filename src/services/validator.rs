//! 放行校验 - 业务能力层
//!
//! 比对 + 推导放行结论 + 写审计。比对失败不会抛出，而是体现在结果的 `erro` 中。

use std::sync::Arc;

use tracing::{error, warn};

use crate::models::ValidationResult;
use crate::services::audit_writer::{AuditRecord, AuditWriter};
use crate::services::reconciliation::ReconciliationEngine;

pub struct Validator {
    engine: Arc<ReconciliationEngine>,
    audit: AuditWriter,
}

impl Validator {
    pub fn new(engine: Arc<ReconciliationEngine>, audit: AuditWriter) -> Self {
        Self { engine, audit }
    }

    /// `exames_brnet` 是门户名册（比对依据），`exames_obrigatorios` 是调用方
    /// 提供的列表，只写入审计
    pub async fn validate(
        &self,
        cpf: &str,
        exames_obrigatorios: &[String],
        exames_enviados: &[String],
        exames_brnet: &[String],
    ) -> ValidationResult {
        let verdicts = match self.engine.reconcile(exames_enviados, exames_brnet).await {
            Ok(verdicts) => verdicts,
            Err(e) => {
                error!("❌ 比对失败: {}", e);
                return ValidationResult::failed(e.to_string());
            }
        };

        let record = AuditRecord {
            cpf,
            exames_obrigatorios,
            exames_brnet,
            exames_enviados,
            resultado: &verdicts,
        };
        let auditoria_salva_em = match self.audit.write(&record).await {
            Ok(path) => path,
            Err(e) => {
                warn!("⚠️ 审计记录写入失败: {}", e);
                String::new()
            }
        };

        let mut result = ValidationResult::from_verdicts(verdicts, exames_brnet);
        result.auditoria_salva_em = auditoria_salva_em;
        result
    }
}
