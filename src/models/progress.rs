use serde::Serialize;

use super::decision::WorkflowResponse;

/// 进度所处阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStep {
    Ocr,
    Brmed,
    Validacao,
    Concluido,
    Erro,
}

impl ProgressStep {
    pub fn as_str(self) -> &'static str {
        match self {
            ProgressStep::Ocr => "ocr",
            ProgressStep::Brmed => "brmed",
            ProgressStep::Validacao => "validacao",
            ProgressStep::Concluido => "concluido",
            ProgressStep::Erro => "erro",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    /// 0..=100，致命路径为 -1
    pub progress: i32,
    pub step: ProgressStep,
    pub message: String,
}

impl ProgressEvent {
    pub fn new(progress: i32, step: ProgressStep, message: impl Into<String>) -> Self {
        Self {
            progress,
            step,
            message: message.into(),
        }
    }
}

/// 流式运行时发给调用方的事件
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum WorkflowEvent {
    Progress(ProgressEvent),
    /// 运行结束，携带决策记录
    Result {
        #[serde(flatten)]
        event: ProgressEvent,
        resultado: WorkflowResponse,
    },
    /// 致命错误，没有决策记录
    Error(ProgressEvent),
}

impl WorkflowEvent {
    pub fn progress(&self) -> i32 {
        match self {
            WorkflowEvent::Progress(event) | WorkflowEvent::Error(event) => event.progress,
            WorkflowEvent::Result { event, .. } => event.progress,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, WorkflowEvent::Progress(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_event_wire_shape() {
        let event = WorkflowEvent::Progress(ProgressEvent::new(40, ProgressStep::Brmed, "Consultando"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["progress"], 40);
        assert_eq!(json["step"], "brmed");
        assert_eq!(json["message"], "Consultando");
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_error_event_is_terminal() {
        let event = WorkflowEvent::Error(ProgressEvent::new(-1, ProgressStep::Erro, "falhou"));
        assert!(event.is_terminal());
        assert_eq!(event.progress(), -1);
    }
}
