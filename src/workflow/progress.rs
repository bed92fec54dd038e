//! 进度上报
//!
//! 进度写入一个 channel，传输方式（轮询或推送）由调用方决定。
//! 上报永远不会让工作流失败：接收端关闭后的发送错误直接忽略。

use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::models::{ProgressEvent, ProgressStep, WorkflowEvent};

pub struct ProgressReporter {
    label: String,
    sender: Option<UnboundedSender<WorkflowEvent>>,
    last: i32,
    terminal: Option<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new(label: impl Into<String>, sender: UnboundedSender<WorkflowEvent>) -> Self {
        Self {
            label: label.into(),
            sender: Some(sender),
            last: 0,
            terminal: None,
        }
    }

    /// 只记录日志
    pub fn silent(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sender: None,
            last: 0,
            terminal: None,
        }
    }

    /// 中间进度；数值不会回退
    pub fn report(&mut self, progress: i32, step: ProgressStep, message: impl Into<String>) {
        let progress = progress.clamp(0, 99).max(self.last);
        self.last = progress;
        let event = ProgressEvent::new(progress, step, message);
        info!(
            "[{}] 📈 {}% - {}: {}",
            self.label,
            event.progress,
            event.step.as_str(),
            event.message
        );
        if let Some(sender) = &self.sender {
            let _ = sender.send(WorkflowEvent::Progress(event));
        }
    }

    /// 正常结束（100）
    pub fn complete(&mut self, message: impl Into<String>) {
        let event = ProgressEvent::new(100, ProgressStep::Concluido, message);
        info!("[{}] ✅ 100% - {}", self.label, event.message);
        self.last = 100;
        self.terminal = Some(event);
    }

    /// 失败结束（-1）
    pub fn fail(&mut self, message: impl Into<String>) {
        let event = ProgressEvent::new(-1, ProgressStep::Erro, message);
        warn!("[{}] ❌ -1 - {}", self.label, event.message);
        self.terminal = Some(event);
    }

    /// 取出结束事件，交给流式调用方附带结果一起发送
    pub fn take_terminal(&mut self) -> Option<ProgressEvent> {
        self.terminal.take()
    }

    pub fn last_progress(&self) -> i32 {
        self.last
    }
}
