//! # 工作流状态与中间模型
//!
//! ## 设计思路
//!
//! 将"对外呈现的状态快照"和"流水线中间产物"集中在一处：
//! - `WorkflowState` 表示状态机所处阶段
//! - `ForwardArtifact` 表示正向变换产物（规范负载 + 可选预览）
//! - `ReverseOutput` 表示逆向变换产物（图像或恢复的消息）
//! - `WorkflowSnapshot` 是展示层渲染的唯一事实来源
//!
//! 快照只由状态机整体重建，对外永远是克隆出的副本，外部不做逐字段修补。

use std::sync::Arc;

use serde::ser::{SerializeStruct, SerializeStructVariant};
use serde::{Serialize, Serializer};

use crate::algorithm::Algorithm;
use crate::bitmap::Bitmap;
use crate::metrics::Metrics;

/// 工作流状态机的阶段。
///
/// `idle → ready → forward-in-progress → forward-done
///  → reverse-in-progress → reverse-done`，`reset` 从任何阶段无条件回到 `idle`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum WorkflowState {
    /// 无源图。
    Idle,
    /// 源图已加载，尚无正向结果。
    Ready,
    /// 正向变换进行中。
    ForwardInProgress,
    /// 正向结果存在，尚无逆向结果。
    ForwardDone,
    /// 逆向变换进行中。
    ReverseInProgress,
    /// 逆向结果存在。
    ReverseDone,
}

/// 正向变换产物。
///
/// `raw` 是规范负载——逆向请求必须原样提交的字节（AES 等算法的密文
/// 不是可解码图像，所以负载与预览分离）。`image` 是负载可解码时的
/// 预览位图（LSB 隐写 PNG 可解码，密文 blob 不行）。
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardArtifact {
    /// 规范负载字节，逆向变换的输入。
    pub raw: Arc<Vec<u8>>,
    /// 可解码时的预览位图。
    pub image: Option<Arc<Bitmap>>,
    /// 远端返回的可取回文件路径。
    pub file_url: Option<String>,
    /// 远端落盘文件名。
    pub filename: Option<String>,
}

impl Serialize for ForwardArtifact {
    /// 序列化为摘要：像素负载不走序列化边界，展示层按引用取用。
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ForwardArtifact", 4)?;
        state.serialize_field("payload_bytes", &self.raw.len())?;
        state.serialize_field("has_preview", &self.image.is_some())?;
        state.serialize_field("file_url", &self.file_url)?;
        state.serialize_field("filename", &self.filename)?;
        state.end()
    }
}

/// 逆向变换产物：图像，或（仅 LSB）恢复出的文本消息。
#[derive(Debug, Clone, PartialEq)]
pub enum ReverseOutput {
    Image(Arc<Bitmap>),
    Message(String),
}

impl Serialize for ReverseOutput {
    /// 图像同样只序列化摘要（尺寸），消息原样输出。
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Self::Image(bitmap) => {
                let mut state =
                    serializer.serialize_struct_variant("ReverseOutput", 0, "image", 2)?;
                state.serialize_field("width", &bitmap.width())?;
                state.serialize_field("height", &bitmap.height())?;
                state.end()
            }
            Self::Message(message) => {
                let mut state =
                    serializer.serialize_struct_variant("ReverseOutput", 1, "message", 1)?;
                state.serialize_field("text", message)?;
                state.end()
            }
        }
    }
}

/// 工作流快照——展示层渲染的唯一事实来源。
///
/// 由状态机整体重建；`Default` 即初始 `idle` 快照，`reset` 后与之相等。
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowSnapshot {
    /// 当前阶段。
    pub state: WorkflowState,
    /// 源位图引用；保留到 `reset` 为止，正向变换不清除。
    pub source: Option<Arc<Bitmap>>,
    /// 源文件名（展示用）。
    pub source_name: Option<String>,
    /// 当前操作/记录使用的算法。
    pub algorithm: Option<Algorithm>,
    /// 当前正向结果引用。
    pub forward: Option<ForwardArtifact>,
    /// 当前逆向结果引用。
    pub reverse: Option<ReverseOutput>,
    /// 当前指标。
    pub metrics: Option<Metrics>,
    /// 是否有操作在途。
    pub in_progress: bool,
    /// 进度百分比 [0, 100]，单次操作内单调不减。
    pub progress: u8,
    /// 最近一次错误/提示消息。
    pub message: Option<String>,
    /// 本会话是否完成过正向变换。
    pub has_completed_forward: bool,
}

impl Default for WorkflowSnapshot {
    fn default() -> Self {
        Self {
            state: WorkflowState::Idle,
            source: None,
            source_name: None,
            algorithm: None,
            forward: None,
            reverse: None,
            metrics: None,
            in_progress: false,
            progress: 0,
            message: None,
            has_completed_forward: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_snapshot_is_idle_and_empty() {
        let snapshot = WorkflowSnapshot::default();
        assert_eq!(snapshot.state, WorkflowState::Idle);
        assert!(snapshot.source.is_none());
        assert!(snapshot.forward.is_none());
        assert!(snapshot.reverse.is_none());
        assert!(snapshot.metrics.is_none());
        assert!(snapshot.message.is_none());
        assert!(!snapshot.in_progress);
        assert!(!snapshot.has_completed_forward);
        assert_eq!(snapshot.progress, 0);
    }

    #[test]
    fn state_serializes_kebab_case() {
        let json = serde_json::to_string(&WorkflowState::ForwardInProgress).unwrap();
        assert_eq!(json, "\"forward-in-progress\"");
    }

    #[test]
    fn artifact_serializes_as_summary() {
        let artifact = ForwardArtifact {
            raw: Arc::new(vec![0u8; 128]),
            image: None,
            file_url: Some("/download/encrypted/a.png".into()),
            filename: Some("a.png".into()),
        };
        let json = serde_json::to_value(&artifact).unwrap();
        assert_eq!(json["payload_bytes"], 128);
        assert_eq!(json["has_preview"], false);
        assert_eq!(json["filename"], "a.png");
    }

    #[test]
    fn reverse_message_serializes_text() {
        let output = ReverseOutput::Message("hello".into());
        let json = serde_json::to_value(&output).unwrap();
        assert_eq!(json["message"]["text"], "hello");
    }
}
