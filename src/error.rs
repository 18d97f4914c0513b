//! # 统一错误类型模块
//!
//! ## 设计思路
//!
//! 定义全局统一的 `EngineError` 枚举，替代各模块中分散的
//! `.map_err(|e| e.to_string())`、`format!(...)` 等不一致模式。
//! 引擎的所有公开操作统一返回 `Result<T, EngineError>`，
//! 展示层通过 `Serialize` 获得结构化的错误信息。
//!
//! ## 实现思路
//!
//! - 使用 `thiserror` 派生可读错误消息。
//! - `code()` / `stage()` 提供稳定的机器可读标识，便于展示层分类提示。
//! - 实现 `Serialize` 将错误序列化为字符串，保持边界格式简单。

use serde::{Serialize, Serializer};

/// 引擎统一错误类型。
///
/// 错误分类与恢复语义：
///
/// | 变体 | 语义 | 恢复方式 |
/// |------|------|----------|
/// | `Validation` | 输入校验失败（类型/体积/空密钥/容量） | 用户修正后重试 |
/// | `Precondition` | 前置条件不满足（操作进行中/缺少正向结果） | 等待或先执行正向变换 |
/// | `Decode` | 本地解码或像素处理失败 | 操作中止，回到上一个稳定状态 |
/// | `Remote` | 远端服务结构化错误或传输失败 | 操作中止，回到上一个稳定状态 |
/// | `Internal` | 内部异常（锁中毒等），正常情况下不应出现 | 重置会话 |
///
/// 任何变体都不会导致进程崩溃：失败只会把工作流带回最近的稳定状态，
/// 并在快照上附带可展示的错误消息。
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("输入校验失败：{0}")]
    Validation(String),

    #[error("前置条件不满足：{0}")]
    Precondition(String),

    #[error("解码错误：{0}")]
    Decode(String),

    #[error("远端服务错误：{0}")]
    Remote(String),

    #[error("内部错误：{0}")]
    Internal(String),
}

impl EngineError {
    /// 稳定的机器可读错误码，供展示层分类处理。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::Precondition(_) => "E_PRECONDITION",
            Self::Decode(_) => "E_DECODE",
            Self::Remote(_) => "E_REMOTE",
            Self::Internal(_) => "E_INTERNAL",
        }
    }

    /// 错误发生阶段的粗粒度标识（用于日志与进度上报）。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Validation(_) | Self::Precondition(_) => "validate",
            Self::Decode(_) => "transform",
            Self::Remote(_) => "remote",
            Self::Internal(_) => "internal",
        }
    }
}

impl Serialize for EngineError {
    /// 序列化为展示消息字符串，保持边界负载格式简单。
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl From<EngineError> for String {
    /// 兼容仍使用字符串错误的调用点。
    fn from(error: EngineError) -> Self {
        error.to_string()
    }
}
