//! # 引擎配置模块
//!
//! ## 设计思路
//!
//! 将所有"可调策略"集中到 `EngineConfig`，保证运行时行为可观测、可调整、
//! 可测试。`Default` 提供生产可用的配置；状态机在每次操作开始时取一份
//! 配置快照，单次操作内不受运行时配置漂移影响。
//!
//! ## 实现思路
//!
//! - 上传约束（MIME 白名单 + 体积上限）在引擎入口处执行，校验失败的
//!   输入不会进入变换流水线。
//! - `remote_base_url` 为空时，非 LSB 算法退化为本地有损模拟路径。
//! - `validate` 拒绝语义不自洽的配置组合。

use crate::error::EngineError;

/// 上传体积上限默认值：10 MiB。
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 10 * 1024 * 1024;

/// 允许上传的 MIME 类型（固定三种）。
pub const ALLOWED_MIME_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/bmp"];

/// 引擎配置。
///
/// 字段覆盖上传校验、历史容量与远端服务地址三类策略。
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// 上传文件允许的最大体积（字节）。
    pub max_upload_bytes: u64,
    /// 会话历史容量（最近 N 条）。
    pub history_capacity: usize,
    /// 远端变换服务基地址（如 `http://127.0.0.1:5050`）；
    /// 为空时非 LSB 算法走本地模拟路径。
    pub remote_base_url: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            history_capacity: crate::history::DEFAULT_CAPACITY,
            remote_base_url: None,
        }
    }
}

impl EngineConfig {
    /// 校验配置组合是否自洽。
    pub(crate) fn validate(&self) -> Result<(), EngineError> {
        if self.max_upload_bytes == 0 {
            return Err(EngineError::Validation(
                "max_upload_bytes 不能为 0".to_string(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(EngineError::Validation(
                "history_capacity 不能为 0".to_string(),
            ));
        }
        if let Some(url) = &self.remote_base_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(EngineError::Validation(format!(
                    "remote_base_url 必须以 http:// 或 https:// 开头：{}",
                    url
                )));
            }
        }
        Ok(())
    }
}
