//! # 算法选择器模块
//!
//! ## 设计思路
//!
//! 算法集合是封闭的（与远端服务契约一致），使用枚举而非字符串贯穿引擎，
//! 保证路径选择与密钥语义在编译期可判定。字符串解析仅发生在边界处。
//!
//! ## 实现思路
//!
//! - `from_str` 做 trim + 小写归一化，未知值返回带候选列表的校验错误。
//! - `as_str` 输出稳定的线上标识，与远端服务请求体中的 `algorithm` 字段一致。
//! - `runs_locally` / `secret_kind` 承载选择器决定的两项语义差异。

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// 变换算法选择器。
///
/// 线上标识与远端服务契约一致：`aes` / `blowfish` / `lsb` / `chaos` / `hybrid`。
/// 其中 `Lsb` 在本地即可做真逆变换（预览场景），其余算法在配置了远端服务时
/// 走远端路径，否则退化为本地有损模拟。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// 标准分组密码（AES-CBC，远端执行）。
    Aes,
    /// 快速分组密码（Blowfish，远端执行）。
    Blowfish,
    /// 位平面隐写（LSB，本地真逆变换）。
    Lsb,
    /// 混沌映射（逻辑斯蒂映射 XOR，远端执行）。
    Chaos,
    /// 混合方案（AES + 混沌映射，远端执行）。
    Hybrid,
}

/// 第二输入（密钥栏）的语义。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretKind {
    /// 待嵌入的短文本消息（仅 `Lsb`）。
    Message,
    /// 口令（其余所有算法）。
    Passphrase,
}

impl Algorithm {
    /// 从外部字符串解析算法标识。
    ///
    /// # 示例
    /// ```rust
    /// use cipher_studio::Algorithm;
    ///
    /// let algo = Algorithm::from_str("LSB")?;
    /// assert_eq!(algo, Algorithm::Lsb);
    /// # Ok::<(), cipher_studio::EngineError>(())
    /// ```
    pub fn from_str(value: &str) -> Result<Self, EngineError> {
        match value.trim().to_lowercase().as_str() {
            "aes" => Ok(Self::Aes),
            "blowfish" => Ok(Self::Blowfish),
            "lsb" => Ok(Self::Lsb),
            "chaos" => Ok(Self::Chaos),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(EngineError::Validation(format!(
                "未知算法：{}（可选：aes / blowfish / lsb / chaos / hybrid）",
                other
            ))),
        }
    }

    /// 输出稳定的线上标识，供请求体与展示层使用。
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Aes => "aes",
            Self::Blowfish => "blowfish",
            Self::Lsb => "lsb",
            Self::Chaos => "chaos",
            Self::Hybrid => "hybrid",
        }
    }

    /// 该算法是否在本地完整执行（真逆变换预览路径）。
    pub fn runs_locally(self) -> bool {
        matches!(self, Self::Lsb)
    }

    /// 第二输入的语义：`Lsb` 嵌入消息，其余为口令。
    pub fn secret_kind(self) -> SecretKind {
        match self {
            Self::Lsb => SecretKind::Message,
            _ => SecretKind::Passphrase,
        }
    }
}
