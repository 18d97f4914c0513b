//! # 远端变换客户端模块
//!
//! ## 设计思路
//!
//! 远端服务是协作方而非本仓库的一部分：本模块只实现其线上契约——
//! 把位图/负载编码为免前缀 Base64，以结构化请求体提交到固定端点
//! （`/encrypt`、`/decrypt`），再解码结构化响应。对输入是纯函数，
//! 不触碰任何共享状态。
//!
//! ## 实现思路
//!
//! - 复用型 `reqwest::Client` 在构造时建好，减少每次请求的初始化开销。
//! - 响应体先读为文本再用 `serde_json` 解析：畸形 body 也能给出可展示
//!   的错误消息，而不是底层解码 panic 路径。
//! - 任何非成功形态（`error` 字段、非 2xx 状态、传输失败、空响应）都
//!   统一映射为可恢复的 `EngineError::Remote`，绝不让工作流崩溃。
//! - 结果图既可能内联返回（Base64），也可能只给一个可取回的文件 URL，
//!   `fetch_artifact` 负责后者。

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithm::Algorithm;
use crate::error::EngineError;

/// 默认请求超时（秒）。
const REQUEST_TIMEOUT_SECS: u64 = 30;
/// 默认连接超时（秒）。
const CONNECT_TIMEOUT_SECS: u64 = 8;

/// `/encrypt` 请求体。
#[derive(Debug, Serialize)]
struct EncryptRequest<'a> {
    /// 免前缀 Base64 像素负载。
    image: &'a str,
    key: &'a str,
    algorithm: &'a str,
}

/// `/encrypt` 响应体。
#[derive(Debug, Clone, Deserialize)]
pub struct EncryptResponse {
    /// 内联返回的加密结果（Base64）。
    pub encrypted_image: Option<String>,
    /// 可取回的结果文件路径（相对服务根）。
    pub encrypted_file_url: Option<String>,
    /// 服务端落盘文件名。
    pub encrypted_filename: Option<String>,
    /// 领域错误消息；存在即视为操作失败。
    pub error: Option<String>,
}

/// `/decrypt` 请求体。
#[derive(Debug, Serialize)]
struct DecryptRequest<'a> {
    encrypted_image: &'a str,
    key: &'a str,
    algorithm: &'a str,
}

/// `/decrypt` 响应体。
///
/// `decrypted_message` 仅在算法为 `lsb` 时取代图像出现。
#[derive(Debug, Clone, Deserialize)]
pub struct DecryptResponse {
    pub decrypted_image: Option<String>,
    pub decrypted_file_url: Option<String>,
    pub decrypted_filename: Option<String>,
    pub decrypted_message: Option<String>,
    pub error: Option<String>,
}

/// 远端变换服务客户端。
///
/// # 示例
/// ```rust,no_run
/// use cipher_studio::RemoteClient;
///
/// let client = RemoteClient::new("http://127.0.0.1:5050")?;
/// # Ok::<(), cipher_studio::EngineError>(())
/// ```
#[derive(Debug, Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    /// 创建客户端，`base_url` 形如 `http://host:port`（不带尾斜杠）。
    pub fn new(base_url: impl Into<String>) -> Result<Self, EngineError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| EngineError::Remote(format!("HTTP 客户端初始化失败：{}", e)))?;

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Ok(Self { http, base_url })
    }

    /// 提交正向变换请求。
    ///
    /// `image_b64` 必须是免前缀 Base64（调用方的前缀剥离见 `bitmap::strip_data_url_prefix`）。
    pub async fn forward(
        &self,
        image_b64: &str,
        key: &str,
        algorithm: Algorithm,
    ) -> Result<EncryptResponse, EngineError> {
        let url = format!("{}/encrypt", self.base_url);
        log::info!("🌐 提交正向变换请求 - 算法: {}", algorithm.as_str());

        let body = EncryptRequest {
            image: image_b64,
            key,
            algorithm: algorithm.as_str(),
        };

        let response: EncryptResponse = self.post_json(&url, &body).await?;

        if let Some(message) = response.error {
            return Err(EngineError::Remote(message));
        }
        if response.encrypted_image.is_none() && response.encrypted_file_url.is_none() {
            return Err(EngineError::Remote(
                "响应既无内联结果也无文件地址".to_string(),
            ));
        }

        Ok(response)
    }

    /// 提交逆向变换请求。
    pub async fn reverse(
        &self,
        payload_b64: &str,
        key: &str,
        algorithm: Algorithm,
    ) -> Result<DecryptResponse, EngineError> {
        let url = format!("{}/decrypt", self.base_url);
        log::info!("🌐 提交逆向变换请求 - 算法: {}", algorithm.as_str());

        let body = DecryptRequest {
            encrypted_image: payload_b64,
            key,
            algorithm: algorithm.as_str(),
        };

        let response: DecryptResponse = self.post_json(&url, &body).await?;

        if let Some(message) = response.error {
            return Err(EngineError::Remote(message));
        }
        if response.decrypted_image.is_none()
            && response.decrypted_file_url.is_none()
            && response.decrypted_message.is_none()
        {
            return Err(EngineError::Remote("响应不包含任何结果字段".to_string()));
        }

        Ok(response)
    }

    /// 按响应中的文件路径取回结果字节。
    pub async fn fetch_artifact(&self, file_url: &str) -> Result<Vec<u8>, EngineError> {
        let url = if file_url.starts_with("http://") || file_url.starts_with("https://") {
            file_url.to_string()
        } else {
            format!("{}/{}", self.base_url, file_url.trim_start_matches('/'))
        };

        log::info!("📦 取回结果文件 - {}", url);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Remote(format!("结果文件取回失败：{}", e)))?;

        if !response.status().is_success() {
            return Err(EngineError::Remote(format!(
                "结果文件取回返回非成功状态：{}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| EngineError::Remote(format!("结果文件读取失败：{}", e)))?;

        Ok(bytes.to_vec())
    }

    /// POST JSON 并解析响应体。
    ///
    /// 传输失败、非 2xx 状态、畸形 body 都映射为 `Remote` 错误。
    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R, EngineError>
    where
        B: Serialize,
        R: for<'de> Deserialize<'de>,
    {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| EngineError::Remote(format!("服务不可达：{}", e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| EngineError::Remote(format!("响应读取失败：{}", e)))?;

        // 服务端失败时 body 里通常带 error 字段，优先透出领域消息
        match serde_json::from_str::<R>(&text) {
            Ok(parsed) => Ok(parsed),
            Err(parse_err) => {
                if !status.is_success() {
                    Err(EngineError::Remote(format!("服务返回 {}：{}", status, text)))
                } else {
                    Err(EngineError::Remote(format!("响应格式异常：{}", parse_err)))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_normalized() {
        let client = RemoteClient::new("http://localhost:5050///").unwrap();
        assert_eq!(client.base_url, "http://localhost:5050");
    }

    #[test]
    fn encrypt_response_parses_backend_shape() {
        let json = r#"{
            "encrypted_image": "QUJD",
            "encrypted_file_url": "/download/encrypted/encrypted_20250101000000.png",
            "encrypted_filename": "encrypted_20250101000000.png"
        }"#;

        let parsed: EncryptResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.encrypted_image.as_deref(), Some("QUJD"));
        assert!(parsed.error.is_none());
    }

    #[test]
    fn decrypt_response_parses_message_only_shape() {
        let json = r#"{"decrypted_message": "hello"}"#;
        let parsed: DecryptResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.decrypted_message.as_deref(), Some("hello"));
        assert!(parsed.decrypted_image.is_none());
    }

    #[test]
    fn error_field_parses_alongside_missing_results() {
        let json = r#"{"error": "Missing data"}"#;
        let parsed: EncryptResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.error.as_deref(), Some("Missing data"));
    }

    #[tokio::test]
    async fn unreachable_service_maps_to_remote_error() {
        // 保留地址段，连接必然失败
        let client = RemoteClient::new("http://127.0.0.1:1").unwrap();
        let result = client.forward("QUJD", "key", Algorithm::Aes).await;
        assert!(matches!(result, Err(EngineError::Remote(_))));
    }
}
