//! # 工作流状态机（核心编排模块）
//!
//! ## 设计思路
//!
//! `WorkflowEngine` 是唯一有权修改会话状态（快照 + 历史）的组件。
//! 变换流水线与远端客户端对输入是纯函数，只通过返回值和进度回调
//! 与状态机通信，绝不直接触碰共享状态——避免被取代的旧操作的迟到
//! 回调与当前状态竞争。
//!
//! 处理链路固定为：
//! 1. 同步校验前置条件（在途检查 / 源图 / 非空第二输入）
//! 2. 标记新一代操作（generation 自增），快照进入 in-progress
//! 3. 驱动本地分批变换或远端调用
//! 4. 完成回调按 generation 判重：过期操作的效果被静默丢弃
//!
//! ## 实现思路
//!
//! - 会话状态置于单把 `Mutex` 之后，锁绝不跨 await 持有。
//! - `AtomicU64` 代数计数器实现无取消原语的失效语义：`reset` 自增
//!   代数，在途操作的 chunk/网络延续在落盘前发现代数不符即放弃。
//! - 配置经 `RwLock` 支持运行时调整，单次操作使用同一配置快照。
//! - 记录各阶段耗时（变换 / 总计），便于性能诊断。
//!
//! ## 路径选择
//!
//! | 算法 | 正向 | 逆向 |
//! |------|------|------|
//! | `lsb` | 本地真嵌入 | 本地真提取（恢复消息） |
//! | 其余（配置了远端） | `/encrypt` | `/decrypt` |
//! | 其余（未配置远端） | 本地有界扰动（有损模拟） | 重新发布保留的源图 |
//!
//! 源图引用始终保留到 `reset` 为止：正向变换不清除它，未配置远端时的
//! 模拟逆向直接重新发布该引用。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

use base64::{engine::general_purpose, Engine as _};

use crate::algorithm::{Algorithm, SecretKind};
use crate::bitmap::{self, Bitmap};
use crate::engine::config::EngineConfig;
use crate::engine::snapshot::{ForwardArtifact, ReverseOutput, WorkflowSnapshot, WorkflowState};
use crate::engine::upload;
use crate::error::EngineError;
use crate::history::{OperationRecord, SessionHistory};
use crate::metrics::estimate;
use crate::remote::RemoteClient;
use crate::transform;

/// 单把锁保护的会话状态：快照与历史总是一起变更。
struct SessionState {
    snapshot: WorkflowSnapshot,
    history: SessionHistory,
}

/// 工作流引擎。
///
/// 接收五种意图（上传 / 正向 / 逆向 / 选择历史 / 重置），对外暴露
/// 可克隆的 `WorkflowSnapshot` 供展示层渲染。
///
/// # 示例
/// ```rust,no_run
/// use cipher_studio::{Algorithm, WorkflowEngine};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let engine = WorkflowEngine::new()?;
/// engine.upload("photo.png", &std::fs::read("photo.png")?)?;
/// engine.run_forward(Algorithm::Lsb, "hidden message").await?;
/// engine.run_reverse("hidden message").await?;
/// # Ok(())
/// # }
/// ```
pub struct WorkflowEngine {
    session: Mutex<SessionState>,
    config: RwLock<EngineConfig>,
    remote: RwLock<Option<RemoteClient>>,
    generation: AtomicU64,
}

impl WorkflowEngine {
    /// 使用默认配置创建引擎。
    pub fn new() -> Result<Self, EngineError> {
        Self::with_config(EngineConfig::default())
    }

    /// 使用自定义配置创建引擎，主要用于测试或按场景注入不同策略。
    pub fn with_config(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;

        let remote = match &config.remote_base_url {
            Some(base_url) => Some(RemoteClient::new(base_url.clone())?),
            None => None,
        };

        let history = SessionHistory::with_capacity(config.history_capacity);

        Ok(Self {
            session: Mutex::new(SessionState {
                snapshot: WorkflowSnapshot::default(),
                history,
            }),
            config: RwLock::new(config),
            remote: RwLock::new(remote),
            generation: AtomicU64::new(0),
        })
    }

    /// 获取当前快照的克隆副本。
    pub fn snapshot(&self) -> Result<WorkflowSnapshot, EngineError> {
        Ok(self.lock_session()?.snapshot.clone())
    }

    /// 按最新在前的顺序返回历史记录。
    pub fn history(&self) -> Result<Vec<OperationRecord>, EngineError> {
        Ok(self.lock_session()?.history.list())
    }

    /// 运行时设置（或清除）远端服务地址。
    pub fn set_remote_base_url(&self, base_url: Option<String>) -> Result<(), EngineError> {
        let client = match &base_url {
            Some(url) => Some(RemoteClient::new(url.clone())?),
            None => None,
        };

        {
            let mut config = self
                .config
                .write()
                .map_err(|_| EngineError::Internal("配置写入锁已中毒".to_string()))?;
            config.remote_base_url = base_url;
            config.validate()?;
        }

        let mut remote = self
            .remote
            .write()
            .map_err(|_| EngineError::Internal("远端客户端锁已中毒".to_string()))?;
        *remote = client;

        Ok(())
    }

    /// 意图：上传源图片。
    ///
    /// 校验（体积 → MIME 嗅探 → 解码）失败的输入不会进入引擎状态。
    /// 成功后清除上一轮派生数据、保留历史，状态进入 `ready`。
    pub fn upload(&self, file_name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        let config = self.config_snapshot()?;
        let decoded = upload::validate_and_decode(file_name, bytes, &config)?;

        let mut session = self.lock_session()?;
        if session.snapshot.in_progress {
            return Err(EngineError::Precondition(
                "操作进行中，无法更换源图".to_string(),
            ));
        }

        session.snapshot.source = Some(Arc::new(decoded));
        session.snapshot.source_name = Some(file_name.to_string());
        session.snapshot.algorithm = None;
        session.snapshot.forward = None;
        session.snapshot.reverse = None;
        session.snapshot.metrics = None;
        session.snapshot.message = None;
        session.snapshot.progress = 0;
        session.snapshot.has_completed_forward = false;
        session.snapshot.state = WorkflowState::Ready;

        Ok(())
    }

    /// 意图：执行正向变换。
    ///
    /// 前置条件（同步校验，不满足时快照不变）：无操作在途、源图存在、
    /// 第二输入非空（`lsb` 为消息，其余为口令；校验失败不会发起网络调用）。
    pub async fn run_forward(&self, algorithm: Algorithm, secret: &str) -> Result<(), EngineError> {
        let (source, generation) = self.begin_forward(algorithm, secret)?;

        let started = Instant::now();
        let result = self.execute_forward(&source, algorithm, secret, generation).await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.finish_forward(algorithm, generation, elapsed_ms, result)
    }

    /// 意图：执行逆向变换。
    ///
    /// 前置条件：无操作在途、正向结果存在（否则前置条件错误且快照不变）、
    /// 第二输入非空。
    pub async fn run_reverse(&self, secret: &str) -> Result<(), EngineError> {
        let (forward, algorithm, source, generation) = self.begin_reverse(secret)?;

        let started = Instant::now();
        let result = self
            .execute_reverse(&forward, algorithm, source, secret, generation)
            .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        self.finish_reverse(&forward, algorithm, generation, elapsed_ms, result)
    }

    /// 意图：从历史记录回放一次已完成操作。
    ///
    /// 侧向入口：用存量记录覆盖快照的正向/逆向/指标/算法字段，不重新
    /// 执行任何变换；按记录内容直接进入 `forward-done` 或 `reverse-done`。
    pub fn select_history_item(&self, id: i64) -> Result<(), EngineError> {
        let mut session = self.lock_session()?;
        if session.snapshot.in_progress {
            return Err(EngineError::Precondition(
                "操作进行中，无法回放历史记录".to_string(),
            ));
        }

        let record = session
            .history
            .select(id)
            .ok_or_else(|| EngineError::Validation(format!("未找到历史记录：{}", id)))?;

        session.snapshot.state = if record.reverse.is_some() {
            WorkflowState::ReverseDone
        } else {
            WorkflowState::ForwardDone
        };
        session.snapshot.source_name = Some(record.source_name);
        session.snapshot.algorithm = Some(record.algorithm);
        session.snapshot.forward = Some(record.forward);
        session.snapshot.reverse = record.reverse;
        session.snapshot.metrics = Some(record.metrics);
        session.snapshot.message = None;
        session.snapshot.progress = 100;
        session.snapshot.has_completed_forward = true;

        log::info!("🔁 已回放历史记录 - id: {}", record.id);
        Ok(())
    }

    /// 意图：无条件重置回初始 `idle` 快照。
    ///
    /// 代数自增使任何在途操作失效：迟到的 chunk/网络延续在落盘前发现
    /// 代数不符即放弃，不会把结果或错误写进新会话。历史是会话级的，
    /// 重置后保留。
    pub fn reset(&self) -> Result<(), EngineError> {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let mut session = self.lock_session()?;
        session.snapshot = WorkflowSnapshot::default();

        log::info!("🔄 会话已重置");
        Ok(())
    }

    // ─── 内部：正向变换 ───

    fn begin_forward(
        &self,
        algorithm: Algorithm,
        secret: &str,
    ) -> Result<(Arc<Bitmap>, u64), EngineError> {
        let mut session = self.lock_session()?;

        if session.snapshot.in_progress {
            return Err(EngineError::Precondition(
                "已有操作在途，请等待其完成".to_string(),
            ));
        }
        let source = session
            .snapshot
            .source
            .clone()
            .ok_or_else(|| EngineError::Validation("请先上传源图片".to_string()))?;
        Self::require_secret(algorithm, secret)?;

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        session.snapshot.in_progress = true;
        session.snapshot.progress = 0;
        session.snapshot.message = None;
        session.snapshot.algorithm = Some(algorithm);
        session.snapshot.state = WorkflowState::ForwardInProgress;

        Ok((source, generation))
    }

    async fn execute_forward(
        &self,
        source: &Bitmap,
        algorithm: Algorithm,
        secret: &str,
        generation: u64,
    ) -> Result<ForwardArtifact, EngineError> {
        let on_progress = self.progress_sink(generation);

        if algorithm.runs_locally() {
            let stego = transform::lsb_embed(source, secret, &on_progress).await?;
            let raw = stego.encode_png()?;
            return Ok(ForwardArtifact {
                raw: Arc::new(raw),
                image: Some(Arc::new(stego)),
                file_url: None,
                filename: None,
            });
        }

        if let Some(remote) = self.remote_snapshot()? {
            let payload = source.encode_png_base64()?;
            let response = remote.forward(&payload, secret, algorithm).await?;

            let raw = match &response.encrypted_image {
                Some(inline) => bitmap::parse_base64(inline)?,
                None => {
                    let url = response.encrypted_file_url.as_deref().ok_or_else(|| {
                        EngineError::Remote("响应既无内联结果也无文件地址".to_string())
                    })?;
                    remote.fetch_artifact(url).await?
                }
            };

            // 密文 blob 不一定是可解码图像（AES 等），预览尽力而为
            let image = Bitmap::decode(&raw).ok().map(Arc::new);
            return Ok(ForwardArtifact {
                raw: Arc::new(raw),
                image,
                file_url: response.encrypted_file_url,
                filename: response.encrypted_filename,
            });
        }

        log::info!(
            "🎭 未配置远端服务，算法 {} 使用本地有损模拟",
            algorithm.as_str()
        );
        let simulated = transform::perturb(source, secret, &on_progress).await?;
        let raw = simulated.encode_png()?;
        Ok(ForwardArtifact {
            raw: Arc::new(raw),
            image: Some(Arc::new(simulated)),
            file_url: None,
            filename: None,
        })
    }

    fn finish_forward(
        &self,
        algorithm: Algorithm,
        generation: u64,
        elapsed_ms: u64,
        result: Result<ForwardArtifact, EngineError>,
    ) -> Result<(), EngineError> {
        let mut session = self.lock_session()?;

        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("⏭️ 丢弃过期正向操作的完成回调 - generation: {}", generation);
            return Ok(());
        }

        match result {
            Ok(artifact) => {
                let metrics = estimate(algorithm, elapsed_ms);
                let source_name = session
                    .snapshot
                    .source_name
                    .clone()
                    .unwrap_or_else(|| "未命名".to_string());
                let id = session
                    .history
                    .record(source_name, algorithm, artifact.clone(), metrics);

                session.snapshot.forward = Some(artifact);
                session.snapshot.reverse = None;
                session.snapshot.metrics = Some(metrics);
                session.snapshot.progress = 100;
                session.snapshot.in_progress = false;
                session.snapshot.state = WorkflowState::ForwardDone;
                session.snapshot.has_completed_forward = true;

                log::info!(
                    "✅ 正向变换完成 - 算法: {} transform={}ms 记录: {}",
                    algorithm.as_str(),
                    elapsed_ms,
                    id
                );
                Ok(())
            }
            Err(err) => {
                session.snapshot.in_progress = false;
                session.snapshot.progress = 0;
                session.snapshot.message = Some(err.to_string());
                session.snapshot.state = if session.snapshot.forward.is_some() {
                    WorkflowState::ForwardDone
                } else {
                    WorkflowState::Ready
                };

                log::warn!("⚠️ 正向变换失败 - 阶段: {} 原因: {}", err.stage(), err);
                Err(err)
            }
        }
    }

    // ─── 内部：逆向变换 ───

    fn begin_reverse(
        &self,
        secret: &str,
    ) -> Result<(ForwardArtifact, Algorithm, Option<Arc<Bitmap>>, u64), EngineError> {
        let mut session = self.lock_session()?;

        if session.snapshot.in_progress {
            return Err(EngineError::Precondition(
                "已有操作在途，请等待其完成".to_string(),
            ));
        }
        let forward = session
            .snapshot
            .forward
            .clone()
            .ok_or_else(|| EngineError::Precondition("没有可逆向的正向结果".to_string()))?;
        let algorithm = session
            .snapshot
            .algorithm
            .ok_or_else(|| EngineError::Internal("快照缺少算法标识".to_string()))?;
        Self::require_secret(algorithm, secret)?;

        let source = session.snapshot.source.clone();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        session.snapshot.in_progress = true;
        session.snapshot.progress = 0;
        session.snapshot.message = None;
        session.snapshot.state = WorkflowState::ReverseInProgress;

        Ok((forward, algorithm, source, generation))
    }

    async fn execute_reverse(
        &self,
        forward: &ForwardArtifact,
        algorithm: Algorithm,
        source: Option<Arc<Bitmap>>,
        secret: &str,
        generation: u64,
    ) -> Result<ReverseOutput, EngineError> {
        let on_progress = self.progress_sink(generation);

        if algorithm.runs_locally() {
            let stego = match &forward.image {
                Some(image) => Arc::clone(image),
                None => Arc::new(Bitmap::decode(&forward.raw)?),
            };
            let message = transform::lsb_extract(&stego, &on_progress).await?;
            return Ok(ReverseOutput::Message(message));
        }

        if let Some(remote) = self.remote_snapshot()? {
            let payload = general_purpose::STANDARD.encode(forward.raw.as_slice());
            let response = remote.reverse(&payload, secret, algorithm).await?;

            if let Some(message) = response.decrypted_message {
                return Ok(ReverseOutput::Message(message));
            }

            let raw = match &response.decrypted_image {
                Some(inline) => bitmap::parse_base64(inline)?,
                None => {
                    let url = response.decrypted_file_url.as_deref().ok_or_else(|| {
                        EngineError::Remote("响应既无内联结果也无文件地址".to_string())
                    })?;
                    remote.fetch_artifact(url).await?
                }
            };
            return Ok(ReverseOutput::Image(Arc::new(Bitmap::decode(&raw)?)));
        }

        // 本地扰动不可逆：模拟逆向即重新发布保留到 reset 为止的源图引用
        let source = source.ok_or_else(|| {
            EngineError::Precondition("会话中没有保留的源图，无法模拟逆向".to_string())
        })?;
        on_progress(100);
        Ok(ReverseOutput::Image(source))
    }

    fn finish_reverse(
        &self,
        forward: &ForwardArtifact,
        algorithm: Algorithm,
        generation: u64,
        elapsed_ms: u64,
        result: Result<ReverseOutput, EngineError>,
    ) -> Result<(), EngineError> {
        let mut session = self.lock_session()?;

        if self.generation.load(Ordering::SeqCst) != generation {
            log::debug!("⏭️ 丢弃过期逆向操作的完成回调 - generation: {}", generation);
            return Ok(());
        }

        match result {
            Ok(output) => {
                let metrics = session
                    .snapshot
                    .metrics
                    .unwrap_or_else(|| estimate(algorithm, 0))
                    .with_reverse(elapsed_ms);

                if !session.history.attach_reverse(forward, output.clone(), metrics) {
                    log::debug!("🗑️ 对应历史记录已被淘汰，仅更新快照");
                }

                session.snapshot.reverse = Some(output);
                session.snapshot.metrics = Some(metrics);
                session.snapshot.progress = 100;
                session.snapshot.in_progress = false;
                session.snapshot.state = WorkflowState::ReverseDone;

                log::info!(
                    "✅ 逆向变换完成 - 算法: {} transform={}ms",
                    algorithm.as_str(),
                    elapsed_ms
                );
                Ok(())
            }
            Err(err) => {
                session.snapshot.in_progress = false;
                session.snapshot.progress = 0;
                session.snapshot.message = Some(err.to_string());
                session.snapshot.state = WorkflowState::ForwardDone;

                log::warn!("⚠️ 逆向变换失败 - 阶段: {} 原因: {}", err.stage(), err);
                Err(err)
            }
        }
    }

    // ─── 内部：公共辅助 ───

    /// 第二输入非空校验：`lsb` 要求消息，其余要求口令。
    fn require_secret(algorithm: Algorithm, secret: &str) -> Result<(), EngineError> {
        if !secret.trim().is_empty() {
            return Ok(());
        }
        match algorithm.secret_kind() {
            SecretKind::Message => Err(EngineError::Validation(
                "位平面隐写需要非空消息".to_string(),
            )),
            SecretKind::Passphrase => Err(EngineError::Validation(format!(
                "算法 {} 需要非空口令",
                algorithm.as_str()
            ))),
        }
    }

    /// 构造带代数标签的进度回调：代数不符的更新被静默丢弃，
    /// 单次操作内进度只增不减。
    fn progress_sink(&self, generation: u64) -> impl Fn(u8) + '_ {
        move |progress: u8| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            match self.session.lock() {
                Ok(mut session) => {
                    if session.snapshot.in_progress && session.snapshot.progress < progress {
                        session.snapshot.progress = progress.min(100);
                    }
                }
                Err(_) => {
                    // 回调无法返回错误，降级为告警后丢弃本次进度更新
                    log::warn!("⚠️ 会话状态锁已中毒，丢弃进度更新 - progress: {}", progress);
                }
            }
        }
    }

    fn lock_session(&self) -> Result<MutexGuard<'_, SessionState>, EngineError> {
        self.session
            .lock()
            .map_err(|_| EngineError::Internal("会话状态锁已中毒".to_string()))
    }

    fn config_snapshot(&self) -> Result<EngineConfig, EngineError> {
        self.config
            .read()
            .map(|config| config.clone())
            .map_err(|_| EngineError::Internal("配置读取锁已中毒".to_string()))
    }

    fn remote_snapshot(&self) -> Result<Option<RemoteClient>, EngineError> {
        self.remote
            .read()
            .map(|remote| remote.clone())
            .map_err(|_| EngineError::Internal("远端客户端锁已中毒".to_string()))
    }
}
