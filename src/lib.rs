//! # 图像加密工作台核心引擎 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                  展示层（外部协作方）                      │
//! │                                                          │
//! │  上传控件 ── 算法选择 ── 进度条 ── 指标面板 ── 历史列表    │
//! │       │  （只读快照 + 五种意图，不在本仓库内）             │
//! └───────┼──────────────────────────────────────────────────┘
//!         ↕ WorkflowSnapshot（读） / 意图（写）
//! ┌───────┼──────────────────────────────────────────────────┐
//! │       ↕            核心引擎（本仓库）                     │
//! │                                                          │
//! │  ┌─ error ────── EngineError（统一错误类型）              │
//! │  │                                                       │
//! │  ├─ engine ───── 工作流状态机（唯一的状态修改者）          │
//! │  │   ├─ config        可调策略                           │
//! │  │   ├─ upload        上传校验（体积/MIME/解码）          │
//! │  │   └─ snapshot      快照与中间产物模型                  │
//! │  │                                                       │
//! │  ├─ transform ── 分批像素变换（LSB 真逆变换 + 有损模拟）   │
//! │  ├─ remote ───── 远端 /encrypt、/decrypt 客户端           │
//! │  ├─ metrics ──── 耗时 + 声明式质量分数                    │
//! │  ├─ history ──── 有界会话历史（最近 10 条）               │
//! │  ├─ bitmap ───── RGBA 位图模型与编解码                    │
//! │  └─ algorithm ── 算法选择器（封闭集合）                   │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `EngineError`，所有公开操作的返回类型 |
//! | [`algorithm`] | 封闭的算法集合、线上标识解析、路径与密钥语义 |
//! | [`bitmap`] | RGBA 位图模型、解码/PNG 编码、Base64 辅助 |
//! | [`transform`] | 分批像素流水线：块间让出调度权并上报进度 |
//! | [`remote`] | 远端变换服务的线上契约（协作方，不含其内部实现） |
//! | [`metrics`] | 耗时实测 + 按算法区间采样的演示用质量分数 |
//! | [`history`] | 有界、最新在前、仅存活于进程内存的会话历史 |
//! | [`engine`] | 工作流状态机：五种意图、generation 失效、快照重建 |
//!
//! ## 一次完整会话
//!
//! ```rust,no_run
//! use cipher_studio::{Algorithm, WorkflowEngine};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = WorkflowEngine::new()?;
//!
//! engine.upload("photo.png", &std::fs::read("photo.png")?)?;
//! engine.run_forward(Algorithm::Lsb, "hidden message").await?;
//! engine.run_reverse("hidden message").await?;
//!
//! let snapshot = engine.snapshot()?;
//! assert!(snapshot.has_completed_forward);
//! # Ok(())
//! # }
//! ```
//!
//! 注意：本地变换是公开声明的**非密码学视觉模拟**（LSB 为真逆变换的
//! 隐写预览，其余算法在未配置远端时退化为有界扰动）；真实加密算法由
//! 远端服务执行，本引擎只实现其契约。

pub mod algorithm;
pub mod bitmap;
pub mod engine;
pub mod error;
pub mod history;
pub mod metrics;
pub mod remote;
pub mod transform;

pub use algorithm::{Algorithm, SecretKind};
pub use bitmap::Bitmap;
pub use engine::{
    EngineConfig, ForwardArtifact, ReverseOutput, WorkflowEngine, WorkflowSnapshot, WorkflowState,
};
pub use error::EngineError;
pub use history::{OperationRecord, SessionHistory};
pub use metrics::{estimate, Metrics};
pub use remote::{DecryptResponse, EncryptResponse, RemoteClient};
