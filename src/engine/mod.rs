//! # 工作流引擎模块（engine）
//!
//! ## 设计思路
//!
//! 该模块将"上传校验 → 路径选择 → 变换编排 → 状态快照"按职责拆分为
//! 多个子模块，避免单文件膨胀与耦合：
//!
//! - `config`：承载可调策略（上传约束 / 历史容量 / 远端地址）
//! - `snapshot`：状态机阶段、快照与中间产物模型
//! - `upload`：上传入口的体积 / MIME / 解码校验
//! - `machine`：编排五种意图，唯一有权修改会话状态的组件
//!
//! ## 实现思路
//!
//! 对外仅暴露必要类型，内部细节保持 `mod` 私有。
//!
//! ## 新同事快速上手
//!
//! 可以按下面顺序理解调用链：
//!
//! ```text
//! 展示层意图（upload / run_forward / run_reverse / select_history_item / reset）
//!    ↓
//! machine.rs（前置校验 + generation 标记 + 编排）
//!    ├─ upload.rs（体积 + MIME 嗅探 + 解码校验）
//!    ├─ transform.rs（本地分批像素变换，块间让出调度权）
//!    ├─ remote.rs（/encrypt、/decrypt 远端契约）
//!    ├─ metrics.rs（耗时 + 声明式质量分数）
//!    └─ history.rs（有界最新在前的会话历史）
//!    ↓
//! WorkflowSnapshot（克隆副本）返回给展示层
//! ```

pub mod config;
pub mod snapshot;
mod upload;

mod machine;

pub use config::EngineConfig;
pub use machine::WorkflowEngine;
pub use snapshot::{ForwardArtifact, ReverseOutput, WorkflowSnapshot, WorkflowState};
