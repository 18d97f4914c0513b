//! # 会话历史缓存模块
//!
//! ## 设计思路
//!
//! 有界、最新在前的已完成操作存储，仅存活于进程内存中——整页重载后
//! 归零，这是刻意为之（会话级作用域，见配置文档）。记录一旦写入，
//! 只允许在对应逆向变换成功后补充逆向结果与指标，绝不重排，删除只
//! 发生在容量淘汰时。
//!
//! ## 实现思路
//!
//! - `VecDeque` 头插 + 截断表达"最近 N 条"语义。
//! - 标识符由时钟毫秒派生并强制严格递增（`max(now, last + 1)`），
//!   连续快速操作也不会撞号。
//! - 逆向结果按正向负载的 `Arc` 指针匹配记录：引用相等即同一次操作，
//!   无需额外索引。

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::algorithm::Algorithm;
use crate::engine::snapshot::{ForwardArtifact, ReverseOutput};
use crate::metrics::Metrics;

/// 历史容量默认值：最近 10 条。
pub const DEFAULT_CAPACITY: usize = 10;

/// 一次已完成操作的记录。
///
/// 在正向变换成功时创建；此后唯一的修改是补充逆向结果与更新指标。
#[derive(Debug, Clone, Serialize)]
pub struct OperationRecord {
    /// 会话内唯一且单调递增的标识符。
    pub id: i64,
    /// 源文件名（展示用）。
    pub source_name: String,
    /// 本次操作使用的算法。
    pub algorithm: Algorithm,
    /// 记录创建时间。
    pub created_at: DateTime<Utc>,
    /// 正向变换产物。
    pub forward: ForwardArtifact,
    /// 逆向变换产物，逆向完成前为空。
    pub reverse: Option<ReverseOutput>,
    /// 质量/性能指标。
    pub metrics: Metrics,
}

/// 会话历史缓存。
///
/// # 示例
/// ```rust,ignore
/// use cipher_studio::SessionHistory;
///
/// let mut history = SessionHistory::new();
/// let id = history.record("photo.png".into(), algorithm, forward, metrics);
/// assert!(history.select(id).is_some());
/// ```
#[derive(Debug)]
pub struct SessionHistory {
    records: VecDeque<OperationRecord>,
    capacity: usize,
    last_id: i64,
}

impl SessionHistory {
    /// 创建默认容量（10 条）的历史缓存。
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// 创建指定容量的历史缓存，主要用于测试。
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
            last_id: 0,
        }
    }

    /// 头插一条新记录并截断到容量上限，返回分配的标识符。
    pub fn record(
        &mut self,
        source_name: String,
        algorithm: Algorithm,
        forward: ForwardArtifact,
        metrics: Metrics,
    ) -> i64 {
        let id = self.next_id();

        self.records.push_front(OperationRecord {
            id,
            source_name,
            algorithm,
            created_at: Utc::now(),
            forward,
            reverse: None,
            metrics,
        });

        while self.records.len() > self.capacity {
            if let Some(evicted) = self.records.pop_back() {
                log::debug!("🗑️ 历史已满，淘汰最旧记录 id={}", evicted.id);
            }
        }

        id
    }

    /// 为匹配的记录补充逆向结果与更新后的指标，不改变顺序。
    ///
    /// 匹配依据是正向负载的引用相等（同一 `Arc` 分配即同一次操作）。
    /// 返回是否找到了匹配记录。
    pub fn attach_reverse(
        &mut self,
        forward: &ForwardArtifact,
        reverse: ReverseOutput,
        metrics: Metrics,
    ) -> bool {
        for record in self.records.iter_mut() {
            if Arc::ptr_eq(&record.forward.raw, &forward.raw) {
                record.reverse = Some(reverse);
                record.metrics = metrics;
                return true;
            }
        }
        false
    }

    /// 按最新在前的顺序返回全部记录。
    pub fn list(&self) -> Vec<OperationRecord> {
        self.records.iter().cloned().collect()
    }

    /// 按标识符查找记录。
    pub fn select(&self, id: i64) -> Option<OperationRecord> {
        self.records.iter().find(|record| record.id == id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 分配下一个标识符：时钟毫秒与上一标识符 + 1 取较大者。
    fn next_id(&mut self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let id = now.max(self.last_id + 1);
        self.last_id = id;
        id
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}
