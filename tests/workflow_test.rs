//! 工作流端到端场景测试。
//!
//! 覆盖五种意图的完整交互：上传校验、本地 LSB 往返、在途拒绝、
//! 前置条件错误、重置语义、历史容量与回放。本地"加密"是公开声明的
//! 视觉模拟，这里只断言工作流语义与数值区间，绝不断言密码学强度。

use std::sync::Arc;

use cipher_studio::{
    Algorithm, EngineConfig, EngineError, ReverseOutput, WorkflowEngine, WorkflowSnapshot,
    WorkflowState,
};
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgba};
use proptest::prelude::*;
use std::io::Cursor;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn create_png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgba([(x % 255) as u8, (y % 255) as u8, ((x + y) % 255) as u8, 255])
    });

    let mut cursor = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, ImageFormat::Png)
        .expect("failed to encode test image");
    cursor.into_inner()
}

fn engine_with_source(width: u32, height: u32) -> WorkflowEngine {
    let engine = WorkflowEngine::new().expect("engine init failed");
    engine
        .upload("scenario.png", &create_png_bytes(width, height))
        .expect("upload should succeed");
    engine
}

#[tokio::test]
async fn scenario_lsb_hello_roundtrip() {
    init_logger();

    // 上传 100x100 图像，选择位平面隐写，第二输入 "hello"
    let engine = engine_with_source(100, 100);

    engine.run_forward(Algorithm::Lsb, "hello").await.expect("forward should succeed");

    let snapshot = engine.snapshot().unwrap();
    assert_eq!(snapshot.state, WorkflowState::ForwardDone);
    assert!(snapshot.has_completed_forward);
    assert_eq!(engine.history().unwrap().len(), 1);

    engine.run_reverse("hello").await.expect("reverse should succeed");

    let snapshot = engine.snapshot().unwrap();
    assert_eq!(snapshot.state, WorkflowState::ReverseDone);
    assert!(matches!(
        snapshot.reverse,
        Some(ReverseOutput::Message(ref m)) if m == "hello"
    ));
}

#[tokio::test]
async fn scenario_empty_passphrase_rejected_before_any_network_call() {
    init_logger();

    // 远端地址指向保留端口：若引擎在校验前发起网络调用，会得到 Remote
    // 错误而非 Validation 错误，测试即失败
    let mut config = EngineConfig::default();
    config.remote_base_url = Some("http://127.0.0.1:1".into());

    let engine = WorkflowEngine::with_config(config).unwrap();
    engine.upload("scenario.png", &create_png_bytes(32, 32)).unwrap();

    let result = engine.run_forward(Algorithm::Aes, "").await;
    assert!(matches!(result, Err(EngineError::Validation(_))));
    assert!(engine.history().unwrap().is_empty());
}

#[tokio::test]
async fn history_is_bounded_to_ten_and_evicts_oldest() {
    init_logger();

    let engine = engine_with_source(32, 32);
    let mut ids = Vec::new();

    for i in 0..11 {
        engine
            .run_forward(Algorithm::Lsb, &format!("message {}", i))
            .await
            .expect("forward should succeed");
        ids.push(engine.history().unwrap()[0].id);
    }

    let records = engine.history().unwrap();
    assert_eq!(records.len(), 10);

    let listed: Vec<i64> = records.iter().map(|r| r.id).collect();
    let expected: Vec<i64> = ids[1..].iter().rev().copied().collect();
    assert_eq!(listed, expected, "exactly the oldest record is evicted");
}

#[tokio::test]
async fn reset_from_any_state_matches_initial_snapshot() {
    init_logger();

    // idle
    let engine = WorkflowEngine::new().unwrap();
    engine.reset().unwrap();
    assert_eq!(engine.snapshot().unwrap(), WorkflowSnapshot::default());

    // ready
    let engine = engine_with_source(16, 16);
    engine.reset().unwrap();
    assert_eq!(engine.snapshot().unwrap(), WorkflowSnapshot::default());

    // forward-done
    let engine = engine_with_source(64, 64);
    engine.run_forward(Algorithm::Lsb, "x").await.unwrap();
    engine.reset().unwrap();
    assert_eq!(engine.snapshot().unwrap(), WorkflowSnapshot::default());

    // reverse-done
    let engine = engine_with_source(64, 64);
    engine.run_forward(Algorithm::Lsb, "x").await.unwrap();
    engine.run_reverse("x").await.unwrap();
    engine.reset().unwrap();
    assert_eq!(engine.snapshot().unwrap(), WorkflowSnapshot::default());
}

#[tokio::test]
async fn reverse_without_forward_leaves_snapshot_unchanged() {
    init_logger();

    let engine = engine_with_source(32, 32);
    let before = engine.snapshot().unwrap();

    let result = engine.run_reverse("secret").await;
    assert!(matches!(result, Err(EngineError::Precondition(_))));
    assert_eq!(engine.snapshot().unwrap(), before);
}

#[tokio::test]
async fn in_flight_operation_survives_busy_rejection() {
    init_logger();

    let engine = Arc::new(engine_with_source(200, 200));

    let background = Arc::clone(&engine);
    let handle = tokio::spawn(async move {
        background.run_forward(Algorithm::Lsb, "long running").await
    });

    let mut spins = 0;
    while !engine.snapshot().unwrap().in_progress {
        tokio::task::yield_now().await;
        spins += 1;
        assert!(spins < 10_000, "operation never became observable");
    }

    let busy = engine.run_forward(Algorithm::Lsb, "interloper").await;
    assert!(matches!(busy, Err(EngineError::Precondition(_))));

    handle.await.unwrap().expect("in-flight operation must still complete");

    let snapshot = engine.snapshot().unwrap();
    assert_eq!(snapshot.state, WorkflowState::ForwardDone);
    assert_eq!(snapshot.progress, 100);
    assert_eq!(engine.history().unwrap().len(), 1);

    // 被拒绝的请求没有留下痕迹
    engine.run_reverse("long running").await.unwrap();
    let snapshot = engine.snapshot().unwrap();
    assert!(matches!(
        snapshot.reverse,
        Some(ReverseOutput::Message(ref m)) if m == "long running"
    ));
}

#[tokio::test]
async fn reset_during_operation_discards_superseded_completion() {
    init_logger();

    // 大图保证正向变换跨多个 chunk 让出执行权，重置发生在其完成之前
    let engine = Arc::new(engine_with_source(512, 512));

    let background = Arc::clone(&engine);
    let handle = tokio::spawn(async move {
        background.run_forward(Algorithm::Lsb, "superseded").await
    });

    let mut spins = 0;
    while !engine.snapshot().unwrap().in_progress {
        tokio::task::yield_now().await;
        spins += 1;
        assert!(spins < 10_000, "operation never became observable");
    }

    engine.reset().unwrap();

    // 被重置代数淘汰的操作静默结束，不上报错误
    handle.await.unwrap().expect("superseded operation must not surface an error");

    // 它的结果、进度与历史记录都不可见
    assert_eq!(engine.snapshot().unwrap(), WorkflowSnapshot::default());
    assert!(engine.history().unwrap().is_empty());

    // 新会话照常工作
    engine.upload("scenario.png", &create_png_bytes(64, 64)).unwrap();
    engine.run_forward(Algorithm::Lsb, "fresh").await.unwrap();
    assert_eq!(engine.snapshot().unwrap().state, WorkflowState::ForwardDone);
    assert_eq!(engine.history().unwrap().len(), 1);
}

#[tokio::test]
async fn upload_rejects_oversized_and_foreign_files() {
    init_logger();

    let mut config = EngineConfig::default();
    config.max_upload_bytes = 256;
    let engine = WorkflowEngine::with_config(config).unwrap();

    let big = create_png_bytes(128, 128);
    assert!(matches!(
        engine.upload("big.png", &big),
        Err(EngineError::Validation(_))
    ));

    let engine = WorkflowEngine::new().unwrap();
    assert!(matches!(
        engine.upload("note.txt", b"not an image at all"),
        Err(EngineError::Validation(_))
    ));

    // 校验失败的上传不会改变快照
    assert_eq!(engine.snapshot().unwrap(), WorkflowSnapshot::default());
}

#[tokio::test]
async fn replay_after_reset_restores_completed_operation() {
    init_logger();

    let engine = engine_with_source(80, 80);
    engine.run_forward(Algorithm::Lsb, "kept in history").await.unwrap();
    engine.run_reverse("kept in history").await.unwrap();
    let id = engine.history().unwrap()[0].id;

    engine.reset().unwrap();
    assert_eq!(engine.snapshot().unwrap().state, WorkflowState::Idle);

    engine.select_history_item(id).unwrap();

    let snapshot = engine.snapshot().unwrap();
    assert_eq!(snapshot.state, WorkflowState::ReverseDone);
    assert_eq!(snapshot.algorithm, Some(Algorithm::Lsb));
    assert!(matches!(
        snapshot.reverse,
        Some(ReverseOutput::Message(ref m)) if m == "kept in history"
    ));
}

#[tokio::test]
async fn metrics_ranges_follow_algorithm_fidelity_model() {
    init_logger();

    let engine = engine_with_source(48, 48);
    engine.run_forward(Algorithm::Lsb, "hi").await.unwrap();
    let metrics = engine.snapshot().unwrap().metrics.unwrap();
    assert!((45.0..=55.0).contains(&metrics.psnr_db));
    assert!((0.95..=0.99).contains(&metrics.ssim));

    let engine = engine_with_source(48, 48);
    engine.run_forward(Algorithm::Hybrid, "pass").await.unwrap();
    let metrics = engine.snapshot().unwrap().metrics.unwrap();
    assert!((25.0..=40.0).contains(&metrics.psnr_db));
    assert!((0.70..=0.90).contains(&metrics.ssim));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn lsb_roundtrip_recovers_arbitrary_messages(message in "[!-~][ -~]{0,63}") {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let engine = engine_with_source(64, 64);
            engine.run_forward(Algorithm::Lsb, &message).await.unwrap();
            engine.run_reverse(&message).await.unwrap();

            let snapshot = engine.snapshot().unwrap();
            assert!(matches!(
                snapshot.reverse,
                Some(ReverseOutput::Message(ref m)) if *m == message
            ));
        });
    }

    #[test]
    fn forward_always_ends_at_exactly_100(width in 8u32..96, height in 8u32..96) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let engine = engine_with_source(width, height);
            engine.run_forward(Algorithm::Chaos, "3.99").await.unwrap();

            let snapshot = engine.snapshot().unwrap();
            assert_eq!(snapshot.progress, 100);
            assert_eq!(snapshot.state, WorkflowState::ForwardDone);
        });
    }
}
