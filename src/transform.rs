//! # 分批像素变换模块
//!
//! ## 设计思路
//!
//! 所有本地像素处理都按块推进：处理一块、上报进度、向调度器让出控制权，
//! 再处理下一块。这保证宿主在大图处理期间保持响应，也让编排层能在
//! 操作中途观测到进度读数。本模块对输入是纯函数：只通过返回值与进度
//! 回调对外通信，绝不触碰共享状态。
//!
//! ## 实现思路
//!
//! - 块大小 = `max(1000, 总像素数 / 20)`，非平凡图像约 20 块，小图保底 1000。
//! - 每块结束后 `progress = 已处理 * 100 / 总数`，随后 `yield_now().await`。
//! - LSB 路径为真逆变换：32 位大端长度头 + UTF-8 消息位，逐位写入前三个
//!   通道的最低位，alpha 通道不动。
//! - 非 LSB 的本地替代路径：前三个通道各加 [-25, +25] 的伪随机偏移并
//!   截断到合法范围。按密钥派生种子，同一密钥可复现（便于测试），
//!   但该变换不可逆，也不具备任何密码学属性。

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::task::yield_now;

use crate::bitmap::{Bitmap, CHANNELS};
use crate::error::EngineError;

/// 小图的块大小下限（像素）。
const CHUNK_FLOOR: usize = 1000;
/// 非平凡图像的目标块数。
const TARGET_CHUNKS: usize = 20;
/// 伪随机扰动的幅度上限（含）。
const PERTURB_RANGE: i16 = 25;
/// LSB 负载长度头的位数（32 位大端）。
const HEADER_BITS: usize = 32;

/// 计算分批处理的块大小（像素）。
fn chunk_size(total_pixels: usize) -> usize {
    (total_pixels / TARGET_CHUNKS).max(CHUNK_FLOOR)
}

/// 按块遍历像素并上报进度。
///
/// `step` 接收当前块的像素下标区间，同步处理后让出调度权。
/// 进度单调不减，最后一次上报恰好为 100。
async fn process_in_chunks<F, P>(
    total_pixels: usize,
    mut step: F,
    on_progress: &P,
) where
    F: FnMut(std::ops::Range<usize>),
    P: Fn(u8),
{
    let chunk = chunk_size(total_pixels);
    let mut processed = 0usize;

    while processed < total_pixels {
        let end = (processed + chunk).min(total_pixels);
        step(processed..end);
        processed = end;

        let progress = (processed * 100 / total_pixels) as u8;
        on_progress(progress);
        yield_now().await;
    }

    if total_pixels == 0 {
        on_progress(100);
    }
}

/// 将 UTF-8 消息嵌入位图前三个通道的最低位。
///
/// 负载 = 32 位大端长度头 + 消息字节。位 `i` 写入像素 `i / 3` 的
/// 通道 `i % 3`。超出负载的像素原样拷贝，但每个像素都会被访问一次，
/// 进度覆盖整幅图像。
///
/// # 失败
/// 消息超出容量（`width * height * 3` 位）时返回校验错误，不做自动重试。
pub async fn lsb_embed<P>(
    source: &Bitmap,
    message: &str,
    on_progress: P,
) -> Result<Bitmap, EngineError>
where
    P: Fn(u8),
{
    let total_pixels = source.pixel_count();
    let capacity_bits = total_pixels * 3;

    let msg_bytes = message.as_bytes();
    let mut payload = Vec::with_capacity(4 + msg_bytes.len());
    payload.extend_from_slice(&(msg_bytes.len() as u32).to_be_bytes());
    payload.extend_from_slice(msg_bytes);

    let payload_bits = payload.len() * 8;
    if payload_bits > capacity_bits {
        return Err(EngineError::Validation(format!(
            "消息过长：需要 {} 位，图像容量 {} 位",
            payload_bits, capacity_bits
        )));
    }

    log::debug!(
        "🫥 LSB 嵌入开始 - 消息 {} 字节，负载 {} 位，容量 {} 位",
        msg_bytes.len(),
        payload_bits,
        capacity_bits
    );

    let mut data = source.data_clone();

    process_in_chunks(
        total_pixels,
        |range| {
            for pixel in range {
                for channel in 0..3 {
                    let bit_index = pixel * 3 + channel;
                    if bit_index >= payload_bits {
                        break;
                    }
                    let bit = (payload[bit_index / 8] >> (7 - bit_index % 8)) & 1;
                    let offset = pixel * CHANNELS + channel;
                    data[offset] = (data[offset] & 0xFE) | bit;
                }
            }
        },
        &on_progress,
    )
    .await;

    Bitmap::from_rgba(source.width(), source.height(), data)
}

/// 从位图前三个通道的最低位恢复 UTF-8 消息。
///
/// # 失败
/// - 长度头声明的位数超出图像容量 → 数据损坏或格式不符
/// - 恢复出的字节不是合法 UTF-8 → 解码错误
pub async fn lsb_extract<P>(source: &Bitmap, on_progress: P) -> Result<String, EngineError>
where
    P: Fn(u8),
{
    let total_pixels = source.pixel_count();
    let capacity_bits = total_pixels * 3;
    let data = source.data();

    if capacity_bits < HEADER_BITS {
        return Err(EngineError::Decode("图像过小，无法容纳长度头".to_string()));
    }

    let read_bit = |bit_index: usize| -> u8 {
        let pixel = bit_index / 3;
        let channel = bit_index % 3;
        data[pixel * CHANNELS + channel] & 1
    };

    let mut msg_len = 0u32;
    for i in 0..HEADER_BITS {
        msg_len = (msg_len << 1) | read_bit(i) as u32;
    }

    let total_bits = HEADER_BITS + msg_len as usize * 8;
    if total_bits > capacity_bits {
        return Err(EngineError::Decode(format!(
            "数据损坏或格式不符：长度头声明 {} 位，超出容量 {} 位",
            total_bits, capacity_bits
        )));
    }

    log::debug!("🔍 LSB 提取 - 声明消息 {} 字节，共 {} 位", msg_len, total_bits);

    // 提取只需要覆盖负载的像素，进度按实际需要访问的像素计算。
    let needed_pixels = (total_bits + 2) / 3;
    let mut msg_bytes = vec![0u8; msg_len as usize];

    process_in_chunks(
        needed_pixels,
        |range| {
            for pixel in range {
                for channel in 0..3 {
                    let bit_index = pixel * 3 + channel;
                    if bit_index < HEADER_BITS || bit_index >= total_bits {
                        continue;
                    }
                    let payload_index = bit_index - HEADER_BITS;
                    if read_bit(bit_index) == 1 {
                        msg_bytes[payload_index / 8] |= 1 << (7 - payload_index % 8);
                    }
                }
            }
        },
        &on_progress,
    )
    .await;

    String::from_utf8(msg_bytes)
        .map_err(|e| EngineError::Decode(format!("恢复的消息不是合法 UTF-8：{}", e)))
}

/// 非 LSB 算法的本地替代变换：有界伪随机扰动。
///
/// 前三个通道各叠加 [-25, +25] 的偏移并截断到 [0, 255]，alpha 不动。
/// 种子由密钥派生，同一密钥产出相同结果；该变换不可逆，仅用于在远端
/// 服务不可用时提供视觉模拟，不具备任何安全属性。
pub async fn perturb<P>(source: &Bitmap, key: &str, on_progress: P) -> Result<Bitmap, EngineError>
where
    P: Fn(u8),
{
    let total_pixels = source.pixel_count();
    let mut rng = StdRng::seed_from_u64(seed_from_key(key));
    let mut data = source.data_clone();

    process_in_chunks(
        total_pixels,
        |range| {
            for pixel in range {
                for channel in 0..3 {
                    let offset = pixel * CHANNELS + channel;
                    let delta: i16 = rng.random_range(-PERTURB_RANGE..=PERTURB_RANGE);
                    data[offset] = (data[offset] as i16 + delta).clamp(0, 255) as u8;
                }
            }
        },
        &on_progress,
    )
    .await;

    Bitmap::from_rgba(source.width(), source.height(), data)
}

/// 从密钥字符串派生 RNG 种子。
fn seed_from_key(key: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    hasher.finish()
}
