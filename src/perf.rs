// ==========================================
// 负库存分析系统 - 阶段耗时统计
// ==========================================
// PerfGuard 在 drop 时记录 elapsed_ms + 处理行数
// 慢阶段阈值: NEG_INVENTORY_SLOW_STAGE_MS（毫秒, 默认 debug=500 / release=2000）
// ==========================================

use std::sync::OnceLock;
use std::time::Instant;

/// 慢阶段阈值环境变量
pub const SLOW_STAGE_ENV: &str = "NEG_INVENTORY_SLOW_STAGE_MS";

static SLOW_STAGE_THRESHOLD_MS: OnceLock<u64> = OnceLock::new();

/// 慢阶段阈值（毫秒）, 首次调用时从环境变量读取
pub fn slow_stage_threshold_ms() -> u64 {
    *SLOW_STAGE_THRESHOLD_MS.get_or_init(|| {
        std::env::var(SLOW_STAGE_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(if cfg!(debug_assertions) { 500 } else { 2_000 })
    })
}

/// 性能统计 Guard：记录 elapsed_ms + rows
///
/// 使用方式：
/// ```ignore
/// let mut perf = negative_inventory::perf::PerfGuard::new("aggregate");
/// // do work...
/// perf.set_rows(summaries.len());
/// ```
pub struct PerfGuard {
    op: &'static str,
    start: Instant,
    rows: Option<usize>,
}

impl PerfGuard {
    pub fn new(op: &'static str) -> Self {
        Self {
            op,
            start: Instant::now(),
            rows: None,
        }
    }

    /// 记录本阶段产出的行数
    pub fn set_rows(&mut self, rows: usize) {
        self.rows = Some(rows);
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Drop for PerfGuard {
    fn drop(&mut self) {
        let elapsed_ms = self.elapsed_ms();
        let threshold = slow_stage_threshold_ms();

        if threshold > 0 && elapsed_ms >= threshold {
            tracing::warn!(
                target: "perf",
                op = self.op,
                elapsed_ms,
                rows = ?self.rows,
                threshold_ms = threshold,
                "slow stage"
            );
        } else {
            tracing::debug!(
                target: "perf",
                op = self.op,
                elapsed_ms,
                rows = ?self.rows,
                "done"
            );
        }
    }
}
