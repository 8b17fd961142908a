// ==========================================
// 负库存分析系统 - 严重度分级引擎
// ==========================================
// 输入: 每个托盘 |mean_qty| 的全体分布
// 输出: Low / Medium / High / Critical
// ==========================================
// 决策树 (自上而下, 每个分支无副作用):
// 1. 样本为空            → 无分级
// 2. 仅一个不同取值       → 全部 Medium
// 3. 托盘数 < 4          → 中位数二分: > 中位数 Critical, 否则 Low
// 4. 四分位可分 (q25<q50<q75) → 四档
//    四分位塌缩 / 非有限值 → 相对中位数三档 (High/Medium/Low)
// ==========================================

use crate::domain::inventory::PalletSummary;
use crate::domain::types::Severity;
use tracing::debug;

/// 中位数倍数: 回退规则中 High 的门槛
pub const HIGH_MEDIAN_MULTIPLIER: f64 = 1.5;

/// 分级所走的分支
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityPath {
    Empty,
    SingleValue,
    MedianSplit,
    Quartiles,
    RelativeToMedian,
}

/// 四分位切点
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuartileCuts {
    pub q25: f64,
    pub q50: f64,
    pub q75: f64,
}

impl QuartileCuts {
    /// 三个切点互不相同时才可做四档切分
    pub fn is_separable(&self) -> bool {
        self.q25 < self.q50 && self.q50 < self.q75
    }

    fn label(&self, m: f64) -> Severity {
        if m <= self.q25 {
            Severity::Low
        } else if m <= self.q50 {
            Severity::Medium
        } else if m <= self.q75 {
            Severity::High
        } else {
            Severity::Critical
        }
    }
}

/// 线性插值分位数（与 numpy 默认一致）, `sorted` 必须升序且非空
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = p.clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = (lo + 1).min(n - 1);
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

fn median(sorted: &[f64]) -> f64 {
    percentile(sorted, 0.5)
}

fn count_distinct(sorted: &[f64]) -> usize {
    let mut distinct = 0;
    let mut prev: Option<f64> = None;
    for &v in sorted {
        if prev != Some(v) {
            distinct += 1;
            prev = Some(v);
        }
    }
    distinct
}

// ==========================================
// SeverityClassifier - 严重度分级
// ==========================================
pub struct SeverityClassifier {
    // 无状态引擎
}

impl Default for SeverityClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl SeverityClassifier {
    pub fn new() -> Self {
        Self {}
    }

    /// 选择分支（纯函数, 仅依赖样本形态）
    pub fn select_path(&self, magnitudes: &[f64]) -> (SeverityPath, Option<QuartileCuts>) {
        if magnitudes.is_empty() {
            return (SeverityPath::Empty, None);
        }

        let mut sorted = magnitudes.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        if count_distinct(&sorted) == 1 {
            return (SeverityPath::SingleValue, None);
        }
        if sorted.len() < 4 {
            return (SeverityPath::MedianSplit, None);
        }
        if sorted.iter().any(|m| !m.is_finite()) {
            return (SeverityPath::RelativeToMedian, None);
        }

        let cuts = QuartileCuts {
            q25: percentile(&sorted, 0.25),
            q50: percentile(&sorted, 0.50),
            q75: percentile(&sorted, 0.75),
        };
        if cuts.is_separable() {
            (SeverityPath::Quartiles, Some(cuts))
        } else {
            (SeverityPath::RelativeToMedian, Some(cuts))
        }
    }

    /// 对量级序列分级, 输出与输入一一对应
    pub fn classify(&self, magnitudes: &[f64]) -> Vec<Severity> {
        let (path, cuts) = self.select_path(magnitudes);
        debug!(path = ?path, samples = magnitudes.len(), "严重度分级分支");

        let mut sorted = magnitudes.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        match (path, cuts) {
            (SeverityPath::Empty, _) => Vec::new(),
            (SeverityPath::SingleValue, _) => vec![Severity::Medium; magnitudes.len()],
            (SeverityPath::MedianSplit, _) => {
                let med = median(&sorted);
                magnitudes
                    .iter()
                    .map(|&m| if m > med { Severity::Critical } else { Severity::Low })
                    .collect()
            }
            (SeverityPath::Quartiles, Some(cuts)) => {
                magnitudes.iter().map(|&m| cuts.label(m)).collect()
            }
            _ => {
                let med = median(&sorted);
                magnitudes
                    .iter()
                    .map(|&m| {
                        if m > HIGH_MEDIAN_MULTIPLIER * med {
                            Severity::High
                        } else if m > med {
                            Severity::Medium
                        } else {
                            Severity::Low
                        }
                    })
                    .collect()
            }
        }
    }

    /// 为托盘汇总填充 severity
    pub fn apply(&self, summaries: &mut [PalletSummary]) -> SeverityPath {
        let magnitudes: Vec<f64> = summaries.iter().map(|s| s.magnitude()).collect();
        let (path, _) = self.select_path(&magnitudes);
        let labels = self.classify(&magnitudes);
        for (summary, label) in summaries.iter_mut().zip(labels) {
            summary.severity = Some(label);
        }
        path
    }
}
