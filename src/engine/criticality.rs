// ==========================================
// 负库存分析系统 - 关键度评分与状态判定
// ==========================================
// state: last_seen == 全数据集最大 report_date → Active, 否则 Resolved
//        单一全局阈值, 不按仓库/托盘区分
// score: days_span × |mean_qty| (乘法形式, 与历史报表保持一致)
// ==========================================

use crate::domain::inventory::PalletSummary;
use crate::domain::types::PalletState;
use chrono::NaiveDate;

pub struct CriticalityScorer {
    // 无状态引擎
}

impl Default for CriticalityScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl CriticalityScorer {
    pub fn new() -> Self {
        Self {}
    }

    /// 关键度评分
    pub fn score(&self, days_span: i64, mean_qty: f64) -> f64 {
        days_span as f64 * mean_qty.abs()
    }

    /// 状态判定
    pub fn resolve_state(&self, last_seen: NaiveDate, latest_report_date: NaiveDate) -> PalletState {
        if last_seen == latest_report_date {
            PalletState::Active
        } else {
            PalletState::Resolved
        }
    }

    /// 为托盘汇总填充 state 与 criticality_score
    pub fn apply(&self, summaries: &mut [PalletSummary], latest_report_date: NaiveDate) {
        for summary in summaries.iter_mut() {
            summary.state = self.resolve_state(summary.last_seen, latest_report_date);
            summary.criticality_score = self.score(summary.days_span, summary.mean_qty);
        }
    }
}
