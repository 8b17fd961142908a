// ==========================================
// 负库存分析系统 - 视图过滤与排名
// ==========================================
// 职责: 在分析结果之上做事后过滤（不回写分析结果）
// - 托盘汇总: 仓库 / 严重度 / 状态 多选过滤
// - Top N: 按关键度评分降序
// - 看板指标: 托盘数、活跃数、平均持续天数、负值合计、严重度分布
// - 透视表: 日期窗口、仅活跃、编码包含/排除/搜索
// ==========================================

use crate::domain::inventory::{PalletSummary, PivotMatrix};
use crate::domain::types::{PalletState, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ==========================================
// SummaryFilter - 托盘汇总过滤条件
// ==========================================
// 各维度内为"或", 维度之间为"与"; 空集合表示不过滤该维度
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryFilter {
    #[serde(default)]
    pub warehouses: Vec<String>,
    #[serde(default)]
    pub severities: Vec<Severity>,
    #[serde(default)]
    pub states: Vec<PalletState>,
}

impl SummaryFilter {
    pub fn is_empty(&self) -> bool {
        self.warehouses.is_empty() && self.severities.is_empty() && self.states.is_empty()
    }

    pub fn matches(&self, summary: &PalletSummary) -> bool {
        let warehouse_ok =
            self.warehouses.is_empty() || self.warehouses.iter().any(|w| w == &summary.warehouse);
        // 未分级的托盘只在不过滤严重度时出现
        let severity_ok = self.severities.is_empty()
            || summary
                .severity
                .map_or(false, |s| self.severities.contains(&s));
        let state_ok = self.states.is_empty() || self.states.contains(&summary.state);

        warehouse_ok && severity_ok && state_ok
    }

    pub fn apply(&self, summaries: &[PalletSummary]) -> Vec<PalletSummary> {
        summaries
            .iter()
            .filter(|s| self.matches(s))
            .cloned()
            .collect()
    }
}

/// 按关键度评分降序取前 N（评分相同按 unique_pallet_key 升序）
pub fn top_n(summaries: &[PalletSummary], n: usize) -> Vec<PalletSummary> {
    let mut ranked: Vec<&PalletSummary> = summaries.iter().collect();
    ranked.sort_by(|a, b| {
        b.criticality_score
            .total_cmp(&a.criticality_score)
            .then_with(|| a.unique_pallet_key.cmp(&b.unique_pallet_key))
    });
    ranked.into_iter().take(n).cloned().collect()
}

/// 按状态拆分（活跃, 已解决）
pub fn split_by_state(summaries: &[PalletSummary]) -> (Vec<PalletSummary>, Vec<PalletSummary>) {
    summaries.iter().cloned().partition(|s| s.is_active())
}

// ==========================================
// HeadlineMetrics - 看板指标
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeadlineMetrics {
    pub total_pallets: usize,
    pub active_pallets: usize,
    pub resolved_pallets: usize,
    pub mean_days_span: f64,
    pub total_negative_quantity: f64,
    pub severity_distribution: BTreeMap<Severity, usize>,
}

impl HeadlineMetrics {
    pub fn compute(summaries: &[PalletSummary]) -> Self {
        let total = summaries.len();
        let active = summaries.iter().filter(|s| s.is_active()).count();
        let mean_days_span = if total == 0 {
            0.0
        } else {
            summaries.iter().map(|s| s.days_span as f64).sum::<f64>() / total as f64
        };

        let mut severity_distribution: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        for severity in summaries.iter().filter_map(|s| s.severity) {
            *severity_distribution.entry(severity).or_insert(0) += 1;
        }

        Self {
            total_pallets: total,
            active_pallets: active,
            resolved_pallets: total - active,
            mean_days_span,
            total_negative_quantity: summaries.iter().map(|s| s.sum_qty).sum(),
            severity_distribution,
        }
    }
}

// ==========================================
// PivotFilter - 透视表视图条件
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PivotFilter {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    #[serde(default)]
    pub only_active: bool,
    #[serde(default)]
    pub include_codes: Vec<String>,
    #[serde(default)]
    pub exclude_codes: Vec<String>,
    pub code_search: Option<String>,
}

impl PivotFilter {
    /// 依次应用: 日期窗口 → 仅活跃（窗口内最后一列）→ 编码条件
    pub fn apply(&self, matrix: &PivotMatrix) -> PivotMatrix {
        let mut view = if self.date_from.is_some() || self.date_to.is_some() {
            matrix.slice_dates(self.date_from, self.date_to)
        } else {
            matrix.clone()
        };

        if self.only_active {
            view = view.only_present_on_last_date();
        }

        let search = self
            .code_search
            .as_deref()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());

        if self.include_codes.is_empty() && self.exclude_codes.is_empty() && search.is_none() {
            return view;
        }

        view.retain_rows(|row| {
            let code = &row.key.code;
            (self.include_codes.is_empty() || self.include_codes.contains(code))
                && !self.exclude_codes.contains(code)
                && search
                    .as_ref()
                    .map_or(true, |needle| code.to_lowercase().contains(needle))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::{PivotKey, PivotRow};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 4, d).unwrap()
    }

    fn summary(key: &str, warehouse: &str, score: f64, state: PalletState, sev: Severity) -> PalletSummary {
        PalletSummary {
            unique_pallet_key: key.to_string(),
            code: key.to_string(),
            name: String::new(),
            pallet_id: "P".to_string(),
            warehouse: warehouse.to_string(),
            first_seen: date(1),
            last_seen: date(2),
            occurrence_count: 2,
            days_span: 2,
            mean_qty: -score / 2.0,
            min_qty: -score / 2.0,
            max_qty: -score / 2.0,
            sum_qty: -score,
            severity: Some(sev),
            state,
            criticality_score: score,
        }
    }

    fn sample() -> Vec<PalletSummary> {
        vec![
            summary("A", "ALM01", 10.0, PalletState::Active, Severity::High),
            summary("B", "ALM02", 30.0, PalletState::Resolved, Severity::Critical),
            summary("C", "ALM01", 30.0, PalletState::Active, Severity::Critical),
            summary("D", "ALM02", 2.0, PalletState::Active, Severity::Low),
        ]
    }

    #[test]
    fn test_filter_dimensions_combine() {
        let filter = SummaryFilter {
            warehouses: vec!["ALM01".to_string()],
            severities: vec![Severity::Critical, Severity::High],
            states: vec![PalletState::Active],
        };
        let kept = filter.apply(&sample());
        let keys: Vec<&str> = kept.iter().map(|s| s.unique_pallet_key.as_str()).collect();
        assert_eq!(keys, vec!["A", "C"]);

        assert_eq!(SummaryFilter::default().apply(&sample()).len(), 4);
    }

    #[test]
    fn test_top_n_descending_with_key_tiebreak() {
        let top = top_n(&sample(), 3);
        let keys: Vec<&str> = top.iter().map(|s| s.unique_pallet_key.as_str()).collect();
        assert_eq!(keys, vec!["B", "C", "A"]);
        assert_eq!(top_n(&sample(), 10).len(), 4);
    }

    #[test]
    fn test_headline_metrics() {
        let metrics = HeadlineMetrics::compute(&sample());
        assert_eq!(metrics.total_pallets, 4);
        assert_eq!(metrics.active_pallets, 3);
        assert_eq!(metrics.resolved_pallets, 1);
        assert_eq!(metrics.mean_days_span, 2.0);
        assert_eq!(metrics.total_negative_quantity, -72.0);
        assert_eq!(metrics.severity_distribution[&Severity::Critical], 2);
        assert_eq!(metrics.severity_distribution[&Severity::Medium], 0);
    }

    #[test]
    fn test_split_by_state() {
        let (active, resolved) = split_by_state(&sample());
        assert_eq!(active.len(), 3);
        assert_eq!(resolved.len(), 1);
    }

    #[test]
    fn test_pivot_filter_code_conditions() {
        let row = |code: &str, cells: Vec<Option<f64>>| PivotRow {
            key: PivotKey {
                code: code.to_string(),
                name: String::new(),
                pallet_id: "P".to_string(),
                warehouse: "N/A".to_string(),
            },
            cells,
        };
        let matrix = PivotMatrix {
            dates: vec![date(1), date(2)],
            rows: vec![
                row("1001", vec![Some(-1.0), Some(-1.0)]),
                row("1002", vec![Some(-2.0), None]),
                row("2001", vec![None, Some(-3.0)]),
            ],
        };

        let filter = PivotFilter {
            only_active: true,
            exclude_codes: vec!["2001".to_string()],
            ..Default::default()
        };
        let view = filter.apply(&matrix);
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].key.code, "1001");

        let search = PivotFilter {
            code_search: Some("100".to_string()),
            date_to: Some(date(1)),
            ..Default::default()
        };
        let view = search.apply(&matrix);
        assert_eq!(view.dates, vec![date(1)]);
        assert_eq!(view.rows.len(), 2);
    }
}
