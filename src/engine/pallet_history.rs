// ==========================================
// 负库存分析系统 - 托盘历史聚合引擎
// ==========================================
// 输入: 规范表 (全部快照)
// 输出: 每个 unique_pallet_key 一行 PalletSummary
// 说明: severity / state / criticality_score 由下游引擎填充
// ==========================================

use crate::domain::inventory::{CanonicalRecord, PalletSummary};
use crate::domain::types::PalletState;
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

struct Accumulator<'a> {
    first: &'a CanonicalRecord,
    dates: BTreeSet<NaiveDate>,
    rows: usize,
    sum: f64,
    min: f64,
    max: f64,
}

impl<'a> Accumulator<'a> {
    fn new(first: &'a CanonicalRecord) -> Self {
        Self {
            first,
            dates: BTreeSet::new(),
            rows: 0,
            sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn push(&mut self, record: &CanonicalRecord) {
        self.dates.insert(record.report_date);
        self.rows += 1;
        self.sum += record.negative_quantity;
        self.min = self.min.min(record.negative_quantity);
        self.max = self.max.max(record.negative_quantity);
    }

    fn finish(self, key: String) -> Option<PalletSummary> {
        let first_seen = *self.dates.iter().next()?;
        let last_seen = *self.dates.iter().next_back()?;
        let days_span = (last_seen - first_seen).num_days() + 1;

        Some(PalletSummary {
            unique_pallet_key: key,
            code: self.first.code.clone(),
            name: self.first.name.clone(),
            pallet_id: self.first.pallet_id.clone(),
            warehouse: self.first.warehouse.clone(),
            first_seen,
            last_seen,
            occurrence_count: self.dates.len(),
            days_span,
            mean_qty: self.sum / self.rows as f64,
            min_qty: self.min,
            max_qty: self.max,
            sum_qty: self.sum,
            severity: None,
            state: PalletState::Resolved,
            criticality_score: 0.0,
        })
    }
}

// ==========================================
// PalletHistoryAggregator - 托盘历史聚合
// ==========================================
pub struct PalletHistoryAggregator {
    // 无状态引擎
}

impl Default for PalletHistoryAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl PalletHistoryAggregator {
    pub fn new() -> Self {
        Self {}
    }

    /// 按 unique_pallet_key 聚合
    ///
    /// - 身份字段取规范表中的首次出现行
    /// - occurrence_count 统计不同报告日期数（同日重复行只计一次）
    /// - 数量统计基于全部行
    /// - 结果按 unique_pallet_key 升序
    pub fn aggregate(&self, records: &[CanonicalRecord]) -> Vec<PalletSummary> {
        let mut groups: BTreeMap<&str, Accumulator> = BTreeMap::new();
        for record in records {
            groups
                .entry(record.unique_pallet_key.as_str())
                .or_insert_with(|| Accumulator::new(record))
                .push(record);
        }

        groups
            .into_iter()
            .filter_map(|(key, acc)| acc.finish(key.to_string()))
            .collect()
    }

    /// 数据集中最大的报告日期
    pub fn latest_report_date(records: &[CanonicalRecord]) -> Option<NaiveDate> {
        records.iter().map(|r| r.report_date).max()
    }
}
