// ==========================================
// 负库存分析系统 - 复发检测引擎
// ==========================================
// 对每个 unique_pallet_key 取去重后升序的出现日期
// 不足 2 个日期 → 不可能复发
// 任一相邻间隔 > gap_days → 复发（至少缺席一次快照后再次出现）
// gap_days 由配置给出, 默认按日快照取 1
// ==========================================

use crate::domain::inventory::{CanonicalRecord, RecurrenceRecord};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

/// 默认快照周期（天）
pub const DEFAULT_RECURRENCE_GAP_DAYS: i64 = 1;

pub struct RecurrenceDetector {
    gap_days: i64,
}

impl Default for RecurrenceDetector {
    fn default() -> Self {
        Self::new(DEFAULT_RECURRENCE_GAP_DAYS)
    }
}

impl RecurrenceDetector {
    /// # 参数
    /// - gap_days: 允许的最大相邻间隔（天）, 小于 1 时按 1 处理
    pub fn new(gap_days: i64) -> Self {
        Self {
            gap_days: gap_days.max(1),
        }
    }

    pub fn gap_days(&self) -> i64 {
        self.gap_days
    }

    /// 相邻日期的最大间隔（天）; 日期不足 2 个返回 None
    pub fn max_gap(dates: &[NaiveDate]) -> Option<i64> {
        dates
            .windows(2)
            .map(|w| (w[1] - w[0]).num_days())
            .max()
    }

    /// 结果按 unique_pallet_key 升序
    pub fn detect(&self, records: &[CanonicalRecord]) -> Vec<RecurrenceRecord> {
        let mut groups: BTreeMap<&str, (&CanonicalRecord, BTreeSet<NaiveDate>)> = BTreeMap::new();
        for record in records {
            groups
                .entry(record.unique_pallet_key.as_str())
                .or_insert_with(|| (record, BTreeSet::new()))
                .1
                .insert(record.report_date);
        }

        groups
            .into_iter()
            .filter_map(|(key, (first, dates))| {
                let dates: Vec<NaiveDate> = dates.into_iter().collect();
                let max_gap = Self::max_gap(&dates)?;
                if max_gap <= self.gap_days {
                    return None;
                }
                Some(RecurrenceRecord {
                    unique_pallet_key: key.to_string(),
                    code: first.code.clone(),
                    name: first.name.clone(),
                    warehouse: first.warehouse.clone(),
                    dates,
                    max_gap_days: max_gap,
                })
            })
            .collect()
    }
}
