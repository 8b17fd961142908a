// ==========================================
// 负库存分析系统 - 时间透视引擎
// ==========================================
// 长表 → 宽表
// 行索引: (code, name, pallet_id, warehouse), 升序
// 列: 全部不同 report_date, 严格升序
// 值: negative_quantity, 同一 索引+日期 重复时取规范表中的第一行
// ==========================================

use crate::domain::inventory::{CanonicalRecord, PivotKey, PivotMatrix, PivotRow};
use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub struct PivotBuilder {
    // 无状态引擎
}

impl Default for PivotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PivotBuilder {
    pub fn new() -> Self {
        Self {}
    }

    pub fn build(&self, records: &[CanonicalRecord]) -> PivotMatrix {
        let dates: Vec<NaiveDate> = records
            .iter()
            .map(|r| r.report_date)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut rows: BTreeMap<PivotKey, Vec<Option<f64>>> = BTreeMap::new();
        let mut duplicates = 0usize;

        for record in records {
            // dates 由 records 构造, 必然命中
            let Ok(col) = dates.binary_search(&record.report_date) else {
                continue;
            };
            let cells = rows
                .entry(PivotKey::from_record(record))
                .or_insert_with(|| vec![None; dates.len()]);

            match cells[col] {
                Some(_) => duplicates += 1,
                None => cells[col] = Some(record.negative_quantity),
            }
        }

        if duplicates > 0 {
            debug!(duplicates = duplicates, "同一快照内的重复行, 保留首行");
        }

        PivotMatrix {
            dates,
            rows: rows
                .into_iter()
                .map(|(key, cells)| PivotRow { key, cells })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    fn record(code: &str, pallet: &str, qty: f64, day: u32) -> CanonicalRecord {
        CanonicalRecord::new(
            code.to_string(),
            pallet.to_string(),
            "n".to_string(),
            "ALM01".to_string(),
            qty,
            date(day),
            "t".to_string(),
        )
    }

    #[test]
    fn test_dates_sorted_and_cells_sparse() {
        let records = vec![
            record("B", "P2", -3.0, 9),
            record("A", "P1", -1.0, 2),
            record("A", "P1", -2.0, 9),
        ];
        let matrix = PivotBuilder::new().build(&records);

        assert_eq!(matrix.dates, vec![date(2), date(9)]);
        assert_eq!(matrix.rows.len(), 2);
        assert_eq!(matrix.rows[0].key.code, "A");
        assert_eq!(matrix.rows[0].cells, vec![Some(-1.0), Some(-2.0)]);
        assert_eq!(matrix.rows[1].cells, vec![None, Some(-3.0)]);
    }

    #[test]
    fn test_first_row_wins_on_duplicates() {
        let records = vec![
            record("A", "P1", -5.0, 1),
            record("A", "P1", -7.0, 1),
        ];
        let matrix = PivotBuilder::new().build(&records);

        assert_eq!(matrix.rows.len(), 1);
        assert_eq!(matrix.rows[0].cells, vec![Some(-5.0)]);
    }

    #[test]
    fn test_empty_table() {
        let matrix = PivotBuilder::new().build(&[]);
        assert!(matrix.dates.is_empty());
        assert!(matrix.rows.is_empty());
    }
}
