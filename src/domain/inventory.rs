// ==========================================
// 负库存分析系统 - 库存分析实体
// ==========================================
// 规范表 (CanonicalRecord): 每个 产品-托盘-日期 观测一行
// 托盘汇总 (PalletSummary): 每个 unique_pallet_key 一行, 每次分析全量重算
// 时间透视 (PivotMatrix): 宽表, 每个报告日期一列
// 复发记录 (RecurrenceRecord): 出现日期之间存在断档的托盘
// ==========================================

use crate::domain::types::{PalletState, Severity};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 托盘唯一键: `code + "_" + pallet_id`
pub fn unique_pallet_key(code: &str, pallet_id: &str) -> String {
    format!("{}_{}", code, pallet_id)
}

// ==========================================
// CanonicalRecord - 规范化观测记录
// ==========================================
// 不变量: negative_quantity < 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub code: String,              // 产品编码（已标准化）
    pub pallet_id: String,         // 托盘号（已标准化）
    pub unique_pallet_key: String, // code_pallet_id
    pub name: String,              // 产品描述，缺省 ""
    pub warehouse: String,         // 仓库，缺省 "N/A"
    pub negative_quantity: f64,    // 严格小于 0
    pub report_date: NaiveDate,    // 快照日期
    pub source_file: String,       // 来源文件（仅审计）
}

impl CanonicalRecord {
    pub fn new(
        code: String,
        pallet_id: String,
        name: String,
        warehouse: String,
        negative_quantity: f64,
        report_date: NaiveDate,
        source_file: String,
    ) -> Self {
        let unique_pallet_key = unique_pallet_key(&code, &pallet_id);
        Self {
            code,
            pallet_id,
            unique_pallet_key,
            name,
            warehouse,
            negative_quantity,
            report_date,
            source_file,
        }
    }
}

// ==========================================
// PalletSummary - 托盘历史汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PalletSummary {
    pub unique_pallet_key: String,

    // 身份字段（取首次出现）
    pub code: String,
    pub name: String,
    pub pallet_id: String,
    pub warehouse: String,

    // 时间跨度
    pub first_seen: NaiveDate,
    pub last_seen: NaiveDate,
    pub occurrence_count: usize, // 出现的不同快照日期数
    pub days_span: i64,          // (last_seen - first_seen).days + 1, 恒 >= 1

    // 数量统计（基于全部行）
    pub mean_qty: f64,
    pub min_qty: f64,
    pub max_qty: f64,
    pub sum_qty: f64,

    // 派生字段
    pub severity: Option<Severity>,
    pub state: PalletState,
    pub criticality_score: f64,
}

impl PalletSummary {
    /// 平均负值的绝对量级
    pub fn magnitude(&self) -> f64 {
        self.mean_qty.abs()
    }

    pub fn is_active(&self) -> bool {
        self.state == PalletState::Active
    }
}

// ==========================================
// PivotMatrix - 时间演变宽表
// ==========================================
/// 透视表行索引 (code, name, pallet_id, warehouse)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PivotKey {
    pub code: String,
    pub name: String,
    pub pallet_id: String,
    pub warehouse: String,
}

impl PivotKey {
    pub fn from_record(record: &CanonicalRecord) -> Self {
        Self {
            code: record.code.clone(),
            name: record.name.clone(),
            pallet_id: record.pallet_id.clone(),
            warehouse: record.warehouse.clone(),
        }
    }

    pub fn unique_pallet_key(&self) -> String {
        unique_pallet_key(&self.code, &self.pallet_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PivotRow {
    pub key: PivotKey,
    pub cells: Vec<Option<f64>>, // 与 PivotMatrix::dates 一一对应
}

impl PivotRow {
    /// 最后一个日期列上的取值
    pub fn last_cell(&self) -> Option<f64> {
        self.cells.last().copied().flatten()
    }
}

/// 身份列名（日期列之前，顺序固定）
pub const PIVOT_IDENTITY_COLUMNS: [&str; 4] = ["Codigo", "Nombre", "ID_Pallet", "Almacen"];

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PivotMatrix {
    pub dates: Vec<NaiveDate>, // 严格升序
    pub rows: Vec<PivotRow>,   // 按 PivotKey 升序
}

impl PivotMatrix {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// 总列数 = 身份列 + 日期列
    pub fn column_count(&self) -> usize {
        PIVOT_IDENTITY_COLUMNS.len() + self.dates.len()
    }

    /// 列头（身份列在前，日期列按时间升序）
    pub fn column_headers(&self) -> Vec<String> {
        PIVOT_IDENTITY_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.dates.iter().map(|d| d.format("%Y-%m-%d").to_string()))
            .collect()
    }

    /// 日期窗口 [from, to]（闭区间, 任一端可省略）
    ///
    /// 窗口内无任何取值的行被移除
    pub fn slice_dates(&self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> PivotMatrix {
        let keep: Vec<usize> = self
            .dates
            .iter()
            .enumerate()
            .filter(|(_, d)| from.map_or(true, |f| **d >= f) && to.map_or(true, |t| **d <= t))
            .map(|(i, _)| i)
            .collect();

        let rows = self
            .rows
            .iter()
            .map(|row| PivotRow {
                key: row.key.clone(),
                cells: keep.iter().map(|&i| row.cells[i]).collect(),
            })
            .filter(|row| row.cells.iter().any(Option::is_some))
            .collect();

        PivotMatrix {
            dates: keep.iter().map(|&i| self.dates[i]).collect(),
            rows,
        }
    }

    /// 仅保留在最后一个日期列仍有取值的行（仍处于负库存的托盘）
    pub fn only_present_on_last_date(&self) -> PivotMatrix {
        PivotMatrix {
            dates: self.dates.clone(),
            rows: self
                .rows
                .iter()
                .filter(|row| row.last_cell().is_some())
                .cloned()
                .collect(),
        }
    }

    /// 按行过滤（列保持不变）
    pub fn retain_rows<F>(&self, predicate: F) -> PivotMatrix
    where
        F: Fn(&PivotRow) -> bool,
    {
        PivotMatrix {
            dates: self.dates.clone(),
            rows: self.rows.iter().filter(|row| predicate(row)).cloned().collect(),
        }
    }
}

// ==========================================
// RecurrenceRecord - 复发记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurrenceRecord {
    pub unique_pallet_key: String,
    pub code: String,
    pub name: String,
    pub warehouse: String,
    pub dates: Vec<NaiveDate>, // 去重后升序
    pub max_gap_days: i64,     // 最大相邻间隔
}

impl RecurrenceRecord {
    /// 日期列表（dd-mm-YYYY, 逗号分隔, 时间升序）
    pub fn formatted_dates(&self) -> String {
        self.dates
            .iter()
            .map(|d| d.format("%d-%m-%Y").to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_unique_key_concatenation() {
        let record = CanonicalRecord::new(
            "1234".to_string(),
            "P1".to_string(),
            "".to_string(),
            "N/A".to_string(),
            -3.0,
            date(2025, 10, 21),
            "a.xlsx".to_string(),
        );
        assert_eq!(record.unique_pallet_key, "1234_P1");
    }

    #[test]
    fn test_pivot_headers_identity_first() {
        let matrix = PivotMatrix {
            dates: vec![date(2025, 1, 1), date(2025, 1, 3)],
            rows: vec![],
        };
        assert_eq!(
            matrix.column_headers(),
            vec!["Codigo", "Nombre", "ID_Pallet", "Almacen", "2025-01-01", "2025-01-03"]
        );
        assert_eq!(matrix.column_count(), 6);
    }

    fn pivot_row(code: &str, cells: Vec<Option<f64>>) -> PivotRow {
        PivotRow {
            key: PivotKey {
                code: code.to_string(),
                name: String::new(),
                pallet_id: "P1".to_string(),
                warehouse: "N/A".to_string(),
            },
            cells,
        }
    }

    #[test]
    fn test_pivot_views_do_not_mutate_source() {
        let matrix = PivotMatrix {
            dates: vec![date(2025, 1, 1), date(2025, 1, 2), date(2025, 1, 3)],
            rows: vec![
                pivot_row("A", vec![Some(-1.0), None, None]),
                pivot_row("B", vec![None, Some(-2.0), Some(-3.0)]),
            ],
        };

        let sliced = matrix.slice_dates(Some(date(2025, 1, 2)), None);
        assert_eq!(sliced.dates, vec![date(2025, 1, 2), date(2025, 1, 3)]);
        assert_eq!(sliced.rows.len(), 1);
        assert_eq!(sliced.rows[0].key.code, "B");

        let active = matrix.only_present_on_last_date();
        assert_eq!(active.rows.len(), 1);
        assert_eq!(active.rows[0].key.code, "B");

        assert_eq!(matrix.rows.len(), 2);
        assert_eq!(matrix.dates.len(), 3);
    }

    #[test]
    fn test_recurrence_formatted_dates() {
        let record = RecurrenceRecord {
            unique_pallet_key: "A_P1".to_string(),
            code: "A".to_string(),
            name: "".to_string(),
            warehouse: "N/A".to_string(),
            dates: vec![date(2025, 1, 1), date(2025, 1, 2), date(2025, 1, 4)],
            max_gap_days: 2,
        };
        assert_eq!(record.formatted_dates(), "01-01-2025, 02-01-2025, 04-01-2025");
    }
}
