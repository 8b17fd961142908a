// ==========================================
// 负库存分析系统 - 列归一器实现
// ==========================================
// 阶段 1: 源列名 → 规范列 + 类型转换 + 负值过滤
// 别名表: importer::column_alias（入口处一次性解析）
// ==========================================

use crate::domain::report::NormalizationDiagnostics;
use crate::importer::column_alias::{self, CanonicalColumn, QUANTITY_FALLBACK_COLUMNS};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::ColumnNormalizer;
use crate::importer::raw_table::RawTable;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// 仓库列缺失时的默认值
pub const DEFAULT_WAREHOUSE: &str = "N/A";

// ==========================================
// Coerced - 宽松数值转换结果
// ==========================================
// 无法解析的值按 0 处理（随后被负值过滤移除）, 但计入诊断
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Valid(f64),
    Invalid,
}

impl Coerced {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Coerced::Valid(v),
            _ => Coerced::Invalid,
        }
    }

    pub fn value_or_zero(&self) -> f64 {
        match self {
            Coerced::Valid(v) => *v,
            Coerced::Invalid => 0.0,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Coerced::Invalid)
    }
}

/// 标准化编码类字段
///
/// 去千分位逗号, 丢弃表格自动转型带来的小数部分, 去首尾空白
/// 例: "10,023.0" → "10023"
pub fn normalize_identifier(raw: &str) -> String {
    let without_commas = raw.replace(',', "");
    without_commas
        .split('.')
        .next()
        .unwrap_or("")
        .trim()
        .to_string()
}

// ==========================================
// NormalizedRow / NormalizedTable
// ==========================================
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub code: String,
    pub pallet_id: String,
    pub name: String,
    pub warehouse: String,
    pub quantity: f64,                   // 严格小于 0
    pub report_date_raw: Option<String>, // 行级日期（数据库来源）
    pub source_file_raw: Option<String>, // 行级来源（数据库来源）
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedTable {
    pub rows: Vec<NormalizedRow>,
    pub diagnostics: NormalizationDiagnostics,
}

// ==========================================
// FieldMapper - 列归一器
// ==========================================
pub struct FieldMapper;

impl FieldMapper {
    /// 解析表头 → 规范列的列索引
    ///
    /// 同一规范列对应多个源列时, 源列顺序中最后一个生效
    fn resolve_columns(&self, headers: &[String]) -> BTreeMap<CanonicalColumn, usize> {
        let mut columns = BTreeMap::new();
        for (idx, header) in headers.iter().enumerate() {
            if let Some(target) = column_alias::lookup(header) {
                columns.insert(target, idx);
            }
        }

        // 数量列回退
        if !columns.contains_key(&CanonicalColumn::Quantity) {
            let fallback = QUANTITY_FALLBACK_COLUMNS.iter().find_map(|alt| {
                headers.iter().position(|h| h.trim() == *alt)
            });
            if let Some(idx) = fallback {
                debug!(column = %headers[idx], "使用回退数量列");
                columns.insert(CanonicalColumn::Quantity, idx);
            }
        }

        columns
    }

    fn text_or(table: &RawTable, row: usize, col: Option<usize>, default: &str) -> String {
        match col {
            Some(c) => {
                let value = table.cell(row, c).trim();
                if value.is_empty() {
                    default.to_string()
                } else {
                    value.to_string()
                }
            }
            None => default.to_string(),
        }
    }

    fn optional_text(table: &RawTable, row: usize, col: Option<usize>) -> Option<String> {
        col.map(|c| table.cell(row, c).trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl ColumnNormalizer for FieldMapper {
    fn normalize(&self, table: &RawTable) -> ImportResult<NormalizedTable> {
        let columns = self.resolve_columns(&table.headers);

        let missing: Vec<String> = [
            CanonicalColumn::Code,
            CanonicalColumn::PalletId,
            CanonicalColumn::Quantity,
        ]
        .iter()
        .filter(|c| !columns.contains_key(c))
        .map(|c| c.as_str().to_string())
        .collect();

        if !missing.is_empty() {
            return Err(ImportError::SchemaMismatch { missing });
        }

        let code_col = columns[&CanonicalColumn::Code];
        let pallet_col = columns[&CanonicalColumn::PalletId];
        let qty_col = columns[&CanonicalColumn::Quantity];
        let name_col = columns.get(&CanonicalColumn::Name).copied();
        let warehouse_col = columns.get(&CanonicalColumn::Warehouse).copied();
        let date_col = columns.get(&CanonicalColumn::ReportDate).copied();
        let source_col = columns.get(&CanonicalColumn::SourceFile).copied();

        let mut diagnostics = NormalizationDiagnostics {
            rows_in: table.len(),
            ..Default::default()
        };
        let mut rows = Vec::new();

        for row in 0..table.len() {
            let quantity = Coerced::parse(table.cell(row, qty_col));
            if quantity.is_invalid() {
                diagnostics.invalid_quantity += 1;
                continue;
            }

            let value = quantity.value_or_zero();
            if value >= 0.0 {
                diagnostics.non_negative_dropped += 1;
                continue;
            }

            rows.push(NormalizedRow {
                code: normalize_identifier(table.cell(row, code_col)),
                pallet_id: normalize_identifier(table.cell(row, pallet_col)),
                name: Self::text_or(table, row, name_col, ""),
                warehouse: Self::text_or(table, row, warehouse_col, DEFAULT_WAREHOUSE),
                quantity: value,
                report_date_raw: Self::optional_text(table, row, date_col),
                source_file_raw: Self::optional_text(table, row, source_col),
            });
        }

        diagnostics.rows_kept = rows.len();

        if diagnostics.invalid_quantity > 0 {
            warn!(
                invalid = diagnostics.invalid_quantity,
                rows_in = diagnostics.rows_in,
                "数量无法解析, 按 0 处理并过滤"
            );
        }

        Ok(NormalizedTable { rows, diagnostics })
    }
}
