// ==========================================
// 负库存分析系统 - 导入报告与分析结果
// ==========================================
// 职责: 批次级导入报告（逐文件成功/失败及原因）
//       规范化诊断计数（宽松类型转换不再静默丢失）
//       一次分析运行的全部产出
// ==========================================

use crate::domain::inventory::{CanonicalRecord, PalletSummary, PivotMatrix, RecurrenceRecord};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// NormalizationDiagnostics - 规范化诊断
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NormalizationDiagnostics {
    pub rows_in: usize,              // 输入行数（已跳过全空行）
    pub rows_kept: usize,            // 进入规范表的行数
    pub non_negative_dropped: usize, // 数量 >= 0 被过滤
    pub invalid_quantity: usize,     // 数量无法解析（按 0 处理，随后被过滤）
    pub invalid_date: usize,         // 行级报告日期无法解析（仅数据库来源）
}

impl NormalizationDiagnostics {
    pub fn merge(&mut self, other: &NormalizationDiagnostics) {
        self.rows_in += other.rows_in;
        self.rows_kept += other.rows_kept;
        self.non_negative_dropped += other.non_negative_dropped;
        self.invalid_quantity += other.invalid_quantity;
        self.invalid_date += other.invalid_date;
    }
}

// ==========================================
// FileOutcome - 单文件导入结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileOutcome {
    pub source_file: String,
    pub succeeded: bool,
    pub rows: usize,                     // 产出的规范行数
    pub report_date: Option<NaiveDate>,  // 文件级报告日期（数据库来源为 None）
    pub date_fallback: bool,             // 文件名无日期, 使用处理当日
    pub error: Option<String>,           // 失败原因
    pub diagnostics: NormalizationDiagnostics,
}

impl FileOutcome {
    pub fn failed(source_file: &str, error: String) -> Self {
        Self {
            source_file: source_file.to_string(),
            succeeded: false,
            rows: 0,
            report_date: None,
            date_fallback: false,
            error: Some(error),
            diagnostics: NormalizationDiagnostics::default(),
        }
    }
}

// ==========================================
// IngestReport - 批次导入报告
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    pub batch_id: String,
    pub outcomes: Vec<FileOutcome>, // 与输入顺序一致
}

impl IngestReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded)
    }

    pub fn failed(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded)
    }

    pub fn success_count(&self) -> usize {
        self.succeeded().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed().count()
    }

    /// 使用了日期回退的文件（数据质量警告）
    pub fn date_fallbacks(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.succeeded && o.date_fallback)
            .map(|o| o.source_file.as_str())
            .collect()
    }

    /// 全部成功文件的诊断汇总
    pub fn total_diagnostics(&self) -> NormalizationDiagnostics {
        let mut total = NormalizationDiagnostics::default();
        for outcome in self.succeeded() {
            total.merge(&outcome.diagnostics);
        }
        total
    }
}

// ==========================================
// AnalysisResult - 一次分析运行的产出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub canonical: Vec<CanonicalRecord>,
    pub summaries: Vec<PalletSummary>,
    pub pivot: PivotMatrix,
    pub recurrences: Vec<RecurrenceRecord>,
    pub latest_report_date: Option<NaiveDate>,
    pub ingest_report: IngestReport,
}
