// ==========================================
// 负库存分析系统 - 快照导入器
// ==========================================
// 职责: 单个快照 (文件 或 数据库行集) → 规范行 + 报告日期/来源标记
// 流程: 解析 → 列归一 → 日期标记
// 约定: 单文件失败返回 FileOutcome::failed, 不向上抛出
// ==========================================

use crate::domain::inventory::CanonicalRecord;
use crate::domain::report::{FileOutcome, IngestReport};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{FieldMapper, NormalizedRow};
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::importer_trait::{ColumnNormalizer, TableParser};
use crate::importer::raw_table::RawTable;
use chrono::{NaiveDate, NaiveDateTime};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 数据库行集缺少来源列时使用的来源标记
pub const DATABASE_SOURCE: &str = "database";

// ==========================================
// SnapshotInput - 一个待导入的快照文件
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotInput {
    pub file_name: String,
    pub bytes: Arc<[u8]>,
}

impl SnapshotInput {
    pub fn new(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes: Arc::from(bytes.into()),
        }
    }

    /// 从磁盘读取文件
    pub fn from_path<P: AsRef<Path>>(path: P) -> ImportResult<Self> {
        let path = path.as_ref();
        let file_name = file_name_of(path);
        let bytes = std::fs::read(path)
            .map_err(|e| ImportError::parse_failure(&file_name, e.to_string()))?;
        Ok(Self::new(file_name, bytes))
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string()
}

/// 磁盘读取结果: 成功为快照内容, 失败为该文件的失败结果
pub type LoadedSnapshot = Result<SnapshotInput, FileOutcome>;

/// 逐个读取磁盘文件（目录、权限不足、文件已删除等只影响该文件）
pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Vec<LoadedSnapshot> {
    paths
        .iter()
        .map(|p| {
            let path = p.as_ref();
            SnapshotInput::from_path(path).map_err(|e| {
                warn!(path = %path.display(), error = %e, "快照文件读取失败");
                FileOutcome::failed(&file_name_of(path), e.to_string())
            })
        })
        .collect()
}

// ==========================================
// 报告日期提取
// ==========================================

/// 从文件名提取报告日期
///
/// 去掉扩展名后按 `_` 切分, 取第一个恰为 8 位纯数字且可按 YYYYMMDD 解析的片段
pub fn extract_report_date(file_name: &str) -> Option<NaiveDate> {
    let stem = Path::new(file_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(file_name);

    stem.split('_')
        .filter(|token| token.len() == 8 && token.chars().all(|c| c.is_ascii_digit()))
        .find_map(|token| NaiveDate::parse_from_str(token, "%Y%m%d").ok())
}

/// 解析报告日期; 文件名无日期时回退为处理当日
///
/// # 返回
/// (报告日期, 是否使用了回退)
pub fn resolve_report_date(file_name: &str, today: NaiveDate) -> (NaiveDate, bool) {
    match extract_report_date(file_name) {
        Some(date) => (date, false),
        None => (today, true),
    }
}

/// 解析行级日期（数据库来源）
///
/// 支持: YYYY-MM-DD / YYYYMMDD / YYYY-MM-DD HH:MM:SS / YYYY-MM-DDTHH:MM:SS / DD-MM-YYYY
pub fn parse_row_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y%m%d"))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d-%m-%Y"))
        .ok()
}

/// 导入产出: 规范行 + 本快照的导入结果
#[derive(Debug, Clone)]
pub struct SnapshotIngestion {
    pub records: Vec<CanonicalRecord>,
    pub outcome: FileOutcome,
}

impl SnapshotIngestion {
    fn unreadable(outcome: FileOutcome) -> Self {
        Self {
            records: Vec::new(),
            outcome,
        }
    }
}

// ==========================================
// SnapshotIngestor - 快照导入器
// ==========================================
pub struct SnapshotIngestor {
    parser: Box<dyn TableParser>,
    normalizer: Box<dyn ColumnNormalizer>,
}

impl Default for SnapshotIngestor {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotIngestor {
    pub fn new() -> Self {
        Self::with_components(Box::new(UniversalFileParser), Box::new(FieldMapper))
    }

    pub fn with_components(
        parser: Box<dyn TableParser>,
        normalizer: Box<dyn ColumnNormalizer>,
    ) -> Self {
        Self { parser, normalizer }
    }

    fn to_record(row: NormalizedRow, report_date: NaiveDate, source_file: String) -> CanonicalRecord {
        CanonicalRecord::new(
            row.code,
            row.pallet_id,
            row.name,
            row.warehouse,
            row.quantity,
            report_date,
            source_file,
        )
    }

    /// 导入单个快照文件（不返回错误, 失败记录在 outcome 中）
    #[instrument(skip(self, input), fields(file = %input.file_name))]
    pub fn ingest_file(
        &self,
        input: &SnapshotInput,
        sheet_index: usize,
        today: NaiveDate,
    ) -> SnapshotIngestion {
        match self.try_ingest_file(input, sheet_index, today) {
            Ok(ingestion) => ingestion,
            Err(e) => {
                warn!(error = %e, "快照导入失败");
                SnapshotIngestion {
                    records: Vec::new(),
                    outcome: FileOutcome::failed(&input.file_name, e.to_string()),
                }
            }
        }
    }

    fn try_ingest_file(
        &self,
        input: &SnapshotInput,
        sheet_index: usize,
        today: NaiveDate,
    ) -> ImportResult<SnapshotIngestion> {
        let (report_date, date_fallback) = resolve_report_date(&input.file_name, today);
        if date_fallback {
            warn!(
                report_date = %report_date,
                "文件名中无 8 位日期, 使用处理当日作为报告日期"
            );
        }

        let table = self
            .parser
            .parse_table(&input.file_name, &input.bytes, sheet_index)?;
        let normalized = self.normalizer.normalize(&table)?;

        let records: Vec<CanonicalRecord> = normalized
            .rows
            .into_iter()
            .map(|row| Self::to_record(row, report_date, input.file_name.clone()))
            .collect();

        info!(rows = records.len(), report_date = %report_date, "快照导入完成");

        Ok(SnapshotIngestion {
            outcome: FileOutcome {
                source_file: input.file_name.clone(),
                succeeded: true,
                rows: records.len(),
                report_date: Some(report_date),
                date_fallback,
                error: None,
                diagnostics: normalized.diagnostics,
            },
            records,
        })
    }

    /// 导入数据库行集（每行自带 fecha_reporte / archivo_origen）
    ///
    /// 行级日期无法解析的行被丢弃并计入 invalid_date
    pub fn ingest_row_set(&self, table: &RawTable, identifier: &str) -> ImportResult<SnapshotIngestion> {
        let normalized = self.normalizer.normalize(table)?;
        let mut diagnostics = normalized.diagnostics;
        let mut records = Vec::with_capacity(normalized.rows.len());

        for row in normalized.rows {
            let date = row.report_date_raw.as_deref().and_then(parse_row_date);
            let Some(report_date) = date else {
                diagnostics.invalid_date += 1;
                continue;
            };
            let source_file = row
                .source_file_raw
                .clone()
                .unwrap_or_else(|| DATABASE_SOURCE.to_string());
            records.push(Self::to_record(row, report_date, source_file));
        }
        diagnostics.rows_kept = records.len();

        if diagnostics.invalid_date > 0 {
            warn!(invalid = diagnostics.invalid_date, "行级报告日期无法解析, 已丢弃");
        }

        Ok(SnapshotIngestion {
            outcome: FileOutcome {
                source_file: identifier.to_string(),
                succeeded: true,
                rows: records.len(),
                report_date: None,
                date_fallback: false,
                error: None,
                diagnostics,
            },
            records,
        })
    }

    /// 批量导入（顺序执行）
    ///
    /// # 返回
    /// - Ok: 全部成功文件的规范行（按输入顺序拼接）+ 批次报告
    /// - Err(NoValidInput): 没有任何文件成功
    pub fn ingest_batch(
        &self,
        inputs: &[SnapshotInput],
        sheet_index: usize,
        today: NaiveDate,
    ) -> ImportResult<(Vec<CanonicalRecord>, IngestReport)> {
        let ingestions = inputs
            .iter()
            .map(|input| self.ingest_file(input, sheet_index, today))
            .collect();
        collect_batch(ingestions)
    }

    /// 批量导入磁盘读取结果（顺序执行）
    ///
    /// 读取失败的文件直接计入批次报告, 其余文件照常导入
    pub fn ingest_loaded(
        &self,
        loaded: &[LoadedSnapshot],
        sheet_index: usize,
        today: NaiveDate,
    ) -> ImportResult<(Vec<CanonicalRecord>, IngestReport)> {
        let ingestions = loaded
            .iter()
            .map(|entry| match entry {
                Ok(input) => self.ingest_file(input, sheet_index, today),
                Err(outcome) => SnapshotIngestion::unreadable(outcome.clone()),
            })
            .collect();
        collect_batch(ingestions)
    }

    /// 批量导入（并发执行, 每个文件一个阻塞任务）
    ///
    /// 各文件互相独立, 结果顺序与输入一致
    pub async fn ingest_batch_concurrent(
        self: Arc<Self>,
        inputs: Vec<SnapshotInput>,
        sheet_index: usize,
        today: NaiveDate,
    ) -> ImportResult<(Vec<CanonicalRecord>, IngestReport)> {
        let loaded = inputs.into_iter().map(Ok).collect();
        self.ingest_loaded_concurrent(loaded, sheet_index, today)
            .await
    }

    /// 批量导入磁盘读取结果（并发执行）
    pub async fn ingest_loaded_concurrent(
        self: Arc<Self>,
        loaded: Vec<LoadedSnapshot>,
        sheet_index: usize,
        today: NaiveDate,
    ) -> ImportResult<(Vec<CanonicalRecord>, IngestReport)> {
        let tasks = loaded.into_iter().map(|entry| {
            let ingestor = Arc::clone(&self);
            tokio::task::spawn_blocking(move || match entry {
                Ok(input) => ingestor.ingest_file(&input, sheet_index, today),
                Err(outcome) => SnapshotIngestion::unreadable(outcome),
            })
        });

        let mut ingestions = Vec::new();
        for joined in join_all(tasks).await {
            match joined {
                Ok(ingestion) => ingestions.push(ingestion),
                Err(e) => {
                    return Err(ImportError::InternalError(format!("导入任务异常退出: {}", e)))
                }
            }
        }
        collect_batch(ingestions)
    }
}

/// 汇总单文件结果为批次结果
fn collect_batch(
    ingestions: Vec<SnapshotIngestion>,
) -> ImportResult<(Vec<CanonicalRecord>, IngestReport)> {
    let batch_id = Uuid::new_v4().to_string();
    let mut records = Vec::new();
    let mut outcomes = Vec::with_capacity(ingestions.len());

    for ingestion in ingestions {
        records.extend(ingestion.records);
        outcomes.push(ingestion.outcome);
    }

    let report = IngestReport { batch_id, outcomes };
    info!(
        batch_id = %report.batch_id,
        succeeded = report.success_count(),
        failed = report.failure_count(),
        rows = records.len(),
        "批次导入完成"
    );

    if report.success_count() == 0 {
        let reasons = report
            .failed()
            .map(|o| format!("{}: {}", o.source_file, o.error.as_deref().unwrap_or("")))
            .collect::<Vec<_>>()
            .join("; ");
        let message = if reasons.is_empty() {
            "未提供任何文件".to_string()
        } else {
            reasons
        };
        return Err(ImportError::NoValidInput(message));
    }

    Ok((records, report))
}
