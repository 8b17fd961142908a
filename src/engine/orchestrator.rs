// ==========================================
// 负库存分析系统 - 分析流水线编排器
// ==========================================
// 用途: 协调导入与五个分析引擎的执行顺序
// 流程:
//   快照导入 → 托盘历史聚合 → 严重度分级 → 状态/关键度
//            → 时间透视 → 复发检测
// 缓存: 按输入指纹命中时直接返回, 不重复计算
// ==========================================

use crate::domain::inventory::CanonicalRecord;
use crate::domain::report::{AnalysisResult, FileOutcome, IngestReport};
use crate::engine::cache::{AnalysisCache, Fingerprint, NoopAnalysisCache};
use crate::engine::criticality::CriticalityScorer;
use crate::engine::error::AnalysisOutcome;
use crate::engine::pallet_history::PalletHistoryAggregator;
use crate::engine::pivot::PivotBuilder;
use crate::engine::recurrence::RecurrenceDetector;
use crate::engine::severity::SeverityClassifier;
use crate::importer::raw_table::RawTable;
use crate::importer::snapshot_ingestor::{LoadedSnapshot, SnapshotIngestor, SnapshotInput};
use crate::perf::PerfGuard;
use crate::repository::snapshot_repo::SnapshotRepository;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// AnalysisPipeline - 分析流水线
// ==========================================
pub struct AnalysisPipeline {
    ingestor: Arc<SnapshotIngestor>,
    cache: Arc<dyn AnalysisCache>,
    aggregator: PalletHistoryAggregator,
    classifier: SeverityClassifier,
    scorer: CriticalityScorer,
    pivot_builder: PivotBuilder,
    recurrence: RecurrenceDetector,
}

impl AnalysisPipeline {
    /// 创建流水线（不缓存）
    ///
    /// # 参数
    /// - recurrence_gap_days: 复发判定的相邻间隔阈值
    pub fn new(recurrence_gap_days: i64) -> Self {
        Self::with_cache(recurrence_gap_days, Arc::new(NoopAnalysisCache))
    }

    /// 创建带缓存的流水线
    pub fn with_cache(recurrence_gap_days: i64, cache: Arc<dyn AnalysisCache>) -> Self {
        Self {
            ingestor: Arc::new(SnapshotIngestor::new()),
            cache,
            aggregator: PalletHistoryAggregator::new(),
            classifier: SeverityClassifier::new(),
            scorer: CriticalityScorer::new(),
            pivot_builder: PivotBuilder::new(),
            recurrence: RecurrenceDetector::new(recurrence_gap_days),
        }
    }

    pub fn recurrence_gap_days(&self) -> i64 {
        self.recurrence.gap_days()
    }

    /// 由规范表计算全部分析产出（纯计算, 不访问缓存）
    ///
    /// 数量 >= 0 或非有限值的行在此被剔除, 保证规范表全为负值
    pub fn analyze(&self, records: Vec<CanonicalRecord>, ingest_report: IngestReport) -> AnalysisResult {
        let rows_in = records.len();
        let canonical: Vec<CanonicalRecord> = records
            .into_iter()
            .filter(|r| r.negative_quantity.is_finite() && r.negative_quantity < 0.0)
            .collect();
        if canonical.len() < rows_in {
            warn!(dropped = rows_in - canonical.len(), "规范表中存在非负数量, 已剔除");
        }

        // ==========================================
        // 步骤1: 托盘历史聚合
        // ==========================================
        let mut summaries = {
            let mut perf = PerfGuard::new("aggregate");
            let summaries = self.aggregator.aggregate(&canonical);
            perf.set_rows(summaries.len());
            summaries
        };
        let latest_report_date = PalletHistoryAggregator::latest_report_date(&canonical);

        // ==========================================
        // 步骤2: 严重度分级
        // ==========================================
        {
            let _perf = PerfGuard::new("classify_severity");
            let path = self.classifier.apply(&mut summaries);
            debug!(path = ?path, "严重度分级完成");
        }

        // ==========================================
        // 步骤3: 状态判定与关键度评分
        // ==========================================
        if let Some(latest) = latest_report_date {
            let _perf = PerfGuard::new("score_criticality");
            self.scorer.apply(&mut summaries, latest);
        }

        // ==========================================
        // 步骤4: 时间透视
        // ==========================================
        let pivot = {
            let mut perf = PerfGuard::new("build_pivot");
            let pivot = self.pivot_builder.build(&canonical);
            perf.set_rows(pivot.row_count());
            pivot
        };

        // ==========================================
        // 步骤5: 复发检测
        // ==========================================
        let recurrences = {
            let mut perf = PerfGuard::new("detect_recurrence");
            let recurrences = self.recurrence.detect(&canonical);
            perf.set_rows(recurrences.len());
            recurrences
        };

        info!(
            canonical_rows = canonical.len(),
            pallets = summaries.len(),
            active = summaries.iter().filter(|s| s.is_active()).count(),
            pivot_dates = pivot.dates.len(),
            recurrences = recurrences.len(),
            latest_report_date = ?latest_report_date,
            "分析完成"
        );

        AnalysisResult {
            canonical,
            summaries,
            pivot,
            recurrences,
            latest_report_date,
            ingest_report,
        }
    }

    /// 分析一批快照文件（顺序导入）
    ///
    /// # 返回
    /// - Err(NoValidInput): 全部文件失败或未提供文件
    #[instrument(skip(self, inputs), fields(files = inputs.len()))]
    pub fn run_files(
        &self,
        inputs: &[SnapshotInput],
        sheet_index: usize,
        today: NaiveDate,
    ) -> AnalysisOutcome<Arc<AnalysisResult>> {
        let fingerprint =
            Fingerprint::for_files(inputs, sheet_index, self.recurrence_gap_days(), today);
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let (records, report) = {
            let mut perf = PerfGuard::new("ingest");
            let batch = self.ingestor.ingest_batch(inputs, sheet_index, today)?;
            perf.set_rows(batch.0.len());
            batch
        };

        Ok(self.store(fingerprint, self.analyze(records, report)))
    }

    /// 分析一批快照文件（并发导入, 结果顺序与输入一致）
    #[instrument(skip(self, inputs), fields(files = inputs.len()))]
    pub async fn run_files_concurrent(
        &self,
        inputs: Vec<SnapshotInput>,
        sheet_index: usize,
        today: NaiveDate,
    ) -> AnalysisOutcome<Arc<AnalysisResult>> {
        let fingerprint =
            Fingerprint::for_files(&inputs, sheet_index, self.recurrence_gap_days(), today);
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let (records, report) = Arc::clone(&self.ingestor)
            .ingest_batch_concurrent(inputs, sheet_index, today)
            .await?;

        Ok(self.store(fingerprint, self.analyze(records, report)))
    }

    /// 分析磁盘读取结果（读取失败的文件计入批次报告, 不中断其余文件）
    ///
    /// # 返回
    /// - Err(NoValidInput): 全部文件读取或导入失败
    #[instrument(skip(self, loaded), fields(files = loaded.len()))]
    pub fn run_loaded(
        &self,
        loaded: &[LoadedSnapshot],
        sheet_index: usize,
        today: NaiveDate,
    ) -> AnalysisOutcome<Arc<AnalysisResult>> {
        let fingerprint =
            Fingerprint::for_loaded(loaded, sheet_index, self.recurrence_gap_days(), today);
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let (records, report) = {
            let mut perf = PerfGuard::new("ingest");
            let batch = self.ingestor.ingest_loaded(loaded, sheet_index, today)?;
            perf.set_rows(batch.0.len());
            batch
        };

        Ok(self.store(fingerprint, self.analyze(records, report)))
    }

    /// 分析磁盘读取结果（并发导入）
    #[instrument(skip(self, loaded), fields(files = loaded.len()))]
    pub async fn run_loaded_concurrent(
        &self,
        loaded: Vec<LoadedSnapshot>,
        sheet_index: usize,
        today: NaiveDate,
    ) -> AnalysisOutcome<Arc<AnalysisResult>> {
        let fingerprint =
            Fingerprint::for_loaded(&loaded, sheet_index, self.recurrence_gap_days(), today);
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let (records, report) = Arc::clone(&self.ingestor)
            .ingest_loaded_concurrent(loaded, sheet_index, today)
            .await?;

        Ok(self.store(fingerprint, self.analyze(records, report)))
    }

    /// 分析数据库行集（行级日期与来源）
    #[instrument(skip(self, table), fields(rows = table.len()))]
    pub fn run_row_set(&self, table: &RawTable, identifier: &str) -> AnalysisOutcome<Arc<AnalysisResult>> {
        let fingerprint = Fingerprint::for_row_set(table, self.recurrence_gap_days());
        if let Some(hit) = self.cached(&fingerprint) {
            return Ok(hit);
        }

        let ingestion = match self.ingestor.ingest_row_set(table, identifier) {
            Ok(ingestion) => ingestion,
            Err(e) => {
                warn!(error = %e, source = identifier, "数据库行集导入失败");
                return Err(e.into());
            }
        };

        let report = IngestReport {
            batch_id: Uuid::new_v4().to_string(),
            outcomes: vec![ingestion.outcome],
        };
        Ok(self.store(fingerprint, self.analyze(ingestion.records, report)))
    }

    /// 分析数据库中的全部明细（先校验表结构）
    pub fn run_repository(
        &self,
        repo: &SnapshotRepository,
        identifier: &str,
    ) -> AnalysisOutcome<Arc<AnalysisResult>> {
        let validation = repo.validate_schema()?;
        info!(
            rows = validation.row_count,
            non_negative = validation.non_negative_rows,
            "数据库结构校验通过"
        );
        let table = repo.load_row_set()?;
        self.run_row_set(&table, identifier)
    }

    fn cached(&self, fingerprint: &Fingerprint) -> Option<Arc<AnalysisResult>> {
        let hit = self.cache.get(fingerprint);
        if hit.is_some() {
            info!(fingerprint = %fingerprint, "命中分析缓存");
        }
        hit
    }

    fn store(&self, fingerprint: Fingerprint, result: AnalysisResult) -> Arc<AnalysisResult> {
        let result = Arc::new(result);
        self.cache.put(fingerprint, Arc::clone(&result));
        result
    }
}

/// 失败文件摘要（文件名: 原因）
pub fn failure_summary(report: &IngestReport) -> Vec<String> {
    report
        .failed()
        .map(|o: &FileOutcome| {
            format!("{}: {}", o.source_file, o.error.as_deref().unwrap_or("未知错误"))
        })
        .collect()
}
