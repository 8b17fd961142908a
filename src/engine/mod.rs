// ==========================================
// 负库存分析系统 - 引擎层
// ==========================================
// 职责: 实现分析规则引擎, 不拼 SQL
// 红线: 引擎均为纯计算, 输入规范表, 输出新结构（不修改输入）
// ==========================================

pub mod cache;
pub mod criticality;
pub mod error;
pub mod orchestrator;
pub mod pallet_history;
pub mod pivot;
pub mod recurrence;
pub mod severity;
pub mod view_filter;

// 重导出核心引擎
pub use cache::{
    AnalysisCache, Fingerprint, InMemoryAnalysisCache, NoopAnalysisCache, DEFAULT_CACHE_CAPACITY,
};
pub use criticality::CriticalityScorer;
pub use error::{AnalysisError, AnalysisOutcome};
pub use orchestrator::{failure_summary, AnalysisPipeline};
pub use pallet_history::PalletHistoryAggregator;
pub use pivot::PivotBuilder;
pub use recurrence::{RecurrenceDetector, DEFAULT_RECURRENCE_GAP_DAYS};
pub use severity::{QuartileCuts, SeverityClassifier, SeverityPath};
pub use view_filter::{split_by_state, top_n, HeadlineMetrics, PivotFilter, SummaryFilter};
