// ==========================================
// 负库存分析系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod inventory;
pub mod report;
pub mod types;

// 重导出核心类型
pub use inventory::{
    unique_pallet_key, CanonicalRecord, PalletSummary, PivotKey, PivotMatrix, PivotRow,
    RecurrenceRecord, PIVOT_IDENTITY_COLUMNS,
};
pub use report::{AnalysisResult, FileOutcome, IngestReport, NormalizationDiagnostics};
pub use types::{PalletState, Severity, SourceFormat};
