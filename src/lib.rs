// ==========================================
// 负库存分析系统 - 核心库
// ==========================================
// 输入: 周期性库存快照（工作簿 / CSV / SQLite 明细库）
// 产出: 规范表、托盘汇总、时间透视、复发记录
// 技术栈: Rust + SQLite
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 分析规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 分析配置
pub mod config;

// 数据库基础设施（连接初始化/建表）
pub mod db;

// 导出
pub mod export;

// 日志系统
pub mod logging;

// 阶段耗时
pub mod perf;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{PalletState, Severity, SourceFormat};

// 领域实体
pub use domain::{
    AnalysisResult, CanonicalRecord, IngestReport, PalletSummary, PivotMatrix, RecurrenceRecord,
};

// 引擎
pub use engine::{
    AnalysisError, AnalysisPipeline, CriticalityScorer, PalletHistoryAggregator, PivotBuilder,
    RecurrenceDetector, SeverityClassifier,
};

// 导入
pub use importer::{ImportError, SnapshotIngestor, SnapshotInput};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "负库存分析系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
