// ==========================================
// 负库存分析系统 - 导入层
// ==========================================
// 职责: 外部快照导入, 生成规范表
// 支持: 工作簿, CSV, 数据库行集
// 流程: 解析 → 列归一 → 负值过滤 → 日期标记
// ==========================================

pub mod column_alias;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod importer_trait;
pub mod raw_table;
pub mod snapshot_ingestor;

// 重导出核心类型
pub use column_alias::{CanonicalColumn, ALIAS_TABLE_VERSION, COLUMN_ALIASES};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{normalize_identifier, Coerced, FieldMapper, NormalizedRow, NormalizedTable};
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use raw_table::RawTable;
pub use snapshot_ingestor::{
    extract_report_date, load_paths, resolve_report_date, LoadedSnapshot, SnapshotIngestion,
    SnapshotIngestor, SnapshotInput,
};

// 重导出 Trait 接口
pub use importer_trait::{ColumnNormalizer, TableParser};
