// ==========================================
// 负库存分析系统 - 配置层
// ==========================================
// 职责: 分析运行配置, 支持存储值覆写
// 存储: config_kv 表
// ==========================================

pub mod analysis_config;
pub mod analysis_config_trait;
pub mod config_manager;

// 重导出核心配置管理器
pub use analysis_config::{AnalysisConfig, DEFAULT_TOP_N};
pub use analysis_config_trait::{AnalysisConfigReader, ConfigResult};
pub use config_manager::{config_keys, ConfigManager};
