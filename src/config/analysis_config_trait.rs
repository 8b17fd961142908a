// ==========================================
// 负库存分析系统 - 分析配置读取 Trait
// ==========================================
// 职责: 定义分析流水线所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::domain::types::SourceFormat;
use crate::engine::view_filter::SummaryFilter;
use async_trait::async_trait;
use std::error::Error;

pub type ConfigResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

// ==========================================
// AnalysisConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait AnalysisConfigReader: Send + Sync {
    /// 获取快照来源格式
    ///
    /// # 默认值
    /// - LEGACY
    async fn get_source_format(&self) -> ConfigResult<SourceFormat>;

    /// 获取工作表索引
    ///
    /// # 默认值
    /// - 未显式配置时取来源格式的默认索引（LEGACY=1, RAW_ERP=0）
    async fn get_sheet_index(&self) -> ConfigResult<usize>;

    /// 获取 Top N 条数
    ///
    /// # 默认值
    /// - 10
    async fn get_top_n(&self) -> ConfigResult<usize>;

    /// 获取复发判定间隔（天）
    ///
    /// # 默认值
    /// - 1（按日快照）
    async fn get_recurrence_gap_days(&self) -> ConfigResult<i64>;

    /// 获取托盘汇总默认过滤条件
    ///
    /// # 默认值
    /// - 不过滤
    async fn get_summary_filter(&self) -> ConfigResult<SummaryFilter>;
}
