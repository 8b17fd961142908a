// ==========================================
// 负库存分析系统 - 分析运行配置
// ==========================================
// 来源优先级: 命令行参数 > config_kv 存储值 > 默认值
// ==========================================

use crate::config::analysis_config_trait::{AnalysisConfigReader, ConfigResult};
use crate::domain::types::SourceFormat;
use crate::engine::recurrence::DEFAULT_RECURRENCE_GAP_DAYS;
use crate::engine::view_filter::SummaryFilter;
use serde::{Deserialize, Serialize};

/// Top N 默认值
pub const DEFAULT_TOP_N: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub source_format: SourceFormat,
    pub sheet_index: usize,         // 工作簿中读取的工作表（0 起）
    pub top_n: usize,               // 排名输出条数
    pub recurrence_gap_days: i64,   // 复发判定的相邻间隔阈值
    #[serde(default)]
    pub filter: SummaryFilter,      // 托盘汇总视图过滤
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let source_format = SourceFormat::Legacy;
        Self {
            source_format,
            sheet_index: source_format.default_sheet_index(),
            top_n: DEFAULT_TOP_N,
            recurrence_gap_days: DEFAULT_RECURRENCE_GAP_DAYS,
            filter: SummaryFilter::default(),
        }
    }
}

impl AnalysisConfig {
    /// 从配置读取器加载（缺失或格式错误的项使用默认值）
    pub async fn load(reader: &dyn AnalysisConfigReader) -> ConfigResult<Self> {
        Ok(Self {
            source_format: reader.get_source_format().await?,
            sheet_index: reader.get_sheet_index().await?,
            top_n: reader.get_top_n().await?,
            recurrence_gap_days: reader.get_recurrence_gap_days().await?,
            filter: reader.get_summary_filter().await?,
        })
    }
}
