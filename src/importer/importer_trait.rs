// ==========================================
// 负库存分析系统 - 导入 Trait
// ==========================================
// 职责: 定义快照导入各阶段接口（不包含实现）
// 阶段 0: 原始表解析 (TableParser)
// 阶段 1: 列名归一 + 类型转换 + 负值过滤 (ColumnNormalizer)
// ==========================================

use crate::importer::error::ImportResult;
use crate::importer::field_mapper::NormalizedTable;
use crate::importer::raw_table::RawTable;

// ==========================================
// TableParser Trait
// ==========================================
// 实现者: ExcelParser, CsvParser
pub trait TableParser: Send + Sync {
    /// 解析文件内容为原始表（首行为表头）
    ///
    /// # 参数
    /// - source_file: 文件名（用于错误信息）
    /// - bytes: 文件内容
    /// - sheet_index: 工作表索引（CSV 忽略）
    fn parse_table(
        &self,
        source_file: &str,
        bytes: &[u8],
        sheet_index: usize,
    ) -> ImportResult<RawTable>;
}

// ==========================================
// ColumnNormalizer Trait
// ==========================================
// 实现者: FieldMapper
pub trait ColumnNormalizer: Send + Sync {
    /// 将任意列名的原始表归一为规范列
    ///
    /// # 返回
    /// - Ok(NormalizedTable): 仅含数量 < 0 的行 + 诊断计数
    /// - Err(SchemaMismatch): 必需列缺失
    fn normalize(&self, table: &RawTable) -> ImportResult<NormalizedTable>;
}
