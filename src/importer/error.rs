// ==========================================
// 负库存分析系统 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 单文件错误由调用方收集进批次报告, 不中断兄弟文件
// ==========================================

use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("文件格式不支持: {0}（仅支持 .xlsx/.xls/.xlsm/.xlsb/.ods/.csv）")]
    UnsupportedFormat(String),

    #[error("文件解析失败 ({source_file}): {message}")]
    ParseFailure {
        source_file: String,
        message: String,
    },

    #[error("工作表索引越界: 请求 {requested}, 实际共 {available} 张")]
    SheetIndexOutOfRange { requested: usize, available: usize },

    // ===== 结构错误 =====
    #[error("缺少必需列: {}", missing.join(", "))]
    SchemaMismatch { missing: Vec<String> },

    // ===== 批次错误 =====
    #[error("没有可用的有效输入: {0}")]
    NoValidInput(String),

    // ===== 通用错误 =====
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl ImportError {
    pub fn parse_failure(source_file: &str, message: impl Into<String>) -> Self {
        ImportError::ParseFailure {
            source_file: source_file.to_string(),
            message: message.into(),
        }
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_mismatch_names_missing_columns() {
        let err = ImportError::SchemaMismatch {
            missing: vec!["code".to_string(), "pallet_id".to_string()],
        };
        assert_eq!(err.to_string(), "缺少必需列: code, pallet_id");
    }

    #[test]
    fn test_parse_failure_names_source_file() {
        let err = ImportError::parse_failure("inv_20240101.csv", "列数不一致");
        assert_eq!(err.to_string(), "文件解析失败 (inv_20240101.csv): 列数不一致");
    }
}
