// ==========================================
// 负库存分析系统 - 分析流水线错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约定: 分级退化（样本过小/零方差）不是错误
// ==========================================

use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("导入失败: {0}")]
    Import(#[from] ImportError),

    #[error("数据库访问失败: {0}")]
    Repository(#[from] RepositoryError),
}

impl AnalysisError {
    /// 结构不匹配（文件缺列或数据库缺列）
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(
            self,
            AnalysisError::Import(ImportError::SchemaMismatch { .. })
                | AnalysisError::Repository(RepositoryError::SchemaMismatch { .. })
        )
    }

    /// 全部输入失败
    pub fn is_no_valid_input(&self) -> bool {
        matches!(self, AnalysisError::Import(ImportError::NoValidInput(_)))
    }
}

/// Result 类型别名
pub type AnalysisOutcome<T> = Result<T, AnalysisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_helpers() {
        let import: AnalysisError = ImportError::SchemaMismatch {
            missing: vec!["code".to_string()],
        }
        .into();
        assert!(import.is_schema_mismatch());
        assert!(!import.is_no_valid_input());

        let repo: AnalysisError = RepositoryError::SchemaMismatch {
            table: "inventarios_negativos".to_string(),
            missing: vec!["fecha_reporte".to_string()],
        }
        .into();
        assert!(repo.is_schema_mismatch());

        let empty: AnalysisError = ImportError::NoValidInput("2 个文件全部失败".to_string()).into();
        assert!(empty.is_no_valid_input());
        assert_eq!(empty.to_string(), "导入失败: 没有可用的有效输入: 2 个文件全部失败");
    }
}
