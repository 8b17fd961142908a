// ==========================================
// 负库存分析系统 - 原始表
// ==========================================
// 表头 + 文本单元格, 保留源列顺序（别名冲突时按列序后者覆盖）
// ==========================================

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RawTable {
    pub fn new(headers: Vec<String>) -> Self {
        Self {
            headers: headers.into_iter().map(|h| h.trim().to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// 追加一行；完全空白的行被跳过
    pub fn push_row(&mut self, row: Vec<String>) -> bool {
        if row.iter().all(|v| v.trim().is_empty()) {
            return false;
        }
        self.rows.push(row);
        true
    }

    /// 读取单元格（行长度不足时视为空）
    pub fn cell(&self, row: usize, col: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(|v| v.as_str())
            .unwrap_or("")
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_rows_skipped_and_short_rows_padded() {
        let mut table = RawTable::new(vec![" Código ".to_string(), "Qty".to_string()]);
        assert!(table.push_row(vec!["A".to_string()]));
        assert!(!table.push_row(vec!["".to_string(), "  ".to_string()]));

        assert_eq!(table.headers[0], "Código");
        assert_eq!(table.len(), 1);
        assert_eq!(table.cell(0, 0), "A");
        assert_eq!(table.cell(0, 1), "");
        assert_eq!(table.cell(5, 0), "");
    }
}
