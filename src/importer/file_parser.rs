// ==========================================
// 负库存分析系统 - 文件解析器实现
// ==========================================
// 阶段 0: 文件内容 → 原始表
// 支持: 工作簿 (.xlsx/.xls/.xlsm/.xlsb/.ods) / CSV (.csv)
// 输入为内存字节, 由调用方负责读取文件或上传内容
// CSV: 分隔符按表头行嗅探 (, ; Tab), 非 UTF-8 内容按 Latin-1 解码
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::TableParser;
use crate::importer::raw_table::RawTable;
use calamine::{open_workbook_auto_from_rs, Reader};
use csv::ReaderBuilder;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

/// 候选分隔符（计数相同时靠前者优先）
const CSV_DELIMITERS: [u8; 3] = [b',', b';', b'\t'];

/// 解码 CSV 文本: 去 UTF-8 BOM; 非 UTF-8 时按 Latin-1 逐字节解码
///
/// 西语环境 ERP 导出常见 cp1252 编码, 重音字母与 Latin-1 一致
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// 按表头行（引号外）出现次数选择分隔符
fn sniff_delimiter(text: &str) -> u8 {
    let header = text.lines().next().unwrap_or("");
    let mut counts = [0usize; CSV_DELIMITERS.len()];
    let mut in_quotes = false;
    for b in header.bytes() {
        if b == b'"' {
            in_quotes = !in_quotes;
        } else if !in_quotes {
            if let Some(i) = CSV_DELIMITERS.iter().position(|d| *d == b) {
                counts[i] += 1;
            }
        }
    }

    let mut best = 0;
    for i in 1..CSV_DELIMITERS.len() {
        if counts[i] > counts[best] {
            best = i;
        }
    }
    CSV_DELIMITERS[best]
}

impl TableParser for CsvParser {
    fn parse_table(
        &self,
        source_file: &str,
        bytes: &[u8],
        _sheet_index: usize,
    ) -> ImportResult<RawTable> {
        let text = decode_text(bytes);
        let delimiter = sniff_delimiter(&text);
        if matches!(text, Cow::Owned(_)) {
            debug!(file = source_file, "CSV 非 UTF-8, 按 Latin-1 解码");
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .flexible(true) // 允许行长度不一致
            .from_reader(text.as_bytes());

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| ImportError::parse_failure(source_file, e.to_string()))?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let mut table = RawTable::new(headers);
        for result in reader.records() {
            let record = result.map_err(|e| ImportError::parse_failure(source_file, e.to_string()))?;
            table.push_row(record.iter().map(|v| v.trim().to_string()).collect());
        }

        Ok(table)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl TableParser for ExcelParser {
    fn parse_table(
        &self,
        source_file: &str,
        bytes: &[u8],
        sheet_index: usize,
    ) -> ImportResult<RawTable> {
        // 按内容嗅探工作簿格式
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))
            .map_err(|e| ImportError::parse_failure(source_file, e.to_string()))?;

        let available = workbook.sheet_names().len();
        let range = match workbook.worksheet_range_at(sheet_index) {
            Some(Ok(range)) => range,
            Some(Err(e)) => return Err(ImportError::parse_failure(source_file, e.to_string())),
            None => {
                return Err(ImportError::SheetIndexOutOfRange {
                    requested: sheet_index,
                    available,
                })
            }
        };

        // 提取表头（第一行）
        let mut rows = range.rows();
        let header_row = rows
            .next()
            .ok_or_else(|| ImportError::parse_failure(source_file, "工作表无数据行"))?;

        let headers: Vec<String> = header_row.iter().map(|cell| cell.to_string()).collect();

        let mut table = RawTable::new(headers);
        for data_row in rows {
            table.push_row(
                data_row
                    .iter()
                    .map(|cell| cell.to_string().trim().to_string())
                    .collect(),
            );
        }

        Ok(table)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl UniversalFileParser {
    /// 根据文件扩展名选择解析器
    pub fn parser_for(source_file: &str) -> ImportResult<Box<dyn TableParser>> {
        let ext = Path::new(source_file)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        match ext.as_str() {
            "csv" => Ok(Box::new(CsvParser)),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Ok(Box::new(ExcelParser)),
            _ => Err(ImportError::UnsupportedFormat(ext)),
        }
    }
}

impl TableParser for UniversalFileParser {
    fn parse_table(
        &self,
        source_file: &str,
        bytes: &[u8],
        sheet_index: usize,
    ) -> ImportResult<RawTable> {
        Self::parser_for(source_file)?.parse_table(source_file, bytes, sheet_index)
    }
}
