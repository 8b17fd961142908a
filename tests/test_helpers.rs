// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的临时数据库、快照文件构造等功能
// ==========================================

#![allow(dead_code)]

use chrono::NaiveDate;
use negative_inventory::importer::SnapshotInput;
use std::error::Error;
use tempfile::NamedTempFile;

/// Legacy 快照表头
pub const LEGACY_HEADER: &str = "Código,Nombre,ID de Pallet,Almacén,Inventario Físico";

/// 创建临时测试数据库（空库, 由被测代码建表）
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时路径不是 UTF-8")?
        .to_string();
    Ok((temp_file, db_path))
}

/// 构造 CSV 快照
///
/// rows: (编码, 描述, 托盘号, 仓库, 数量)
pub fn legacy_csv(file_name: &str, rows: &[(&str, &str, &str, &str, f64)]) -> SnapshotInput {
    let mut content = String::from(LEGACY_HEADER);
    content.push('\n');
    for (code, name, pallet, warehouse, qty) in rows {
        content.push_str(&format!("{},{},{},{},{}\n", code, name, pallet, warehouse, qty));
    }
    SnapshotInput::new(file_name, content.into_bytes())
}

/// 单托盘快照
pub fn single_pallet_csv(file_name: &str, code: &str, pallet: &str, qty: f64) -> SnapshotInput {
    legacy_csv(file_name, &[(code, "Producto", pallet, "ALM1", qty)])
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("invalid test date")
}
