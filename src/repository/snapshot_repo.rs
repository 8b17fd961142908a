// ==========================================
// 负库存分析系统 - 负库存明细数据仓储
// ==========================================
// 表: inventarios_negativos
// 职责: 建表、结构校验、规范行写入、原始行集读取
// 红线: Repository 不含业务逻辑（列归一与过滤由导入层负责）
// ==========================================

use crate::db::{
    ensure_inventory_table, open_sqlite_connection, table_exists, INVENTORY_TABLE,
    REQUIRED_INVENTORY_COLUMNS,
};
use crate::domain::inventory::CanonicalRecord;
use crate::importer::raw_table::RawTable;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::ValueRef;
use rusqlite::{params, Connection};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

/// 数据库校验报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DbValidationReport {
    pub row_count: usize,
    pub non_negative_rows: usize, // cantidad_negativa >= 0 的行（导入时会被过滤）
    pub first_report_date: Option<String>,
    pub last_report_date: Option<String>,
}

// ==========================================
// SnapshotRepository - 负库存明细仓储
// ==========================================
pub struct SnapshotRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SnapshotRepository {
    /// 创建新的 SnapshotRepository 实例（不建表）
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建仓储实例
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 建表及索引（幂等）
    pub fn create_schema(&self) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        ensure_inventory_table(&conn)?;
        Ok(())
    }

    /// 校验表结构并统计数据质量
    ///
    /// # 返回
    /// - Err(TableNotFound): 表不存在
    /// - Err(SchemaMismatch): 缺少 codigo / id_pallet / cantidad_negativa / fecha_reporte
    pub fn validate_schema(&self) -> RepositoryResult<DbValidationReport> {
        let conn = self.get_conn()?;

        if !table_exists(&conn, INVENTORY_TABLE)? {
            return Err(RepositoryError::TableNotFound(INVENTORY_TABLE.to_string()));
        }

        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let columns: HashSet<String> = stmt
            .query_map([INVENTORY_TABLE], |row| row.get::<_, String>(0))?
            .collect::<Result<_, _>>()?;

        let missing: Vec<String> = REQUIRED_INVENTORY_COLUMNS
            .iter()
            .filter(|c| !columns.contains(**c))
            .map(|c| c.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(RepositoryError::SchemaMismatch {
                table: INVENTORY_TABLE.to_string(),
                missing,
            });
        }

        let row_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM inventarios_negativos", [], |row| row.get(0))?;
        let non_negative: i64 = conn.query_row(
            "SELECT COUNT(*) FROM inventarios_negativos WHERE cantidad_negativa >= 0",
            [],
            |row| row.get(0),
        )?;
        let (first, last): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(fecha_reporte), MAX(fecha_reporte) FROM inventarios_negativos",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        if non_negative > 0 {
            warn!(rows = non_negative, "存在数量 >= 0 的记录, 分析时将被过滤");
        }

        Ok(DbValidationReport {
            row_count: row_count as usize,
            non_negative_rows: non_negative as usize,
            first_report_date: first,
            last_report_date: last,
        })
    }

    /// 写入规范行（单事务）
    ///
    /// 同一 (fecha_reporte, archivo_origen) 的旧记录先被删除, 重复写入同一快照不产生重复行
    pub fn replace_snapshots(&self, records: &[CanonicalRecord]) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let snapshots: HashSet<(String, &str)> = records
            .iter()
            .map(|r| (r.report_date.format("%Y-%m-%d").to_string(), r.source_file.as_str()))
            .collect();
        let mut removed = 0;
        for (date, source) in &snapshots {
            removed += tx.execute(
                "DELETE FROM inventarios_negativos WHERE fecha_reporte = ?1 AND archivo_origen = ?2",
                params![date, source],
            )?;
        }

        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO inventarios_negativos (
                    codigo, nombre, almacen, id_pallet,
                    cantidad_negativa, disponible, fecha_reporte, archivo_origen
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )?;
            for record in records {
                stmt.execute(params![
                    record.code,
                    record.name,
                    record.warehouse,
                    record.pallet_id,
                    record.negative_quantity,
                    record.negative_quantity,
                    record.report_date.format("%Y-%m-%d").to_string(),
                    record.source_file,
                ])?;
                count += 1;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        info!(inserted = count, replaced = removed, snapshots = snapshots.len(), "规范行已写入");
        Ok(count)
    }

    /// 读取全部明细为原始行集（列名即表列名, 值统一转文本）
    pub fn load_row_set(&self) -> RepositoryResult<RawTable> {
        let conn = self.get_conn()?;
        if !table_exists(&conn, INVENTORY_TABLE)? {
            return Err(RepositoryError::TableNotFound(INVENTORY_TABLE.to_string()));
        }

        let mut stmt = conn.prepare("SELECT * FROM inventarios_negativos ORDER BY fecha_reporte, id")?;
        let headers: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
        let width = headers.len();
        let mut table = RawTable::new(headers);

        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(value_to_text(row.get_ref(i)?));
            }
            table.push_row(cells);
        }

        info!(rows = table.len(), "数据库行集已读取");
        Ok(table)
    }

    /// 数量 >= 0 的记录数
    pub fn count_non_negative(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM inventarios_negativos WHERE cantidad_negativa >= 0",
            [],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// 记录总数
    pub fn count_rows(&self) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM inventarios_negativos", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

fn value_to_text(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => String::new(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).to_string(),
        ValueRef::Blob(_) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn repo() -> SnapshotRepository {
        let conn = Connection::open_in_memory().unwrap();
        SnapshotRepository::from_connection(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_value_to_text() {
        assert_eq!(value_to_text(ValueRef::Integer(1234)), "1234");
        assert_eq!(value_to_text(ValueRef::Real(-5.5)), "-5.5");
        assert_eq!(value_to_text(ValueRef::Null), "");
        assert_eq!(value_to_text(ValueRef::Text(b"ALM01")), "ALM01");
    }

    #[test]
    fn test_missing_table() {
        let r = repo();
        assert!(matches!(r.validate_schema(), Err(RepositoryError::TableNotFound(_))));
        assert!(matches!(r.load_row_set(), Err(RepositoryError::TableNotFound(_))));
    }

    #[test]
    fn test_replace_is_idempotent_per_snapshot() {
        let r = repo();
        r.create_schema().unwrap();
        let date = NaiveDate::from_ymd_opt(2025, 10, 21).unwrap();
        let records = vec![CanonicalRecord::new(
            "1234".to_string(),
            "P1".to_string(),
            "Tornillo".to_string(),
            "ALM01".to_string(),
            -5.0,
            date,
            "inv_20251021.xlsx".to_string(),
        )];

        assert_eq!(r.replace_snapshots(&records).unwrap(), 1);
        assert_eq!(r.replace_snapshots(&records).unwrap(), 1);
        assert_eq!(r.count_rows().unwrap(), 1);
    }

    #[test]
    fn test_poisoned_connection_reports_lock_error() {
        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        let shared = Arc::clone(&conn);
        let _ = std::thread::spawn(move || {
            let _guard = shared.lock().unwrap();
            panic!("持锁线程崩溃");
        })
        .join();

        let r = SnapshotRepository::from_connection(conn);
        assert!(matches!(r.count_rows(), Err(RepositoryError::LockError(_))));
        assert!(matches!(r.create_schema(), Err(RepositoryError::LockError(_))));
    }
}
