// ==========================================
// 负库存分析系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为
// - 统一 busy_timeout，减少并发写入时的偶发 busy 错误
// - 统一建表语句（负库存明细表 + 配置表）
// ==========================================

use rusqlite::{Connection, OptionalExtension};
use std::path::PathBuf;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 负库存明细表名
pub const INVENTORY_TABLE: &str = "inventarios_negativos";

/// 明细表必需列（校验数据库时使用）
pub const REQUIRED_INVENTORY_COLUMNS: [&str; 4] =
    ["codigo", "id_pallet", "cantidad_negativa", "fecha_reporte"];

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "NEG_INVENTORY_DB_PATH";

const INVENTORY_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS inventarios_negativos (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        codigo TEXT NOT NULL,
        nombre TEXT,
        almacen TEXT,
        id_pallet TEXT NOT NULL,
        cantidad_negativa REAL NOT NULL,
        disponible REAL,
        fecha_reporte DATE NOT NULL,
        archivo_origen TEXT,
        fecha_extraccion TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_fecha ON inventarios_negativos(fecha_reporte);
    CREATE INDEX IF NOT EXISTS idx_codigo ON inventarios_negativos(codigo);
    CREATE INDEX IF NOT EXISTS idx_pallet ON inventarios_negativos(id_pallet);
    CREATE INDEX IF NOT EXISTS idx_almacen ON inventarios_negativos(almacen);
";

const CONFIG_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS config_kv (
        scope_id TEXT NOT NULL DEFAULT 'global',
        key TEXT NOT NULL,
        value TEXT NOT NULL,
        updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
        PRIMARY KEY (scope_id, key)
    );
";

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 创建负库存明细表及索引（幂等）
pub fn ensure_inventory_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(INVENTORY_SCHEMA)
}

/// 创建配置表（幂等）
pub fn ensure_config_table(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CONFIG_SCHEMA)
}

/// 初始化全部表结构
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    ensure_inventory_table(conn)?;
    ensure_config_table(conn)
}

/// 表是否存在
pub fn table_exists(conn: &Connection, table: &str) -> rusqlite::Result<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1 LIMIT 1",
            [table],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false))
}

/// 默认数据库路径
///
/// 优先级: 环境变量 NEG_INVENTORY_DB_PATH > 用户数据目录 > 当前目录
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./inventario_negativo.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("negative-inventory-analyzer");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("inventario_negativo.db");
        }
    }
    path.to_string_lossy().to_string()
}
