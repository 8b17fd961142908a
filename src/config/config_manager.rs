// ==========================================
// 负库存分析系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::analysis_config::DEFAULT_TOP_N;
use crate::config::analysis_config_trait::{AnalysisConfigReader, ConfigResult};
use crate::db::open_sqlite_connection;
use crate::domain::types::{PalletState, Severity, SourceFormat};
use crate::engine::recurrence::DEFAULT_RECURRENCE_GAP_DAYS;
use crate::engine::view_filter::SummaryFilter;
use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（config_kv 表不存在时自动创建）
    pub fn new(db_path: &str) -> ConfigResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        crate::db::ensure_config_table(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> ConfigResult<Self> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
            crate::db::ensure_config_table(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值
    pub fn get_global_config_value(&self, key: &str) -> ConfigResult<Option<String>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（存在则覆盖）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> ConfigResult<()> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
            params![key, value],
        )?;
        tracing::info!(config_key = key, value = value, "配置已更新");
        Ok(())
    }

    /// 从 config_kv 表读取配置值，带默认值
    fn get_config_or_default(&self, key: &str, default: &str) -> ConfigResult<String> {
        Ok(self.get_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// 读取数值配置；格式错误时告警并回退默认值
    fn get_parsed_or_default<T>(&self, key: &str, default: T) -> ConfigResult<T>
    where
        T: std::str::FromStr + Copy + std::fmt::Display,
    {
        let Some(raw) = self.get_config_value(key)? else {
            return Ok(default);
        };
        match raw.trim().parse::<T>() {
            Ok(v) => Ok(v),
            Err(_) => {
                tracing::warn!(
                    config_key = key,
                    raw_value = %raw,
                    default = %default,
                    "配置格式错误，使用默认值"
                );
                Ok(default)
            }
        }
    }

    /// 获取所有配置的快照（JSON格式, 按键排序）
    pub fn get_config_snapshot(&self) -> ConfigResult<String> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 从配置快照恢复配置
    ///
    /// # 返回
    /// - Ok(usize): 恢复的配置项数量
    pub fn restore_config_from_snapshot(&self, snapshot_json: &str) -> ConfigResult<usize> {
        let config_map: BTreeMap<String, String> = serde_json::from_str(snapshot_json)?;

        let mut conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        let tx = conn.transaction()?;

        let mut count = 0;
        for (key, value) in config_map.iter() {
            count += tx.execute(
                "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
                 ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2",
                params![key, value],
            )?;
        }

        tx.commit()?;
        Ok(count)
    }
}

/// 逗号分隔列表
fn split_list(raw: &str) -> impl Iterator<Item = &str> {
    raw.split(',').map(str::trim).filter(|s| !s.is_empty())
}

// ==========================================
// AnalysisConfigReader Trait 实现
// ==========================================
#[async_trait]
impl AnalysisConfigReader for ConfigManager {
    async fn get_source_format(&self) -> ConfigResult<SourceFormat> {
        let value = self.get_config_or_default(config_keys::SOURCE_FORMAT, "LEGACY")?;
        Ok(SourceFormat::parse(&value).unwrap_or(SourceFormat::Legacy))
    }

    async fn get_sheet_index(&self) -> ConfigResult<usize> {
        let default = self.get_source_format().await?.default_sheet_index();
        self.get_parsed_or_default(config_keys::SHEET_INDEX, default)
    }

    async fn get_top_n(&self) -> ConfigResult<usize> {
        self.get_parsed_or_default(config_keys::TOP_N, DEFAULT_TOP_N)
    }

    async fn get_recurrence_gap_days(&self) -> ConfigResult<i64> {
        let value =
            self.get_parsed_or_default(config_keys::RECURRENCE_GAP_DAYS, DEFAULT_RECURRENCE_GAP_DAYS)?;
        Ok(value.max(1))
    }

    async fn get_summary_filter(&self) -> ConfigResult<SummaryFilter> {
        let warehouses = self.get_config_or_default(config_keys::FILTER_WAREHOUSES, "")?;
        let severities = self.get_config_or_default(config_keys::FILTER_SEVERITIES, "")?;
        let states = self.get_config_or_default(config_keys::FILTER_STATES, "")?;

        Ok(SummaryFilter {
            warehouses: split_list(&warehouses).map(str::to_string).collect(),
            // 无法识别的标签直接忽略
            severities: split_list(&severities).filter_map(Severity::parse).collect(),
            states: split_list(&states).filter_map(PalletState::parse).collect(),
        })
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 输入
    pub const SOURCE_FORMAT: &str = "source_format";
    pub const SHEET_INDEX: &str = "sheet_index";

    // 分析
    pub const TOP_N: &str = "top_n";
    pub const RECURRENCE_GAP_DAYS: &str = "recurrence_gap_days";

    // 视图过滤（逗号分隔）
    pub const FILTER_WAREHOUSES: &str = "filter_warehouses";
    pub const FILTER_SEVERITIES: &str = "filter_severities";
    pub const FILTER_STATES: &str = "filter_states";

    pub const ALL: [&str; 7] = [
        SOURCE_FORMAT,
        SHEET_INDEX,
        TOP_N,
        RECURRENCE_GAP_DAYS,
        FILTER_WAREHOUSES,
        FILTER_SEVERITIES,
        FILTER_STATES,
    ];
}
