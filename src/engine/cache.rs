// ==========================================
// 负库存分析系统 - 分析结果缓存
// ==========================================
// 职责: 以输入指纹为键缓存完整分析结果
// 指纹: SHA-256(文件名, 文件内容, 工作表索引, 复发间隔, 别名表版本)
//       文件名无日期时追加处理当日
// 缓存对象由调用方显式传入流水线, 无全局状态
// ==========================================

use crate::domain::report::{AnalysisResult, FileOutcome};
use crate::importer::column_alias::ALIAS_TABLE_VERSION;
use crate::importer::raw_table::RawTable;
use crate::importer::snapshot_ingestor::{extract_report_date, LoadedSnapshot, SnapshotInput};
use chrono::NaiveDate;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// 进程内缓存默认容量（条）
pub const DEFAULT_CACHE_CAPACITY: usize = 16;

/// 输入指纹（十六进制 SHA-256）
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// 文件批次指纹（文件顺序参与计算）
    ///
    /// 存在文件名无日期的文件时, 报告日期取处理当日, 此时 today 也参与计算
    pub fn for_files(
        inputs: &[SnapshotInput],
        sheet_index: usize,
        recurrence_gap_days: i64,
        today: NaiveDate,
    ) -> Self {
        Self::for_entries(inputs.iter().map(Ok), sheet_index, recurrence_gap_days, today)
    }

    /// 磁盘读取结果指纹（读取失败的文件按文件名 + 原因参与计算）
    pub fn for_loaded(
        loaded: &[LoadedSnapshot],
        sheet_index: usize,
        recurrence_gap_days: i64,
        today: NaiveDate,
    ) -> Self {
        Self::for_entries(
            loaded.iter().map(|entry| entry.as_ref()),
            sheet_index,
            recurrence_gap_days,
            today,
        )
    }

    fn for_entries<'a, I>(
        entries: I,
        sheet_index: usize,
        recurrence_gap_days: i64,
        today: NaiveDate,
    ) -> Self
    where
        I: IntoIterator<Item = Result<&'a SnapshotInput, &'a FileOutcome>>,
    {
        let mut hasher = Sha256::new();
        hasher.update(b"files");
        let mut undated = false;
        for entry in entries {
            match entry {
                Ok(input) => {
                    update_field(&mut hasher, input.file_name.as_bytes());
                    update_field(&mut hasher, &input.bytes);
                    undated |= extract_report_date(&input.file_name).is_none();
                }
                Err(outcome) => {
                    hasher.update(b"unreadable");
                    update_field(&mut hasher, outcome.source_file.as_bytes());
                    update_field(&mut hasher, outcome.error.as_deref().unwrap_or("").as_bytes());
                }
            }
        }
        if undated {
            update_field(&mut hasher, today.to_string().as_bytes());
        }
        Self::finish(hasher, sheet_index, recurrence_gap_days)
    }

    /// 数据库行集指纹
    pub fn for_row_set(table: &RawTable, recurrence_gap_days: i64) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(b"row_set");
        for header in &table.headers {
            update_field(&mut hasher, header.as_bytes());
        }
        for row in &table.rows {
            hasher.update((row.len() as u64).to_le_bytes());
            for cell in row {
                update_field(&mut hasher, cell.as_bytes());
            }
        }
        Self::finish(hasher, 0, recurrence_gap_days)
    }

    fn finish(mut hasher: Sha256, sheet_index: usize, recurrence_gap_days: i64) -> Self {
        hasher.update((sheet_index as u64).to_le_bytes());
        hasher.update(recurrence_gap_days.to_le_bytes());
        hasher.update(ALIAS_TABLE_VERSION.to_le_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// 字段 = u64 长度前缀 + 内容
fn update_field(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

// ==========================================
// AnalysisCache Trait
// ==========================================
pub trait AnalysisCache: Send + Sync {
    fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<AnalysisResult>>;

    fn put(&self, fingerprint: Fingerprint, result: Arc<AnalysisResult>);

    fn invalidate_all(&self);
}

// ==========================================
// InMemoryAnalysisCache - 进程内缓存
// ==========================================
// 容量有上限, 超出时淘汰最早写入的条目
struct CacheEntries {
    map: HashMap<Fingerprint, Arc<AnalysisResult>>,
    order: VecDeque<Fingerprint>, // 写入顺序, 队首最旧
}

pub struct InMemoryAnalysisCache {
    capacity: usize,
    entries: Mutex<CacheEntries>,
}

impl Default for InMemoryAnalysisCache {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryAnalysisCache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CACHE_CAPACITY)
    }

    /// 指定容量（最小为 1）
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: Mutex::new(CacheEntries {
                map: HashMap::new(),
                order: VecDeque::new(),
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AnalysisCache for InMemoryAnalysisCache {
    fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<AnalysisResult>> {
        match self.entries.lock() {
            Ok(entries) => entries.map.get(fingerprint).cloned(),
            Err(e) => {
                warn!(error = %e, "缓存锁获取失败, 视为未命中");
                None
            }
        }
    }

    fn put(&self, fingerprint: Fingerprint, result: Arc<AnalysisResult>) {
        let mut entries = match self.entries.lock() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "缓存锁获取失败, 跳过写入");
                return;
            }
        };

        if entries.map.insert(fingerprint.clone(), result).is_none() {
            entries.order.push_back(fingerprint);
        }
        while entries.map.len() > self.capacity {
            let Some(oldest) = entries.order.pop_front() else {
                break;
            };
            entries.map.remove(&oldest);
            debug!(fingerprint = %oldest, "缓存已满, 淘汰最早条目");
        }
    }

    fn invalidate_all(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.map.clear();
            entries.order.clear();
        }
    }
}

/// 不缓存（每次全量重算）
pub struct NoopAnalysisCache;

impl AnalysisCache for NoopAnalysisCache {
    fn get(&self, _fingerprint: &Fingerprint) -> Option<Arc<AnalysisResult>> {
        None
    }

    fn put(&self, _fingerprint: Fingerprint, _result: Arc<AnalysisResult>) {}

    fn invalidate_all(&self) {}
}
