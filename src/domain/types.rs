// ==========================================
// 负库存分析系统 - 领域类型定义
// ==========================================
// 严重度: 有序四档 (Low < Medium < High < Critical)
// 状态: 相对于全量数据集的最新快照日期判定
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 严重度 (Severity)
// ==========================================
// 顺序: Low < Medium < High < Critical
// 序列化格式: SCREAMING_SNAKE_CASE
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Low,      // 低
    Medium,   // 中
    High,     // 高
    Critical, // 严重
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "LOW"),
            Severity::Medium => write!(f, "MEDIUM"),
            Severity::High => write!(f, "HIGH"),
            Severity::Critical => write!(f, "CRITICAL"),
        }
    }
}

impl Severity {
    /// 所有档位（升序）
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// 从字符串解析严重度
    ///
    /// 兼容 ERP 报表中的西语标签（Bajo/Medio/Alto/Crítico）
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LOW" | "BAJO" => Some(Severity::Low),
            "MEDIUM" | "MEDIO" => Some(Severity::Medium),
            "HIGH" | "ALTO" => Some(Severity::High),
            "CRITICAL" | "CRÍTICO" | "CRITICO" => Some(Severity::Critical),
            _ => None,
        }
    }

    /// 报表标签（与历史导出报表保持一致）
    pub fn report_label(&self) -> &'static str {
        match self {
            Severity::Low => "Bajo",
            Severity::Medium => "Medio",
            Severity::High => "Alto",
            Severity::Critical => "Crítico",
        }
    }
}

// ==========================================
// 托盘问题状态 (Pallet State)
// ==========================================
// Active: last_seen == 数据集最大 report_date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PalletState {
    Active,   // 仍在最新快照中
    Resolved, // 已从最新快照中消失
}

impl fmt::Display for PalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PalletState::Active => write!(f, "ACTIVE"),
            PalletState::Resolved => write!(f, "RESOLVED"),
        }
    }
}

impl PalletState {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ACTIVE" | "ACTIVO" => Some(PalletState::Active),
            "RESOLVED" | "RESUELTO" => Some(PalletState::Resolved),
            _ => None,
        }
    }

    pub fn report_label(&self) -> &'static str {
        match self {
            PalletState::Active => "Activo",
            PalletState::Resolved => "Resuelto",
        }
    }
}

// ==========================================
// 快照来源格式 (Source Format)
// ==========================================
// 决定默认工作表索引: 旧版导出取第二张表, ERP 原始导出取第一张表
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceFormat {
    Legacy, // 旧版汇总报表
    RawErp, // ERP 原始导出
}

impl SourceFormat {
    /// 默认工作表索引（从 0 开始）
    pub fn default_sheet_index(&self) -> usize {
        match self {
            SourceFormat::Legacy => 1,
            SourceFormat::RawErp => 0,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "LEGACY" => Some(SourceFormat::Legacy),
            "RAW_ERP" | "ERP" => Some(SourceFormat::RawErp),
            _ => None,
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceFormat::Legacy => write!(f, "LEGACY"),
            SourceFormat::RawErp => write!(f, "RAW_ERP"),
        }
    }
}
