// ==========================================
// 负库存分析系统 - 命令行入口
// ==========================================
// 子命令:
//   analyze      分析一批快照文件并导出结果
//   analyze-db   分析 SQLite 明细库
//   store        导入快照文件并写入 SQLite 明细库
//   validate-db  校验 SQLite 明细库结构
//   config       读写 config_kv 中的分析配置
// ==========================================

use anyhow::anyhow;
use clap::{Args, Parser, Subcommand};
use negative_inventory::config::{config_keys, AnalysisConfig, ConfigManager};
use negative_inventory::db::get_default_db_path;
use negative_inventory::domain::report::AnalysisResult;
use negative_inventory::domain::types::{PalletState, Severity, SourceFormat};
use negative_inventory::engine::{
    failure_summary, AnalysisPipeline, HeadlineMetrics, InMemoryAnalysisCache, PivotFilter,
};
use negative_inventory::export::{export_all, write_pivot};
use negative_inventory::importer::{load_paths, SnapshotIngestor};
use negative_inventory::repository::SnapshotRepository;
use negative_inventory::logging;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "neg-inventory", version, about = "负库存快照分析")]
struct Cli {
    /// 以 JSON 行格式输出日志
    #[arg(long, global = true)]
    json_logs: bool,

    /// 配置库路径（默认: NEG_INVENTORY_DB_PATH 或用户数据目录）
    #[arg(long, global = true)]
    config_db: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    Analyze {
        /// 快照文件（.xlsx/.xls/.ods/.csv）
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        /// 并发导入
        #[arg(long)]
        concurrent: bool,
        #[command(flatten)]
        options: AnalysisOptions,
    },
    AnalyzeDb {
        /// 明细库路径
        #[arg(long)]
        db: String,
        #[command(flatten)]
        options: AnalysisOptions,
    },
    Store {
        #[arg(long)]
        db: String,
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        sheet: Option<usize>,
        #[arg(long, value_parser = parse_source_format)]
        format: Option<SourceFormat>,
    },
    ValidateDb {
        #[arg(long)]
        db: String,
    },
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand)]
enum ConfigCommand {
    Show,
    Set { key: String, value: String },
}

#[derive(Args)]
struct AnalysisOptions {
    /// 工作表索引（从 0 开始）
    #[arg(long)]
    sheet: Option<usize>,
    /// 来源格式: legacy / raw-erp
    #[arg(long, value_parser = parse_source_format)]
    format: Option<SourceFormat>,
    #[arg(long)]
    top_n: Option<usize>,
    /// 复发判定间隔（天）
    #[arg(long)]
    gap_days: Option<i64>,
    #[arg(long = "warehouse")]
    warehouses: Vec<String>,
    #[arg(long = "severity", value_parser = parse_severity)]
    severities: Vec<Severity>,
    #[arg(long = "state", value_parser = parse_state)]
    states: Vec<PalletState>,
    #[command(flatten)]
    pivot: PivotOptions,
    /// 导出目录
    #[arg(long, default_value = "./reporte_inventario")]
    out: PathBuf,
}

/// 透视表视图（任一条件生效时额外导出 super_analisis_vista.csv）
#[derive(Args)]
struct PivotOptions {
    /// 起始日期 YYYY-MM-DD（含）
    #[arg(long = "from")]
    date_from: Option<chrono::NaiveDate>,
    /// 截止日期 YYYY-MM-DD（含）
    #[arg(long = "to")]
    date_to: Option<chrono::NaiveDate>,
    /// 仅保留窗口内最后一天仍为负的托盘
    #[arg(long)]
    only_active: bool,
    #[arg(long = "code")]
    include_codes: Vec<String>,
    #[arg(long = "exclude-code")]
    exclude_codes: Vec<String>,
    /// 编码模糊搜索（不区分大小写）
    #[arg(long)]
    search: Option<String>,
}

impl PivotOptions {
    fn to_filter(&self) -> PivotFilter {
        PivotFilter {
            date_from: self.date_from,
            date_to: self.date_to,
            only_active: self.only_active,
            include_codes: self.include_codes.clone(),
            exclude_codes: self.exclude_codes.clone(),
            code_search: self.search.clone(),
        }
    }
}

fn parse_source_format(s: &str) -> Result<SourceFormat, String> {
    SourceFormat::parse(s).ok_or_else(|| format!("未知来源格式: {}", s))
}

fn parse_severity(s: &str) -> Result<Severity, String> {
    Severity::parse(s).ok_or_else(|| format!("未知严重度: {}", s))
}

fn parse_state(s: &str) -> Result<PalletState, String> {
    PalletState::parse(s).ok_or_else(|| format!("未知状态: {}", s))
}

fn open_config(path: Option<&str>) -> anyhow::Result<ConfigManager> {
    let path = path.map(str::to_string).unwrap_or_else(get_default_db_path);
    tracing::debug!(config_db = %path, "打开配置库");
    ConfigManager::new(&path).map_err(|e| anyhow!(e))
}

/// 存储值 + 命令行覆写
async fn resolve_config(
    config_db: Option<&str>,
    options: &AnalysisOptions,
) -> anyhow::Result<AnalysisConfig> {
    let manager = open_config(config_db)?;
    let mut config = AnalysisConfig::load(&manager).await.map_err(|e| anyhow!(e))?;

    if let Some(format) = options.format {
        config.source_format = format;
        config.sheet_index = format.default_sheet_index();
    }
    if let Some(sheet) = options.sheet {
        config.sheet_index = sheet;
    }
    if let Some(n) = options.top_n {
        config.top_n = n;
    }
    if let Some(gap) = options.gap_days {
        config.recurrence_gap_days = gap.max(1);
    }
    if !options.warehouses.is_empty() {
        config.filter.warehouses = options.warehouses.clone();
    }
    if !options.severities.is_empty() {
        config.filter.severities = options.severities.clone();
    }
    if !options.states.is_empty() {
        config.filter.states = options.states.clone();
    }
    Ok(config)
}

fn today() -> chrono::NaiveDate {
    chrono::Local::now().date_naive()
}

fn report(
    result: &AnalysisResult,
    config: &AnalysisConfig,
    pivot_filter: &PivotFilter,
    out: &Path,
) -> anyhow::Result<()> {
    for failure in failure_summary(&result.ingest_report) {
        println!("失败: {}", failure);
    }
    for file in result.ingest_report.date_fallbacks() {
        println!("警告: {} 文件名无日期, 使用当日日期", file);
    }
    let diagnostics = result.ingest_report.total_diagnostics();
    if diagnostics.invalid_quantity > 0 || diagnostics.invalid_date > 0 {
        println!(
            "警告: 数量无法解析 {} 行, 日期无法解析 {} 行",
            diagnostics.invalid_quantity, diagnostics.invalid_date
        );
    }

    let metrics = HeadlineMetrics::compute(&config.filter.apply(&result.summaries));
    println!(
        "托盘: {}  活跃: {}  已解决: {}  平均持续天数: {:.1}  负值合计: {:.2}  复发: {}",
        metrics.total_pallets,
        metrics.active_pallets,
        metrics.resolved_pallets,
        metrics.mean_days_span,
        metrics.total_negative_quantity,
        result.recurrences.len()
    );

    let files = export_all(out, result, &config.filter, config.top_n)?;
    println!("已导出 {} 个文件到 {}", files.len(), out.display());

    if *pivot_filter != PivotFilter::default() {
        let view = pivot_filter.apply(&result.pivot);
        let path = out.join("super_analisis_vista.csv");
        write_pivot(std::fs::File::create(&path)?, &view)?;
        println!(
            "透视视图: {} 行 x {} 天 → {}",
            view.row_count(),
            view.dates.len(),
            path.display()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.json_logs);

    tracing::info!(version = negative_inventory::VERSION, "{}", negative_inventory::APP_NAME);
    let config_db = cli.config_db.as_deref();

    match cli.command {
        Command::Analyze {
            inputs,
            concurrent,
            options,
        } => {
            let config = resolve_config(config_db, &options).await?;
            let loaded = load_paths(&inputs);
            let pipeline = AnalysisPipeline::with_cache(
                config.recurrence_gap_days,
                Arc::new(InMemoryAnalysisCache::new()),
            );

            let result = if concurrent {
                pipeline
                    .run_loaded_concurrent(loaded, config.sheet_index, today())
                    .await?
            } else {
                pipeline.run_loaded(&loaded, config.sheet_index, today())?
            };
            report(&result, &config, &options.pivot.to_filter(), &options.out)?;
        }
        Command::AnalyzeDb { db, options } => {
            let config = resolve_config(config_db, &options).await?;
            let repo = SnapshotRepository::new(&db)?;
            let pipeline = AnalysisPipeline::new(config.recurrence_gap_days);
            let result = pipeline.run_repository(&repo, &db)?;
            report(&result, &config, &options.pivot.to_filter(), &options.out)?;
        }
        Command::Store {
            db,
            inputs,
            sheet,
            format,
        } => {
            let format = format.unwrap_or(SourceFormat::Legacy);
            let sheet = sheet.unwrap_or_else(|| format.default_sheet_index());
            let loaded = load_paths(&inputs);

            let (records, ingest_report) =
                SnapshotIngestor::new().ingest_loaded(&loaded, sheet, today())?;
            for failure in failure_summary(&ingest_report) {
                println!("失败: {}", failure);
            }

            let repo = SnapshotRepository::new(&db)?;
            repo.create_schema()?;
            let inserted = repo.replace_snapshots(&records)?;
            println!("已写入 {} 行到 {}", inserted, db);
        }
        Command::ValidateDb { db } => {
            let repo = SnapshotRepository::new(&db)?;
            let validation = repo.validate_schema()?;
            println!("{}", serde_json::to_string_pretty(&validation)?);
            if validation.non_negative_rows > 0 {
                println!("警告: {} 行数量 >= 0, 分析时将被过滤", validation.non_negative_rows);
            }
        }
        Command::Config { action } => {
            let manager = open_config(config_db)?;
            match action {
                ConfigCommand::Show => {
                    let config = AnalysisConfig::load(&manager).await.map_err(|e| anyhow!(e))?;
                    println!("{}", serde_json::to_string_pretty(&config)?);
                    println!("{}", manager.get_config_snapshot().map_err(|e| anyhow!(e))?);
                }
                ConfigCommand::Set { key, value } => {
                    if !config_keys::ALL.contains(&key.as_str()) {
                        return Err(anyhow!(
                            "未知配置键: {} (可用: {})",
                            key,
                            config_keys::ALL.join(", ")
                        ));
                    }
                    manager
                        .set_global_config_value(&key, &value)
                        .map_err(|e| anyhow!(e))?;
                    println!("{} = {}", key, value);
                }
            }
        }
    }

    Ok(())
}
