// ==========================================
// 负库存分析系统 - 分析结果导出
// ==========================================
// 职责: 将分析产出序列化为 CSV（及 JSON 摘要）
// 文件:
//   problemas_activos.csv / resueltos.csv  托盘汇总（按状态拆分）
//   reincidencias.csv                      复发记录
//   super_analisis.csv                     时间透视宽表
//   datos_crudos.csv                       规范表
//   top_n.csv                              Top N + 日期演变列
//   resumen.json                           看板指标 + 导入报告
// ==========================================

use crate::domain::inventory::{CanonicalRecord, PalletSummary, PivotMatrix, RecurrenceRecord};
use crate::domain::report::AnalysisResult;
use crate::engine::view_filter::{split_by_state, top_n, HeadlineMetrics, SummaryFilter};
use csv::Writer;
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("文件写入失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV 写入失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON 序列化失败: {0}")]
    Json(#[from] serde_json::Error),
}

pub type ExportResult<T> = Result<T, ExportError>;

const SUMMARY_HEADERS: [&str; 16] = [
    "ID_Unico_Pallet",
    "Codigo",
    "Nombre",
    "ID_Pallet",
    "Almacen",
    "Primera_Aparicion",
    "Ultima_Aparicion",
    "Veces_Reportado",
    "Cantidad_Promedio",
    "Cantidad_Minima",
    "Cantidad_Maxima",
    "Cantidad_Suma",
    "Dias_Acumulados",
    "Severidad",
    "Estado",
    "Score_Criticidad",
];

const TOP_N_HEADERS: [&str; 13] = [
    "Rank",
    "ID_Unico_Pallet",
    "Codigo",
    "Nombre",
    "ID_Pallet",
    "Almacen",
    "Score_Criticidad",
    "Dias_Acumulados",
    "Cantidad_Promedio",
    "Severidad",
    "Primera_Aparicion",
    "Ultima_Aparicion",
    "Estado",
];

fn fmt_date(date: chrono::NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

fn fmt_qty(value: f64) -> String {
    format!("{:.2}", value)
}

fn severity_label(summary: &PalletSummary) -> String {
    summary
        .severity
        .map(|s| s.report_label().to_string())
        .unwrap_or_default()
}

/// 托盘汇总
pub fn write_summaries<W: Write>(out: W, summaries: &[PalletSummary]) -> ExportResult<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(SUMMARY_HEADERS)?;
    for s in summaries {
        writer.write_record([
            s.unique_pallet_key.clone(),
            s.code.clone(),
            s.name.clone(),
            s.pallet_id.clone(),
            s.warehouse.clone(),
            fmt_date(s.first_seen),
            fmt_date(s.last_seen),
            s.occurrence_count.to_string(),
            fmt_qty(s.mean_qty),
            fmt_qty(s.min_qty),
            fmt_qty(s.max_qty),
            fmt_qty(s.sum_qty),
            s.days_span.to_string(),
            severity_label(s),
            s.state.report_label().to_string(),
            fmt_qty(s.criticality_score),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// 时间透视宽表（身份列在前, 日期列升序, 缺失为空）
pub fn write_pivot<W: Write>(out: W, pivot: &PivotMatrix) -> ExportResult<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record(pivot.column_headers())?;
    for row in &pivot.rows {
        let mut record = vec![
            row.key.code.clone(),
            row.key.name.clone(),
            row.key.pallet_id.clone(),
            row.key.warehouse.clone(),
        ];
        record.extend(row.cells.iter().map(|c| c.map(fmt_qty).unwrap_or_default()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// 复发记录
pub fn write_recurrences<W: Write>(out: W, recurrences: &[RecurrenceRecord]) -> ExportResult<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record([
        "ID_Unico_Pallet",
        "Codigo",
        "Nombre",
        "Almacen",
        "Fechas_Reportadas",
        "Max_Intervalo_Dias",
    ])?;
    for r in recurrences {
        writer.write_record([
            r.unique_pallet_key.clone(),
            r.code.clone(),
            r.name.clone(),
            r.warehouse.clone(),
            r.formatted_dates(),
            r.max_gap_days.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// 规范表（原始数据）
pub fn write_canonical<W: Write>(out: W, records: &[CanonicalRecord]) -> ExportResult<()> {
    let mut writer = Writer::from_writer(out);
    writer.write_record([
        "Codigo",
        "Nombre",
        "Almacen",
        "ID_Pallet",
        "Cantidad_Negativa",
        "Fecha_Reporte",
        "Archivo_Origen",
        "ID_Unico_Pallet",
    ])?;
    for r in records {
        writer.write_record([
            r.code.clone(),
            r.name.clone(),
            r.warehouse.clone(),
            r.pallet_id.clone(),
            r.negative_quantity.to_string(),
            fmt_date(r.report_date),
            r.source_file.clone(),
            r.unique_pallet_key.clone(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Top N（按关键度评分降序）, 附透视表中的日期演变列
pub fn write_top_n<W: Write>(
    out: W,
    summaries: &[PalletSummary],
    pivot: &PivotMatrix,
    n: usize,
) -> ExportResult<()> {
    let mut writer = Writer::from_writer(out);

    let mut headers: Vec<String> = TOP_N_HEADERS.iter().map(|h| h.to_string()).collect();
    headers.extend(pivot.dates.iter().map(|d| fmt_date(*d)));
    writer.write_record(&headers)?;

    // 同一托盘键存在多行透视时取第一行
    let mut evolution: HashMap<String, &[Option<f64>]> = HashMap::new();
    for row in &pivot.rows {
        evolution
            .entry(row.key.unique_pallet_key())
            .or_insert(row.cells.as_slice());
    }

    for (rank, s) in top_n(summaries, n).iter().enumerate() {
        let mut record = vec![
            (rank + 1).to_string(),
            s.unique_pallet_key.clone(),
            s.code.clone(),
            s.name.clone(),
            s.pallet_id.clone(),
            s.warehouse.clone(),
            fmt_qty(s.criticality_score),
            s.days_span.to_string(),
            fmt_qty(s.mean_qty),
            severity_label(s),
            fmt_date(s.first_seen),
            fmt_date(s.last_seen),
            s.state.report_label().to_string(),
        ];
        match evolution.get(&s.unique_pallet_key) {
            Some(cells) => record.extend(cells.iter().map(|c| c.map(fmt_qty).unwrap_or_default())),
            None => record.extend(std::iter::repeat(String::new()).take(pivot.dates.len())),
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct RunSummary<'a> {
    metrics: HeadlineMetrics,
    latest_report_date: Option<chrono::NaiveDate>,
    filter: &'a SummaryFilter,
    ingest_report: &'a crate::domain::report::IngestReport,
}

/// 导出全部产出到目录
///
/// 托盘汇总类文件应用 filter; 透视表、复发记录、规范表始终为全量
pub fn export_all(
    dir: &Path,
    result: &AnalysisResult,
    filter: &SummaryFilter,
    n: usize,
) -> ExportResult<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    let filtered = filter.apply(&result.summaries);
    let (active, resolved) = split_by_state(&filtered);

    let mut create = |name: &str| -> ExportResult<File> {
        let path = dir.join(name);
        let file = File::create(&path)?;
        written.push(path);
        Ok(file)
    };

    write_summaries(create("problemas_activos.csv")?, &active)?;
    write_summaries(create("resueltos.csv")?, &resolved)?;
    write_recurrences(create("reincidencias.csv")?, &result.recurrences)?;
    write_pivot(create("super_analisis.csv")?, &result.pivot)?;
    write_canonical(create("datos_crudos.csv")?, &result.canonical)?;
    write_top_n(create("top_n.csv")?, &filtered, &result.pivot, n)?;

    let summary = RunSummary {
        metrics: HeadlineMetrics::compute(&filtered),
        latest_report_date: result.latest_report_date,
        filter,
        ingest_report: &result.ingest_report,
    };
    serde_json::to_writer_pretty(create("resumen.json")?, &summary)?;

    info!(dir = %dir.display(), files = written.len(), "分析结果已导出");
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::{PivotKey, PivotRow};
    use crate::domain::types::{PalletState, Severity};
    use chrono::NaiveDate;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 5, d).unwrap()
    }

    fn to_string(buf: Vec<u8>) -> String {
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn test_pivot_blank_cells() {
        let pivot = PivotMatrix {
            dates: vec![date(1), date(2)],
            rows: vec![PivotRow {
                key: PivotKey {
                    code: "A".to_string(),
                    name: "Tornillo".to_string(),
                    pallet_id: "P1".to_string(),
                    warehouse: "ALM01".to_string(),
                },
                cells: vec![Some(-5.0), None],
            }],
        };
        let mut buf = Vec::new();
        write_pivot(&mut buf, &pivot).unwrap();
        assert_eq!(
            to_string(buf),
            "Codigo,Nombre,ID_Pallet,Almacen,2025-05-01,2025-05-02\nA,Tornillo,P1,ALM01,-5.00,\n"
        );
    }

    #[test]
    fn test_recurrence_dates_column() {
        let rec = RecurrenceRecord {
            unique_pallet_key: "A_P1".to_string(),
            code: "A".to_string(),
            name: String::new(),
            warehouse: "N/A".to_string(),
            dates: vec![date(1), date(3)],
            max_gap_days: 2,
        };
        let mut buf = Vec::new();
        write_recurrences(&mut buf, &[rec]).unwrap();
        let text = to_string(buf);
        assert!(text.contains("\"01-05-2025, 03-05-2025\""));
    }

    #[test]
    fn test_top_n_rank_and_evolution() {
        let summary = PalletSummary {
            unique_pallet_key: "A_P1".to_string(),
            code: "A".to_string(),
            name: String::new(),
            pallet_id: "P1".to_string(),
            warehouse: "N/A".to_string(),
            first_seen: date(1),
            last_seen: date(2),
            occurrence_count: 2,
            days_span: 2,
            mean_qty: -3.0,
            min_qty: -4.0,
            max_qty: -2.0,
            sum_qty: -6.0,
            severity: Some(Severity::Critical),
            state: PalletState::Active,
            criticality_score: 6.0,
        };
        let pivot = PivotMatrix {
            dates: vec![date(1), date(2)],
            rows: vec![PivotRow {
                key: PivotKey {
                    code: "A".to_string(),
                    name: String::new(),
                    pallet_id: "P1".to_string(),
                    warehouse: "N/A".to_string(),
                },
                cells: vec![Some(-4.0), Some(-2.0)],
            }],
        };

        let mut buf = Vec::new();
        write_top_n(&mut buf, &[summary], &pivot, 10).unwrap();
        let text = to_string(buf);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("Estado,2025-05-01,2025-05-02"));
        assert!(lines[1].starts_with("1,A_P1,A,"));
        assert!(lines[1].ends_with("Crítico,2025-05-01,2025-05-02,Activo,-4.00,-2.00"));
    }
}
