// ==========================================
// 配置 + 导出 集成测试
// ==========================================
// 测试目标: config_kv 存储值驱动分析, 导出文件落盘
// ==========================================

mod test_helpers;

use negative_inventory::config::{config_keys, AnalysisConfig, ConfigManager};
use negative_inventory::domain::types::{PalletState, Severity, SourceFormat};
use negative_inventory::engine::AnalysisPipeline;
use negative_inventory::export::export_all;
use test_helpers::{create_test_db, date, legacy_csv, single_pallet_csv};

#[tokio::test]
async fn test_stored_values_drive_config() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    manager
        .set_global_config_value(config_keys::SOURCE_FORMAT, "raw-erp")
        .expect("set source format");
    manager
        .set_global_config_value(config_keys::RECURRENCE_GAP_DAYS, "7")
        .expect("set gap");
    manager
        .set_global_config_value(config_keys::FILTER_SEVERITIES, "Critical, Alto, ???")
        .expect("set severities");
    manager
        .set_global_config_value(config_keys::FILTER_STATES, "ACTIVE")
        .expect("set states");

    let config = AnalysisConfig::load(&manager).await.expect("load config");
    assert_eq!(config.source_format, SourceFormat::RawErp);
    assert_eq!(config.sheet_index, 0);
    assert_eq!(config.top_n, 10);
    assert_eq!(config.recurrence_gap_days, 7);
    assert_eq!(config.filter.severities, vec![Severity::Critical, Severity::High]);
    assert_eq!(config.filter.states, vec![PalletState::Active]);
}

#[tokio::test]
async fn test_malformed_values_fall_back_to_defaults() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");

    manager
        .set_global_config_value(config_keys::TOP_N, "diez")
        .expect("set top_n");
    manager
        .set_global_config_value(config_keys::RECURRENCE_GAP_DAYS, "0")
        .expect("set gap");

    let config = AnalysisConfig::load(&manager).await.expect("load config");
    assert_eq!(config.top_n, 10);
    assert_eq!(config.recurrence_gap_days, 1);
}

#[tokio::test]
async fn test_weekly_gap_suppresses_weekly_cadence() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let manager = ConfigManager::new(&db_path).expect("Failed to create ConfigManager");
    manager
        .set_global_config_value(config_keys::RECURRENCE_GAP_DAYS, "7")
        .expect("set gap");
    let config = AnalysisConfig::load(&manager).await.expect("load config");

    let inputs = vec![
        single_pallet_csv("inv_20240101.csv", "A", "P1", -1.0),
        single_pallet_csv("inv_20240108.csv", "A", "P1", -1.0),
        single_pallet_csv("inv_20240115.csv", "A", "P1", -1.0),
    ];

    let weekly = AnalysisPipeline::new(config.recurrence_gap_days)
        .run_files(&inputs, config.sheet_index, date(2024, 3, 15))
        .expect("analysis should succeed");
    assert!(weekly.recurrences.is_empty());

    let daily = AnalysisPipeline::new(1)
        .run_files(&inputs, config.sheet_index, date(2024, 3, 15))
        .expect("analysis should succeed");
    assert_eq!(daily.recurrences.len(), 1);
}

#[test]
fn test_export_all_writes_report_files() {
    let inputs = vec![
        legacy_csv(
            "inv_20240101.csv",
            &[
                ("A", "Tornillo", "P1", "ALM1", -5.0),
                ("B", "Tuerca", "P2", "ALM2", -10.0),
            ],
        ),
        legacy_csv("inv_20240103.csv", &[("A", "Tornillo", "P1", "ALM1", -6.0)]),
    ];
    let result = AnalysisPipeline::new(1)
        .run_files(&inputs, 1, date(2024, 3, 15))
        .expect("analysis should succeed");

    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let config = AnalysisConfig::default();
    let written = export_all(dir.path(), &result, &config.filter, config.top_n)
        .expect("export should succeed");

    let names: Vec<String> = written
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()).map(str::to_string))
        .collect();
    for expected in [
        "problemas_activos.csv",
        "resueltos.csv",
        "reincidencias.csv",
        "super_analisis.csv",
        "datos_crudos.csv",
        "top_n.csv",
        "resumen.json",
    ] {
        assert!(names.iter().any(|n| n == expected), "missing {}", expected);
    }

    let pivot = std::fs::read_to_string(dir.path().join("super_analisis.csv")).expect("read pivot");
    let header = pivot.lines().next().unwrap_or_default();
    assert_eq!(header, "Codigo,Nombre,ID_Pallet,Almacen,2024-01-01,2024-01-03");

    let recurrences =
        std::fs::read_to_string(dir.path().join("reincidencias.csv")).expect("read recurrences");
    assert!(recurrences.contains("01-01-2024, 03-01-2024"));

    let summary: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(dir.path().join("resumen.json")).expect("read summary"),
    )
    .expect("summary is valid JSON");
    assert_eq!(summary["metrics"]["total_pallets"], 2);
    assert_eq!(summary["metrics"]["active_pallets"], 1);
    assert_eq!(summary["latest_report_date"], "2024-01-03");
}
