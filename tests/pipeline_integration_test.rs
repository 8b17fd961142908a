// ==========================================
// 分析流水线集成测试
// ==========================================
// 测试目标: 快照文件 → 规范表 → 托盘汇总 / 透视 / 复发
// ==========================================

mod test_helpers;

use negative_inventory::domain::types::{PalletState, Severity};
use negative_inventory::engine::{AnalysisPipeline, InMemoryAnalysisCache};
use negative_inventory::importer::{load_paths, SnapshotInput};
use std::sync::Arc;
use test_helpers::{date, legacy_csv, single_pallet_csv};

fn today() -> chrono::NaiveDate {
    date(2024, 3, 15)
}

#[test]
fn test_duplicate_rows_kept_in_canonical_table() {
    negative_inventory::logging::init_test();

    let input = legacy_csv(
        "inventario_20240101.csv",
        &[
            ("A", "Tornillo", "P1", "ALM1", -5.0),
            ("A", "Tornillo", "P1", "ALM1", -5.0),
            ("B", "Tuerca", "P2", "ALM1", -10.0),
        ],
    );

    let pipeline = AnalysisPipeline::new(1);
    let result = pipeline
        .run_files(&[input], 1, today())
        .expect("analysis should succeed");

    // 导入阶段不去重
    assert_eq!(result.canonical.len(), 3);
    assert_eq!(result.summaries.len(), 2);

    let a = result
        .summaries
        .iter()
        .find(|s| s.unique_pallet_key == "A_P1")
        .expect("A_P1 summary");
    assert_eq!(a.occurrence_count, 1);
    assert_eq!(a.mean_qty, -5.0);
    assert_eq!(a.days_span, 1);

    // 透视阶段同键同日仅保留一条
    assert_eq!(result.pivot.row_count(), 2);
    assert_eq!(result.pivot.dates, vec![date(2024, 1, 1)]);
}

#[test]
fn test_gap_in_appearances_is_recurrence() {
    let inputs = vec![
        single_pallet_csv("inv_20240101.csv", "A", "P1", -3.0),
        single_pallet_csv("inv_20240102.csv", "A", "P1", -4.0),
        single_pallet_csv("inv_20240104.csv", "A", "P1", -2.0),
    ];

    let result = AnalysisPipeline::new(1)
        .run_files(&inputs, 1, today())
        .expect("analysis should succeed");

    assert_eq!(result.recurrences.len(), 1);
    let rec = &result.recurrences[0];
    assert_eq!(rec.unique_pallet_key, "A_P1");
    assert_eq!(
        rec.dates,
        vec![date(2024, 1, 1), date(2024, 1, 2), date(2024, 1, 4)]
    );
    assert_eq!(rec.max_gap_days, 2);
    assert_eq!(rec.formatted_dates(), "01-01-2024, 02-01-2024, 04-01-2024");

    let summary = &result.summaries[0];
    assert_eq!(summary.occurrence_count, 3);
    assert_eq!(summary.days_span, 4);
}

#[test]
fn test_consecutive_days_are_not_recurrence() {
    let inputs = vec![
        single_pallet_csv("inv_20240101.csv", "A", "P1", -3.0),
        single_pallet_csv("inv_20240102.csv", "A", "P1", -4.0),
    ];

    let result = AnalysisPipeline::new(1)
        .run_files(&inputs, 1, today())
        .expect("analysis should succeed");

    assert!(result.recurrences.is_empty());
}

#[test]
fn test_single_pallet_is_medium() {
    let input = single_pallet_csv("inv_20240101.csv", "A", "P1", -15.3);

    let result = AnalysisPipeline::new(1)
        .run_files(&[input], 1, today())
        .expect("analysis should succeed");

    assert_eq!(result.summaries.len(), 1);
    assert_eq!(result.summaries[0].severity, Some(Severity::Medium));
}

#[test]
fn test_identical_magnitudes_are_medium() {
    let input = legacy_csv(
        "inv_20240101.csv",
        &[
            ("A", "X", "P1", "ALM1", -10.0),
            ("B", "Y", "P2", "ALM1", -10.0),
        ],
    );

    let result = AnalysisPipeline::new(1)
        .run_files(&[input], 1, today())
        .expect("analysis should succeed");

    assert_eq!(result.summaries.len(), 2);
    for summary in &result.summaries {
        assert_eq!(summary.severity, Some(Severity::Medium));
    }
}

#[test]
fn test_undated_file_falls_back_to_today() {
    let input = single_pallet_csv("report_final.csv", "A", "P1", -1.0);

    let result = AnalysisPipeline::new(1)
        .run_files(&[input], 1, today())
        .expect("undated file should still be ingested");

    assert_eq!(result.canonical[0].report_date, today());
    assert_eq!(result.latest_report_date, Some(today()));
    assert_eq!(result.ingest_report.date_fallbacks(), vec!["report_final.csv"]);
}

#[test]
fn test_canonical_table_is_strictly_negative() {
    let input = legacy_csv(
        "inv_20240101.csv",
        &[
            ("A", "X", "P1", "ALM1", -1.0),
            ("B", "Y", "P2", "ALM1", 0.0),
            ("C", "Z", "P3", "ALM1", 7.5),
        ],
    );

    let result = AnalysisPipeline::new(1)
        .run_files(&[input], 1, today())
        .expect("analysis should succeed");

    assert!(result.canonical.iter().all(|r| r.negative_quantity < 0.0));
    assert_eq!(result.canonical.len(), 1);

    let diagnostics = result.ingest_report.total_diagnostics();
    assert_eq!(diagnostics.non_negative_dropped, 2);
}

#[test]
fn test_state_follows_global_latest_date() {
    let inputs = vec![
        legacy_csv(
            "inv_20240101.csv",
            &[
                ("A", "X", "P1", "ALM1", -1.0),
                ("B", "Y", "P2", "ALM1", -2.0),
            ],
        ),
        legacy_csv("inv_20240105.csv", &[("A", "X", "P1", "ALM1", -1.0)]),
    ];

    let result = AnalysisPipeline::new(1)
        .run_files(&inputs, 1, today())
        .expect("analysis should succeed");

    let state_of = |key: &str| {
        result
            .summaries
            .iter()
            .find(|s| s.unique_pallet_key == key)
            .map(|s| s.state)
    };
    assert_eq!(state_of("A_P1"), Some(PalletState::Active));
    assert_eq!(state_of("B_P2"), Some(PalletState::Resolved));
    assert!(result.summaries.iter().all(|s| s.days_span >= 1));
}

#[test]
fn test_quartile_severity_is_monotonic() {
    let rows: Vec<(String, f64)> = (1..=8).map(|i| (format!("C{}", i), -(i as f64))).collect();
    let borrowed: Vec<(&str, &str, &str, &str, f64)> = rows
        .iter()
        .map(|(code, qty)| (code.as_str(), "X", "P", "ALM1", *qty))
        .collect();
    let input = legacy_csv("inv_20240101.csv", &borrowed);

    let result = AnalysisPipeline::new(1)
        .run_files(&[input], 1, today())
        .expect("analysis should succeed");

    let mut by_magnitude: Vec<_> = result.summaries.iter().collect();
    by_magnitude.sort_by(|a, b| a.magnitude().total_cmp(&b.magnitude()));

    for pair in by_magnitude.windows(2) {
        assert!(pair[0].severity <= pair[1].severity);
    }
    assert_eq!(by_magnitude[0].severity, Some(Severity::Low));
    assert_eq!(by_magnitude[7].severity, Some(Severity::Critical));
}

#[test]
fn test_identifiers_are_normalized() {
    let content = "Código,Nombre,ID de Pallet,Almacén,Inventario Físico\n\
                   \"10,023.0\",Perno,P7.0,,-3\n";
    let input = SnapshotInput::new("inv_20240101.csv", content.as_bytes().to_vec());

    let result = AnalysisPipeline::new(1)
        .run_files(&[input], 1, today())
        .expect("analysis should succeed");

    let record = &result.canonical[0];
    assert_eq!(record.code, "10023");
    assert_eq!(record.pallet_id, "P7");
    assert_eq!(record.unique_pallet_key, "10023_P7");
    assert_eq!(record.warehouse, "N/A");
}

#[test]
fn test_bad_file_does_not_abort_batch() {
    let bad = SnapshotInput::new("roto_20240101.csv", b"foo,bar\n1,2\n".to_vec());
    let good = single_pallet_csv("inv_20240102.csv", "A", "P1", -4.0);

    let result = AnalysisPipeline::new(1)
        .run_files(&[bad, good], 1, today())
        .expect("one valid file is enough");

    assert_eq!(result.ingest_report.success_count(), 1);
    assert_eq!(result.ingest_report.failure_count(), 1);
    assert_eq!(result.canonical.len(), 1);

    let failed: Vec<_> = result.ingest_report.failed().collect();
    assert_eq!(failed[0].source_file, "roto_20240101.csv");
    assert!(failed[0].error.is_some());
}

#[test]
fn test_all_files_failing_is_no_valid_input() {
    let bad = SnapshotInput::new("roto_20240101.csv", b"foo,bar\n1,2\n".to_vec());
    let unsupported = SnapshotInput::new("notas_20240101.txt", b"hola".to_vec());

    let err = AnalysisPipeline::new(1)
        .run_files(&[bad, unsupported], 1, today())
        .expect_err("no valid input");

    assert!(err.is_no_valid_input());
}

#[test]
fn test_cached_result_is_reused() {
    let pipeline = AnalysisPipeline::with_cache(1, Arc::new(InMemoryAnalysisCache::new()));
    let inputs = vec![single_pallet_csv("inv_20240101.csv", "A", "P1", -1.0)];

    let first = pipeline.run_files(&inputs, 1, today()).expect("first run");
    let second = pipeline.run_files(&inputs, 1, today()).expect("second run");

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_concurrent_ingest_matches_sequential() {
    let inputs = vec![
        single_pallet_csv("inv_20240101.csv", "A", "P1", -3.0),
        single_pallet_csv("inv_20240103.csv", "A", "P1", -4.0),
        single_pallet_csv("inv_20240104.csv", "B", "P2", -9.0),
    ];

    let pipeline = AnalysisPipeline::new(1);
    let sequential = pipeline.run_files(&inputs, 1, today()).expect("sequential");
    let concurrent = pipeline
        .run_files_concurrent(inputs, 1, today())
        .await
        .expect("concurrent");

    assert_eq!(sequential.canonical, concurrent.canonical);
    assert_eq!(sequential.summaries, concurrent.summaries);
    assert_eq!(sequential.recurrences, concurrent.recurrences);
    assert_eq!(sequential.pivot, concurrent.pivot);
}

#[test]
fn test_unreadable_path_does_not_abort_batch() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let good = dir.path().join("inv_20240101.csv");
    std::fs::write(&good, "Código,ID de Pallet,Inventario Físico\nA,P1,-4\n")
        .expect("Failed to write snapshot");
    // 以目录冒充快照文件, 读取必然失败
    let unreadable = dir.path().join("adir_20240102.csv");
    std::fs::create_dir(&unreadable).expect("Failed to create dir");
    let missing = dir.path().join("gone_20240103.csv");

    let loaded = load_paths(&[good, unreadable, missing]);
    assert!(loaded[0].is_ok());
    assert!(loaded[1].is_err());
    assert!(loaded[2].is_err());

    let result = AnalysisPipeline::new(1)
        .run_loaded(&loaded, 1, today())
        .expect("one readable file is enough");

    assert_eq!(result.canonical.len(), 1);
    assert_eq!(result.ingest_report.success_count(), 1);
    assert_eq!(result.ingest_report.failure_count(), 2);
    let sources: Vec<&str> = result
        .ingest_report
        .outcomes
        .iter()
        .map(|o| o.source_file.as_str())
        .collect();
    assert_eq!(
        sources,
        vec!["inv_20240101.csv", "adir_20240102.csv", "gone_20240103.csv"]
    );
}

#[tokio::test]
async fn test_all_paths_unreadable_is_no_valid_input() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let unreadable = dir.path().join("adir_20240102.csv");
    std::fs::create_dir(&unreadable).expect("Failed to create dir");

    let loaded = load_paths(&[unreadable, dir.path().join("gone_20240103.csv")]);
    let err = AnalysisPipeline::new(1)
        .run_loaded_concurrent(loaded, 1, today())
        .await
        .expect_err("no readable input");

    assert!(err.is_no_valid_input());
}
