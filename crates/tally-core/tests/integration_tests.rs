//! Integration tests for tally-core
//!
//! These tests exercise the full parse → store → ingest → summarize workflow
//! against SQLite and a local object store.

use tally_core::{
    context::ContextAssembler,
    db::Database,
    import::parse_spreadsheet,
    models::Month,
    pipeline::{FileOutcome, Pipeline, Upload},
    storage::LocalObjectStore,
    summarize,
    test_utils::{csv_fixture, register, sample_sales},
    ContextConfig, Error, IngestConfig, IngestionService, RecordFilter, RecordStore, SourceFile,
};
use chrono::NaiveDate;
use tempfile::TempDir;

fn fevereiro_rows() -> Vec<u8> {
    csv_fixture(
        &["produto", "quantidade"],
        &[&["Caneta", "10"], &["", "5"], &["Caderno", "abc"]],
    )
}

fn setup() -> (TempDir, Database, LocalObjectStore) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let db = Database::in_memory().expect("Failed to create in-memory database");
    let objects =
        LocalObjectStore::new(dir.path().join("files")).expect("Failed to create object store");
    (dir, db, objects)
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn test_fevereiro_scenario() {
    // Text content under a workbook name falls back to delimited parsing
    let result = parse_spreadsheet(&fevereiro_rows(), "Fevereiro-2025.xlsx").unwrap();

    assert_eq!(result.read, 3);
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.warnings.len(), 2);

    let caneta = &result.records[0];
    assert_eq!(caneta.product, "Caneta");
    assert_eq!(caneta.quantity, 10);
    assert_eq!(caneta.month, Month::Fevereiro);
    assert_eq!(caneta.year, 2025);
    assert_eq!(caneta.source_filename, "Fevereiro-2025.xlsx");
}

#[test]
fn test_fevereiro_workbook() {
    let bytes = include_bytes!("fixtures/Fevereiro-2025.xlsx");
    let result = parse_spreadsheet(bytes, "Fevereiro-2025.xlsx").unwrap();

    assert_eq!(result.read, 3);
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.rejections.len(), 2);
    assert_eq!(result.warnings.len(), 2);
    assert!(result.warnings[0].starts_with("Row 2"));

    let caneta = &result.records[0];
    assert_eq!(caneta.product, "Caneta");
    assert_eq!(caneta.quantity, 10);
    assert_eq!(caneta.unit_price, Some(2.5));
    assert_eq!(caneta.month, Month::Fevereiro);
    assert_eq!(caneta.year, 2025);
    let date = caneta.transaction_date.expect("date column parsed");
    assert_eq!(date.date_naive(), NaiveDate::from_ymd_opt(2025, 2, 1).unwrap());

    // Only the first sheet is read
    assert!(result.records.iter().all(|r| r.product != "Ignorado"));
    assert!(result.rejections.iter().all(|r| r.product != "Ignorado"));
}

#[test]
fn test_unrecognized_filename_fails() {
    let err = parse_spreadsheet(&fevereiro_rows(), "vendas.csv").unwrap_err();
    assert!(matches!(err, Error::PeriodNotFound { .. }));
}

// =============================================================================
// Ingestion against SQLite
// =============================================================================

#[test]
fn test_reingest_replaces_previous_records() {
    let db = Database::in_memory().unwrap();
    let key = "ana/Janeiro 2025.csv";
    register(&db, "ana", key);
    let source = SourceFile::new(key, "Janeiro 2025.csv");
    let service = IngestionService::new(&db, IngestConfig::default());

    let first = parse_spreadsheet(
        &csv_fixture(
            &["Produto", "Qtd"],
            &[&["Caneta", "1"], &["Lápis", "2"], &["Borracha", "3"]],
        ),
        "Janeiro 2025.csv",
    )
    .unwrap();
    service.ingest("ana", &source, &first.records).unwrap();

    let second = parse_spreadsheet(
        &csv_fixture(&["Produto", "Qtd"], &[&["Caneta", "7"], &["Régua", "4"]]),
        "Janeiro 2025.csv",
    )
    .unwrap();
    let report = service.ingest("ana", &source, &second.records).unwrap();
    assert_eq!(report.deleted, 3);
    assert_eq!(report.inserted, 2);

    let stored = db.select(&RecordFilter::owner("ana")).unwrap();
    let mut products: Vec<_> = stored.iter().map(|r| r.product.as_str()).collect();
    products.sort();
    assert_eq!(products, vec!["Caneta", "Régua"]);
}

#[test]
fn test_chunked_ingest_into_sqlite() {
    let db = Database::in_memory().unwrap();
    let key = "ana/Janeiro 2025.csv";
    register(&db, "ana", key);

    let service = IngestionService::new(&db, IngestConfig::default());
    let report = service
        .ingest(
            "ana",
            &SourceFile::new(key, "Janeiro 2025.csv"),
            &sample_sales(1200),
        )
        .unwrap();

    assert_eq!(report.received, 1200);
    assert_eq!(report.inserted, 1200);
    assert_eq!(db.count_records("ana").unwrap(), 1200);
}

#[test]
fn test_ingest_into_foreign_file_is_forbidden() {
    let db = Database::in_memory().unwrap();
    let key = "bruno/Janeiro 2025.csv";
    register(&db, "bruno", key);

    let service = IngestionService::new(&db, IngestConfig::default());
    let err = service
        .ingest(
            "ana",
            &SourceFile::new(key, "Janeiro 2025.csv"),
            &sample_sales(3),
        )
        .unwrap_err();

    assert!(matches!(err, Error::Forbidden { .. }));
    assert_eq!(db.count_records("ana").unwrap(), 0);
    assert_eq!(db.count_records("bruno").unwrap(), 0);
}

// =============================================================================
// Aggregation
// =============================================================================

#[test]
fn test_tie_listed_alphabetically() {
    let db = Database::in_memory().unwrap();
    let key = "ana/Maio 2025.csv";
    register(&db, "ana", key);

    let parsed = parse_spreadsheet(
        &csv_fixture(&["produto", "quantidade"], &[&["B", "5"], &["A", "5"]]),
        "Maio 2025.csv",
    )
    .unwrap();
    IngestionService::new(&db, IngestConfig::default())
        .ingest("ana", &SourceFile::new(key, "Maio 2025.csv"), &parsed.records)
        .unwrap();

    let stored = db.select(&RecordFilter::owner("ana")).unwrap();
    let rendered = summarize(&stored).render();
    assert!(rendered.contains("Maio/2025:\n1. A: 5\n2. B: 5\n"));

    // Same input, same text
    assert_eq!(rendered, summarize(&stored).render());
}

// =============================================================================
// Full pipeline
// =============================================================================

#[test]
fn test_upload_summarize_delete_workflow() {
    let (_dir, db, objects) = setup();
    let pipeline = Pipeline::new(&db, &objects, IngestConfig::default());

    let report = pipeline
        .upload_batch(
            "ana",
            &[
                Upload::new("Fevereiro-2025.csv", fevereiro_rows()),
                Upload::new(
                    "marco_2025.csv",
                    csv_fixture(&["Produto", "Qtd"], &[&["Caderno", "4"], &["Caneta", "4"]]),
                ),
                Upload::new("sem data.csv", fevereiro_rows()),
            ],
        )
        .unwrap();

    assert_eq!(report.ingested(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.total_read, 5);
    assert_eq!(report.total_inserted, 3);
    match &report.outcomes[0] {
        FileOutcome::Ingested { warnings, .. } => assert_eq!(warnings.len(), 2),
        other => panic!("unexpected outcome: {other:?}"),
    }

    let ctx = ContextAssembler::new(&db, ContextConfig::default())
        .for_owner("ana")
        .unwrap();
    assert_eq!(ctx.record_count, 3);
    let facts = ctx.facts();
    assert!(facts.contains("Fevereiro/2025:\n1. Caneta: 10\n"));
    assert!(facts.contains("Março/2025:\n1. Caderno: 4\n2. Caneta: 4\n"));

    let deleted = pipeline.delete_file("ana", "ana/Fevereiro-2025.csv").unwrap();
    assert_eq!(deleted.records_deleted, 1);
    assert!(deleted.object_deleted);

    let counts = pipeline.period_counts("ana").unwrap();
    assert_eq!(counts.len(), 1);
    assert_eq!(counts[0].period.month, Month::Marco);
    assert_eq!(counts[0].records, 2);
}

#[test]
fn test_reprocess_rebuilds_from_stored_files() {
    let (_dir, db, objects) = setup();
    let pipeline = Pipeline::new(&db, &objects, IngestConfig::default());
    pipeline
        .upload_batch(
            "ana",
            &[
                Upload::new("Janeiro 2025.csv", csv_fixture(&["produto", "qtd"], &[&["A", "1"]])),
                Upload::new("Abril 2025.csv", csv_fixture(&["produto", "qtd"], &[&["B", "2"]])),
            ],
        )
        .unwrap();

    let report = pipeline.reprocess_all("ana").unwrap();
    assert_eq!(report.cleared, 2);
    assert_eq!(report.batch.ingested(), 2);
    assert_eq!(db.count_records("ana").unwrap(), 2);
}

#[test]
fn test_owners_are_isolated() {
    let (_dir, db, objects) = setup();
    let pipeline = Pipeline::new(&db, &objects, IngestConfig::default());
    let upload = Upload::new(
        "Junho 2025.csv",
        csv_fixture(&["produto", "quantidade"], &[&["Caneta", "1"]]),
    );

    pipeline.upload_batch("ana", &[upload.clone()]).unwrap();
    pipeline.upload_batch("bruno", &[upload]).unwrap();

    assert!(matches!(
        pipeline.delete_file("ana", "bruno/Junho 2025.csv"),
        Err(Error::Forbidden { .. })
    ));
    assert_eq!(db.count_records("ana").unwrap(), 1);
    assert_eq!(db.count_records("bruno").unwrap(), 1);
}
