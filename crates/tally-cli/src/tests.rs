//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::PathBuf;

use tally_core::config::Config;
use tally_core::db::Database;
use tally_core::storage::LocalObjectStore;
use tally_core::store::{FileRegistry, RecordFilter, RecordStore};
use tally_core::test_utils::csv_fixture;
use tempfile::TempDir;

use crate::commands::{self, truncate};

struct Env {
    dir: TempDir,
    db: Database,
    objects: LocalObjectStore,
    config: Config,
}

fn setup() -> Env {
    let dir = TempDir::new().unwrap();
    let mut config = Config::embedded().unwrap();
    config.storage.dir = dir.path().join("files");
    let objects = LocalObjectStore::new(&config.storage.dir).unwrap();
    Env {
        db: Database::in_memory().unwrap(),
        objects,
        config,
        dir,
    }
}

/// Write a spreadsheet into the temp dir and return its path
fn write_file(env: &Env, name: &str, rows: &[&[&str]]) -> PathBuf {
    let path = env.dir.path().join(name);
    std::fs::write(&path, csv_fixture(&["Produto", "Quantidade", "Preço Unitário"], rows)).unwrap();
    path
}

// ========== Shared Utility Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("Caneta", 10), "Caneta");
    assert_eq!(truncate("Caderno universitário", 10), "Caderno...");
    assert_eq!(truncate("ção ção ção", 6), "ção...");
}

#[test]
fn test_require_owner() {
    assert_eq!(commands::require_owner(Some("ana")).unwrap(), "ana");
    assert_eq!(commands::require_owner(Some("  ana ")).unwrap(), "ana");
    assert!(commands::require_owner(Some("   ")).is_err());
    assert!(commands::require_owner(None).is_err());
}

#[test]
fn test_cmd_init() {
    let env = setup();
    let db_path = env.dir.path().join("tally.db");
    commands::cmd_init(&db_path, &env.config).unwrap();
    assert!(db_path.exists());
}

// ========== Preview Tests ==========

#[test]
fn test_cmd_preview() {
    let env = setup();
    let path = write_file(&env, "Fevereiro-2025.csv", &[&["Caneta", "10", "2,50"], &["", "5", ""]]);

    assert!(commands::cmd_preview(&path, &env.config, false).is_ok());
    assert!(commands::cmd_preview(&path, &env.config, true).is_ok());

    // Nothing is stored by a preview
    assert_eq!(env.db.count_records("ana").unwrap(), 0);
}

#[test]
fn test_cmd_preview_without_period() {
    let env = setup();
    let path = write_file(&env, "vendas.csv", &[&["Caneta", "10", ""]]);
    let result = commands::cmd_preview(&path, &env.config, false);
    assert!(result.is_err());
}

#[test]
fn test_cmd_preview_missing_file() {
    let env = setup();
    let result = commands::cmd_preview(&env.dir.path().join("Maio 2025.csv"), &env.config, false);
    assert!(result.unwrap_err().to_string().contains("Failed to read file"));
}

// ========== Upload Tests ==========

#[test]
fn test_cmd_upload() {
    let env = setup();
    let jan = write_file(&env, "Janeiro 2025.csv", &[&["Caneta", "10", "2.5"], &["Lápis", "3", ""]]);
    let bad = write_file(&env, "planilha.csv", &[&["Caneta", "1", ""]]);

    commands::cmd_upload(&env.db, &env.objects, &env.config, "ana", &[jan, bad]).unwrap();

    let records = env.db.select(&RecordFilter::owner("ana")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].unit_price, Some(2.5));

    let files = env.db.list_files("ana").unwrap();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].key, "ana/Janeiro 2025.csv");
    assert!(files[0].sha256.is_some());
}

#[test]
fn test_cmd_upload_unreadable_path() {
    let env = setup();
    let missing = env.dir.path().join("Julho 2025.csv");
    let result = commands::cmd_upload(&env.db, &env.objects, &env.config, "ana", &[missing]);
    assert!(result.is_err());
}

#[test]
fn test_cmd_reprocess() {
    let env = setup();
    let jan = write_file(&env, "Janeiro 2025.csv", &[&["Caneta", "10", ""]]);
    commands::cmd_upload(&env.db, &env.objects, &env.config, "ana", &[jan]).unwrap();

    commands::cmd_reprocess(&env.db, &env.objects, &env.config, "ana").unwrap();
    assert_eq!(env.db.count_records("ana").unwrap(), 1);
}

// ========== Files Tests ==========

#[test]
fn test_cmd_files_empty() {
    let env = setup();
    assert!(commands::cmd_files(&env.db, "ana").is_ok());
}

#[test]
fn test_cmd_delete() {
    let env = setup();
    let jan = write_file(&env, "Janeiro 2025.csv", &[&["Caneta", "10", ""]]);
    commands::cmd_upload(&env.db, &env.objects, &env.config, "ana", &[jan]).unwrap();
    assert!(commands::cmd_files(&env.db, "ana").is_ok());

    let forbidden =
        commands::cmd_delete(&env.db, &env.objects, &env.config, "bruno", "ana/Janeiro 2025.csv");
    assert!(forbidden.unwrap_err().to_string().contains("Forbidden"));

    commands::cmd_delete(&env.db, &env.objects, &env.config, "ana", "ana/Janeiro 2025.csv")
        .unwrap();
    assert_eq!(env.db.count_records("ana").unwrap(), 0);
    assert!(env.db.list_files("ana").unwrap().is_empty());

    let missing =
        commands::cmd_delete(&env.db, &env.objects, &env.config, "ana", "ana/Janeiro 2025.csv");
    assert!(missing.unwrap_err().to_string().contains("Not found"));
}

// ========== Summary Tests ==========

#[test]
fn test_cmd_summary_and_ask() {
    let env = setup();
    assert!(commands::cmd_summary(&env.db, &env.config, "ana").is_ok());

    let jan = write_file(&env, "Janeiro 2025.csv", &[&["Caneta", "10", ""]]);
    commands::cmd_upload(&env.db, &env.objects, &env.config, "ana", &[jan]).unwrap();

    assert!(commands::cmd_summary(&env.db, &env.config, "ana").is_ok());
    assert!(commands::cmd_ask(&env.db, &env.config, "ana", "Qual produto vendeu mais?").is_ok());
    assert!(commands::cmd_ask(&env.db, &env.config, "ana", "   ").is_err());
}

// ========== Status Tests ==========

#[test]
fn test_cmd_status() {
    let env = setup();
    let db_path = env.dir.path().join("status.db");

    // Works before the database exists
    assert!(commands::cmd_status(&db_path, &env.config, Some("ana")).is_ok());

    commands::cmd_init(&db_path, &env.config).unwrap();
    assert!(commands::cmd_status(&db_path, &env.config, None).is_ok());
    assert!(commands::cmd_status(&db_path, &env.config, Some("ana")).is_ok());
}
