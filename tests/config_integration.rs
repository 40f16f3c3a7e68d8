//! Configuration file loading and config-driven connections.

use keel::logging::LogFormat;
use keel::migrate::{ChecksumVersion, DatabaseKind, ExecutionHistoryStore};
use keel::prelude::*;
use pretty_assertions::assert_eq;

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("keel.toml");
    std::fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_load_config_with_environment_and_env_vars() {
    let dir = tempfile::tempdir().unwrap();
    // SAFETY: the variable name is unique to this test.
    unsafe {
        std::env::set_var("KEEL_IT_HISTORY_TABLE", "ci_changelog");
    }

    let path = write_config(
        &dir,
        r#"
            [database]
            dialect = "mysql"
            version = "5.7"

            [engine]
            checksum_version = 9

            [logging]
            level = "warn"

            [environments.ci.database]
            dialect = "postgres"
            version = "16"

            [environments.ci.engine]
            history_table = "${KEEL_IT_HISTORY_TABLE}"
            fail_on_drift = false

            [environments.ci.logging]
            format = "compact"
        "#,
    );

    let base = KeelConfig::from_file(&path).unwrap();
    assert_eq!(base.dialect().unwrap().kind(), DatabaseKind::MySql);
    assert_eq!(base.engine.checksum_version, ChecksumVersion::V9);
    assert!(base.engine.fail_on_drift);

    let ci = base.with_environment("ci");
    let dialect = ci.dialect().unwrap();
    assert_eq!(dialect.kind(), DatabaseKind::PostgreSql);
    assert_eq!(dialect.major_version(), 16);
    assert_eq!(ci.engine.history_table, "ci_changelog");
    assert!(!ci.engine.fail_on_drift);
    assert_eq!(ci.logging.level, "warn");
    assert_eq!(ci.logging.format, LogFormat::Compact);

    unsafe {
        std::env::remove_var("KEEL_IT_HISTORY_TABLE");
    }
}

#[test]
fn test_missing_config_file_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = KeelConfig::from_file(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, MigrationError::Config(_)));
}

#[tokio::test]
async fn test_connect_sqlite_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("app.db");
    let path = write_config(
        &dir,
        &format!(
            r#"
                [database]
                dialect = "sqlite"
                url = "sqlite://{}?busy_timeout=1000"

                [engine]
                history_table = "app_changelog"
                lock_table = "app_changelog_lock"
            "#,
            db_path.display()
        ),
    );
    let config = KeelConfig::from_file(&path).unwrap();

    let engine = keel::connect_sqlite(&config).await.unwrap();
    assert_eq!(engine.context().config().history_table, "app_changelog");

    let mut log = ChangeLog::new("db/changelog.yaml");
    let users = log
        .changeset("1", "alice")
        .change(CreateTableChange::new("users").column(ColumnConfig::new("id", "INTEGER").primary_key()));
    log.add(users).unwrap();
    engine.update(&log, &AcceptAll).await.unwrap();

    assert_eq!(engine.history().list().await.unwrap().len(), 1);
    assert_eq!(
        engine
            .history()
            .query_i64("SELECT COUNT(*) FROM app_changelog")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn test_connect_sqlite_requires_url() {
    let config = KeelConfig::from_str("[database]\ndialect = \"sqlite\"\n").unwrap();
    assert!(matches!(
        keel::connect_sqlite(&config).await,
        Err(MigrationError::Config(_))
    ));
}
