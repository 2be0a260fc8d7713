//! CLI command tests against an embedded store.

use serde_json::json;

#[tokio::test]
async fn test_import_command_runs_a_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let source = dir.path().join("diseases.json");
    std::fs::write(
        &source,
        serde_json::to_vec(&json!({
            "facet": {"name": "Diseases", "group": "medical", "short_name": "DIS", "custom_id": "facet.dis"},
            "concepts": [
                {"pref_name": "Asthma", "coordinates": {"original_id": "D001249", "source": "MESH"}}
            ]
        }))
        .unwrap(),
    )
    .unwrap();

    let config_path = dir.path().join("import.json");
    std::fs::write(
        &config_path,
        serde_json::to_vec(&json!({
            "connection": {"type": "embedded", "path": dir.path().join("store.db")},
            "version": "2026.1",
            "imports": [{"creator": "json", "source": {"path": source}}]
        }))
        .unwrap(),
    )
    .unwrap();

    cdb_cli::commands::import::run(&config_path).await.unwrap();

    // The recorded version is readable afterwards
    cdb_cli::commands::version::run(&config_path).await.unwrap();
}

#[tokio::test]
async fn test_import_command_fails_on_missing_config() {
    let result = cdb_cli::commands::import::run(std::path::Path::new("/no/such/config.yaml")).await;
    assert!(result.is_err());
}

#[test]
fn test_missing_config_argument_is_a_usage_error() {
    use clap::error::ErrorKind;
    use clap::Parser;

    // The env fallback would satisfy the positional argument
    std::env::remove_var("CDB_IMPORT_CONFIG");

    let err = cdb_cli::Cli::try_parse_from(["cdb"]).expect_err("no config path was given");
    // Not a help/version display, so main treats it as exit code 1
    assert!(!matches!(
        err.kind(),
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion
    ));
    assert!(err.to_string().contains("Usage"));
}

#[test]
fn test_extra_positional_argument_is_a_usage_error() {
    use clap::error::ErrorKind;
    use clap::Parser;

    let err = cdb_cli::Cli::try_parse_from(["cdb", "a.yaml", "b.yaml"])
        .expect_err("two config paths were given");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
}
