use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use xml_mcp_server::config::{
    ConfigError, ConfigFile, ConfigNotice, ConfigResolver, ProcessorSettings, ResolvedConfig,
};

fn defaults_for(server_dir: &Path) -> ResolvedConfig {
    ResolvedConfig {
        document_path: server_dir.join("data/syllabubRecipe.xml"),
        schema_path: Some(server_dir.join("schemas/recipe.rnc")),
        backup_dir: server_dir.join("backups"),
        log_dir: server_dir.join("logs"),
        processor: ProcessorSettings {
            java: PathBuf::from("java"),
            saxon_jar: server_dir.join("lib/saxon-he.jar"),
            jing_jar: Some(server_dir.join("lib/jing.jar")),
            tool_timeout: Duration::from_secs(30),
        },
    }
}

#[test]
fn missing_config_falls_back_to_defaults() {
    let tmp = tempfile::tempdir().unwrap();
    let resolver = ConfigResolver::new(tmp.path());

    let resolution = resolver.resolve(None).unwrap();

    assert_eq!(resolution.config, defaults_for(tmp.path()));
    assert!(tmp.path().join("backups").is_dir(), "backup dir should be created");
    assert!(matches!(
        resolution.notices.as_slice(),
        [ConfigNotice::MissingConfig(path)] if path == &tmp.path().join("config.json")
    ));
}

#[test]
fn relative_document_path_resolves_against_server_dir() {
    let resolver = ConfigResolver::new("/srv/app");
    let file = ConfigFile {
        document_path: "./data/doc.xml".into(),
        ..ConfigFile::default()
    };

    let config = resolver.apply(&file);
    assert_eq!(config.document_path, PathBuf::from("/srv/app/data/doc.xml"));
    assert_eq!(config.backup_dir, PathBuf::from("/srv/app/backups"));
}

#[test]
fn resolution_ignores_working_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let server_dir = tmp.path().join("install");
    fs::create_dir_all(&server_dir).unwrap();
    fs::write(
        server_dir.join("config.json"),
        r#"{ "documentPath": "./data/doc.xml", "backupDir": "bk" }"#,
    )
    .unwrap();

    let resolution = ConfigResolver::new(&server_dir).resolve(None).unwrap();

    assert_eq!(resolution.config.document_path, server_dir.join("data/doc.xml"));
    assert_eq!(resolution.config.backup_dir, server_dir.join("bk"));
    assert!(resolution.notices.is_empty());
}

#[test]
fn explicit_relative_config_path_is_under_server_dir() {
    let tmp = tempfile::tempdir().unwrap();
    fs::create_dir_all(tmp.path().join("conf")).unwrap();
    fs::write(
        tmp.path().join("conf/server.json"),
        r#"{ "documentPath": "/abs/doc.xml" }"#,
    )
    .unwrap();

    let resolution = ConfigResolver::new(tmp.path())
        .resolve(Some(Path::new("conf/server.json")))
        .unwrap();

    assert_eq!(resolution.config.document_path, PathBuf::from("/abs/doc.xml"));
}

#[test]
fn unusable_backup_dir_falls_back_to_temp_dir() {
    let tmp = tempfile::tempdir().unwrap();
    // A regular file where a parent directory is expected makes mkdir fail,
    // even for root.
    fs::write(tmp.path().join("blocker"), "not a directory").unwrap();
    fs::write(
        tmp.path().join("config.json"),
        r#"{ "backupDir": "blocker/backups" }"#,
    )
    .unwrap();

    let resolution = ConfigResolver::new(tmp.path()).resolve(None).unwrap();

    assert_eq!(resolution.config.backup_dir, std::env::temp_dir());
    match resolution.notices.as_slice() {
        [ConfigNotice::BackupFallback { requested, fallback, .. }] => {
            assert_eq!(requested, &tmp.path().join("blocker/backups"));
            assert_eq!(fallback, &std::env::temp_dir());
        }
        other => panic!("expected a backup fallback notice, got {other:?}"),
    }
}

#[test]
fn legacy_snake_case_keys_are_accepted() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("config.json"),
        r#"{
            "xml_data_path": "./data/legacy.xml",
            "xml_schema_path": "./schemas/legacy.rng",
            "backup_dir": "./old-backups",
            "log_dir": "./old-logs"
        }"#,
    )
    .unwrap();

    let config = ConfigResolver::new(tmp.path()).resolve(None).unwrap().config;

    assert_eq!(config.document_path, tmp.path().join("data/legacy.xml"));
    assert_eq!(config.schema_path, Some(tmp.path().join("schemas/legacy.rng")));
    assert_eq!(config.backup_dir, tmp.path().join("old-backups"));
    assert_eq!(config.log_dir, tmp.path().join("old-logs"));
}

#[test]
fn null_schema_path_disables_validation() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(
        tmp.path().join("config.json"),
        r#"{ "schemaPath": null, "jingJar": "" }"#,
    )
    .unwrap();

    let config = ConfigResolver::new(tmp.path()).resolve(None).unwrap().config;
    assert_eq!(config.schema_path, None);
    assert_eq!(config.processor.jing_jar, None);
}

#[test]
fn processor_settings_are_resolved() {
    let resolver = ConfigResolver::new("/srv/app");
    let file = ConfigFile {
        java: "jre/bin/java".into(),
        saxon_jar: "/opt/saxon/saxon-he-12.jar".into(),
        tool_timeout_secs: 5,
        ..ConfigFile::default()
    };

    let config = resolver.apply(&file);
    assert_eq!(config.processor.java, PathBuf::from("/srv/app/jre/bin/java"));
    assert_eq!(config.processor.saxon_jar, PathBuf::from("/opt/saxon/saxon-he-12.jar"));
    assert_eq!(config.processor.tool_timeout, Duration::from_secs(5));

    let bare = resolver.apply(&ConfigFile::default());
    assert_eq!(bare.processor.java, PathBuf::from("java"));
}

#[test]
fn malformed_config_is_an_error() {
    let tmp = tempfile::tempdir().unwrap();
    fs::write(tmp.path().join("config.json"), "{ not json").unwrap();

    let err = ConfigResolver::new(tmp.path()).resolve(None).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}
