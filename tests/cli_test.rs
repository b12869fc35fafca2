//! CLI integration tests for resource-schema binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const FIXTURE: &str = "tests/fixtures/storage_accounts.json";
const STORAGE: &str = "Microsoft.Storage/storageAccounts";

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("resource-schema"))
}

// Helper to create a temp file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

mod versions_command {
    use super::*;

    #[test]
    fn lists_versions_with_latest() {
        cmd()
            .args(["versions", FIXTURE, "--type", STORAGE])
            .assert()
            .success()
            .stdout(predicate::str::contains("2021-04-01"))
            .stdout(predicate::str::contains("2023-01-01  active      released 2023-01-01 (latest)"))
            .stdout(predicate::str::contains("preview"));
    }

    #[test]
    fn json_output() {
        cmd()
            .args(["versions", FIXTURE, "--type", STORAGE, "--json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""latest":"2023-01-01""#));
    }

    #[test]
    fn lists_resource_types_without_type() {
        cmd()
            .args(["versions", FIXTURE])
            .assert()
            .success()
            .stdout(predicate::str::contains(STORAGE));
    }

    #[test]
    fn unknown_type() {
        cmd()
            .args(["versions", FIXTURE, "--type", "Microsoft.Nope/things"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("not in the catalog"));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_properties() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", r#"{"name": "mystorage"}"#);

        cmd()
            .args(["validate", FIXTURE, "--type", STORAGE, "--props", props.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "Valid (Microsoft.Storage/storageAccounts@2023-01-01)",
            ));
    }

    #[test]
    fn json_output_includes_defaults() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", r#"{"name": "mystorage"}"#);

        cmd()
            .args([
                "validate",
                FIXTURE,
                "--type",
                STORAGE,
                "--props",
                props.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""valid":true"#))
            .stdout(predicate::str::contains(r#""httpsOnly":true"#))
            .stdout(predicate::str::contains(r#""minimumTlsVersion":"TLS1_2""#));
    }

    #[test]
    fn invalid_properties_listed() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(
            &dir,
            "props.json",
            r#"{"name": "My_Storage", "sku": "Ultra"}"#,
        );

        cmd()
            .args(["validate", FIXTURE, "--type", STORAGE, "--props", props.to_str().unwrap()])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "name may only contain lowercase letters and digits",
            ))
            .stderr(predicate::str::contains("sku must be one of"));
    }

    #[test]
    fn invalid_properties_json() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", r#"{}"#);

        cmd()
            .args([
                "validate",
                FIXTURE,
                "--type",
                STORAGE,
                "--props",
                props.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""valid":false"#))
            .stdout(predicate::str::contains("name is required"));
    }

    #[test]
    fn deprecated_version_reports_diagnostics() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", r#"{"name": "mystorage"}"#);

        cmd()
            .args([
                "validate",
                FIXTURE,
                "--type",
                STORAGE,
                "--props",
                props.to_str().unwrap(),
                "--api-version",
                "2021-04-01",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("[W002]"))
            .stdout(predicate::str::contains("[W003]"))
            .stdout(predicate::str::contains("https://example.com/storage/migrate-2023"));
    }

    #[test]
    fn preview_version_reports_info() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", r#"{"name": "mystorage"}"#);

        cmd()
            .args([
                "validate",
                FIXTURE,
                "--type",
                STORAGE,
                "--props",
                props.to_str().unwrap(),
                "--api-version",
                "2024-06-01",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("info [I001]"));
    }

    #[test]
    fn unsupported_version() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", r#"{"name": "mystorage"}"#);

        cmd()
            .args([
                "validate",
                FIXTURE,
                "--type",
                STORAGE,
                "--props",
                props.to_str().unwrap(),
                "--api-version",
                "2099-01-01",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "supported versions: 2021-04-01, 2023-01-01, 2024-06-01",
            ));
    }

    #[test]
    fn strict_rejects_unknown_properties() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", r#"{"name": "mystorage", "color": "blue"}"#);

        // Non-strict: warning only
        cmd()
            .args(["validate", FIXTURE, "--type", STORAGE, "--props", props.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains("[W004]"));

        // Strict: error
        cmd()
            .args([
                "validate",
                FIXTURE,
                "--type",
                STORAGE,
                "--props",
                props.to_str().unwrap(),
                "--strict",
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("color is not defined in schema"));
    }
}

mod migrate_command {
    use super::*;

    #[test]
    fn analysis_to_latest() {
        cmd()
            .args(["migrate", FIXTURE, "--type", STORAGE, "--from", "2021-04-01"])
            .assert()
            .success()
            .stdout(predicate::str::contains("2021-04-01 -> 2023-01-01"))
            .stdout(predicate::str::contains("compatible: false"))
            .stdout(predicate::str::contains("estimated effort: low"))
            .stdout(predicate::str::contains(
                "supportsHttpsTrafficOnly renamed to httpsOnly",
            ));
    }

    #[test]
    fn same_version_compatible() {
        cmd()
            .args([
                "migrate",
                FIXTURE,
                "--type",
                STORAGE,
                "--from",
                "2023-01-01",
                "--to",
                "2023-01-01",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("compatible: true"))
            .stdout(predicate::str::contains("estimated effort: none"));
    }

    #[test]
    fn carries_properties_forward() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(
            &dir,
            "props.json",
            r#"{"name": "mystorage", "supportsHttpsTrafficOnly": false}"#,
        );

        cmd()
            .args([
                "migrate",
                FIXTURE,
                "--type",
                STORAGE,
                "--from",
                "2021-04-01",
                "--props",
                props.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""compatible":false"#))
            .stdout(predicate::str::contains(r#""httpsOnly":false"#))
            .stdout(predicate::str::contains("supportsHttpsTrafficOnly\":false").not());
    }

    #[test]
    fn unknown_from_version() {
        cmd()
            .args(["migrate", FIXTURE, "--type", STORAGE, "--from", "1999-01-01"])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("unknown version '1999-01-01'"));
    }
}

mod lint_command {
    use super::*;

    #[test]
    fn fixture_passes() {
        cmd()
            .args(["lint", FIXTURE])
            .assert()
            .success()
            .stdout(predicate::str::contains("all passed"));
    }

    #[test]
    fn broken_catalog_fails() {
        let dir = TempDir::new().unwrap();
        write_temp_file(&dir, "bad.json", "{ not json }");

        cmd()
            .args(["lint", dir.path().to_str().unwrap()])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("E001"));
    }

    #[test]
    fn json_format() {
        cmd()
            .args(["lint", FIXTURE, "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""files_checked": 1"#));
    }

    #[test]
    fn strict_fails_on_warnings() {
        let dir = TempDir::new().unwrap();
        write_temp_file(
            &dir,
            "preview.json",
            r#"{"resource_type": "X/a", "versions": [{"version": "v1", "support_level": "preview", "release_date": "2024-01-01"}]}"#,
        );

        cmd().args(["lint", dir.path().to_str().unwrap()]).assert().success();
        cmd()
            .args(["lint", dir.path().to_str().unwrap(), "--strict"])
            .assert()
            .code(1);
    }

    #[test]
    fn missing_path() {
        cmd()
            .args(["lint", "/nonexistent/catalogs"])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("path not found"));
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn catalog_not_found() {
        cmd()
            .args(["versions", "/nonexistent/catalog.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("not found"));
    }

    #[test]
    fn invalid_json_catalog() {
        let dir = TempDir::new().unwrap();
        let catalog = write_temp_file(&dir, "bad.json", r#"{ not valid json"#);

        cmd()
            .args(["versions", catalog.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn conflicting_registration() {
        let dir = TempDir::new().unwrap();
        let entry_a = r#"{"resource_type": "X/a", "versions": [{"version": "v1", "support_level": "active", "release_date": "2024-01-01"}]}"#;
        let entry_b = r#"{"resource_type": "X/a", "versions": [{"version": "v2", "support_level": "active", "release_date": "2024-02-01"}]}"#;
        let catalog = write_temp_file(&dir, "dup.json", &format!("[{}, {}]", entry_a, entry_b));

        cmd()
            .args(["versions", catalog.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("already registered"));
    }

    #[test]
    fn props_not_an_object() {
        let dir = TempDir::new().unwrap();
        let props = write_temp_file(&dir, "props.json", "[1, 2, 3]");

        cmd()
            .args(["validate", FIXTURE, "--type", STORAGE, "--props", props.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("expected a JSON object, got array"));
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_flag() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("versioned resource schemas"));
    }

    #[test]
    fn version_flag() {
        cmd()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("resource-schema"));
    }

    #[test]
    fn validate_help() {
        cmd()
            .args(["validate", "--help"])
            .assert()
            .success()
            .stdout(predicate::str::contains("--props"))
            .stdout(predicate::str::contains("--api-version"))
            .stdout(predicate::str::contains("--strict"));
    }

    #[test]
    fn missing_type_for_validate() {
        cmd()
            .args(["validate", FIXTURE, "--props", "p.json"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("--type"));
    }
}
