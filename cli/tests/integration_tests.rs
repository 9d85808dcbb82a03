use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn write_catalog(dir: &Path) -> PathBuf {
    let catalog = dir.join("catalog");
    fs::create_dir_all(&catalog).expect("failed to create catalog dir");
    let command = serde_json::json!({
        "name": "STATIC",
        "kind": "command",
        "keywords": [
            { "name": "MODEL", "kind": "simple", "value_type": "object", "required": true },
            { "name": "PHENOMENON", "kind": "simple", "value_type": "text", "default": "MECHANICAL" },
            {
                "name": "b_thermal",
                "kind": "bloc",
                "condition": "PHENOMENON == 'THERMAL'",
                "keywords": [
                    { "name": "CONDUCTIVITY", "kind": "simple", "value_type": "real" }
                ]
            },
            { "name": "INFO", "kind": "simple", "value_type": "int", "default": 1 }
        ]
    });
    fs::write(
        catalog.join("static.json"),
        serde_json::to_string_pretty(&command).unwrap(),
    )
    .expect("failed to write catalog file");
    catalog
}

fn write_document(dir: &Path, name: &str, document: serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, serde_json::to_string(&document).unwrap()).expect("failed to write document");
    path
}

fn run(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_command-params"))
        .args(args)
        .output()
        .expect("failed to run command-params")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_accepts_valid_catalog_dir() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());

    let output = run(&["check", catalog.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("1 command(s)"));
}

#[test]
fn check_rejects_missing_and_broken_inputs() {
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken");
    fs::create_dir_all(&broken).unwrap();
    fs::write(broken.join("bad.json"), "{ not json").unwrap();

    let output = run(&[
        "check",
        broken.to_str().unwrap(),
        dir.path().join("missing.json").to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert_eq!(stdout(&output).matches("FAILED").count(), 2);
}

// ---------------------------------------------------------------------------
// show
// ---------------------------------------------------------------------------

#[test]
fn show_prints_document_with_and_without_defaults() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());
    let input = write_document(dir.path(), "static.json", serde_json::json!({ "MODEL": "mo" }));
    let base = [
        "show",
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "STATIC",
        "--input",
        input.to_str().unwrap(),
    ];

    let output = run(&base);
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(shown, serde_json::json!({ "MODEL": "mo" }));

    let mut args = base.to_vec();
    args.push("--with-defaults");
    let output = run(&args);
    let shown: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(
        shown,
        serde_json::json!({ "MODEL": "mo", "PHENOMENON": "MECHANICAL", "INFO": 1 })
    );
}

#[test]
fn show_yaml_includes_active_bloc_keywords() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());
    let input = write_document(
        dir.path(),
        "thermal.json",
        serde_json::json!({ "MODEL": "mo", "PHENOMENON": "THERMAL", "CONDUCTIVITY": 2.5 }),
    );

    let output = run(&[
        "show",
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "STATIC",
        "--input",
        input.to_str().unwrap(),
        "--format",
        "yaml",
    ]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("CONDUCTIVITY: 2.5"));
}

#[test]
fn show_unknown_command_fails() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());

    let output = run(&[
        "show",
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "DYNAMIC",
    ]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("DYNAMIC"));
}

// ---------------------------------------------------------------------------
// tree
// ---------------------------------------------------------------------------

#[test]
fn tree_hides_excluded_blocs_unless_all() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());
    let base = [
        "tree",
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "STATIC",
    ];

    let output = run(&base);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("MODEL"));
    assert!(!text.contains("CONDUCTIVITY"));

    let mut args = base.to_vec();
    args.push("--all");
    let text = stdout(&run(&args));
    assert!(text.contains("b_thermal"));
    assert!(text.contains("excluded"));
}

#[test]
fn tree_honors_config_filter() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());
    let config = dir.path().join("editor.yaml");
    fs::write(&config, "filter: info\n").unwrap();

    let output = run(&[
        "tree",
        "--config",
        config.to_str().unwrap(),
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "STATIC",
    ]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("INFO"));
    assert!(!text.contains("MODEL"));
}

// ---------------------------------------------------------------------------
// validate
// ---------------------------------------------------------------------------

#[test]
fn validate_reports_located_failure() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());
    let valid = write_document(dir.path(), "valid.json", serde_json::json!({ "MODEL": "mo" }));
    let invalid = write_document(dir.path(), "invalid.json", serde_json::json!({ "INFO": 2 }));

    let output = run(&[
        "validate",
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "STATIC",
        "--input",
        valid.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let output = run(&[
        "validate",
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "STATIC",
        "--input",
        invalid.to_str().unwrap(),
    ]);
    assert!(!output.status.success());
    assert!(stdout(&output).contains("STATIC.MODEL"));
}

#[test]
fn catalog_fallback_uses_first_loadable_source() {
    let dir = TempDir::new().unwrap();
    let catalog = write_catalog(dir.path());
    let missing = dir.path().join("missing-bundle.json");

    let output = run(&[
        "show",
        "--catalog",
        missing.to_str().unwrap(),
        "--catalog",
        catalog.to_str().unwrap(),
        "--command",
        "STATIC",
    ]);
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(shown, serde_json::json!({}));
}
