//! End-to-end tests for the rna-motifs binary
//!
//! These tests run the binary against temporary database directories and a
//! mock BGSU hub, covering:
//! - Querying local and remote sources
//! - Table and JSON output
//! - Tool-filtered user annotations
//! - Source listing with availability
//! - Cache maintenance
//! - Error handling

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const ATLAS_HL: &str = r#"[
    {
        "motif_id": "HL_00317.1",
        "common_name": "GNRA",
        "alignment": {
            "HL_1S72_001": {"1": "1S72|1|0|G|12", "2": "1S72|1|0|A|13", "3": "1S72|1|0|A|14"}
        }
    }
]"#;

const BGSU_4V9F: &str = "\"HL_4V9F_001\",\"4V9F|1|0|U|55,4V9F|1|0|G|56\"\n";

/// Database root with an Atlas release and an FR3D export
fn database() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let atlas = root.path().join("db").join("RNA 3D motif atlas");
    std::fs::create_dir_all(&atlas).unwrap();
    std::fs::write(atlas.join("hl_4.5.json"), ATLAS_HL).unwrap();

    let fr3d = root.path().join("db").join("user_annotations").join("fr3d");
    std::fs::create_dir_all(&fr3d).unwrap();
    std::fs::write(
        fr3d.join("1s72_loops.csv"),
        "Motif type,Positions,Description\nkink turn,1S72|0|1|77-82,Kt-7\n",
    )
    .unwrap();
    root
}

/// Config file pointing both remote catalogs at the mock server
fn write_config(root: &Path, server: &MockServer) -> std::path::PathBuf {
    let config = root.join("motifs.toml");
    std::fs::write(
        &config,
        format!(
            "bgsu_base_url = \"{uri}/loops\"\nrfam_base_url = \"{uri}\"\ntimeout_secs = 5\n",
            uri = server.uri()
        ),
    )
    .unwrap();
    config
}

/// Binary isolated from the caller's environment
fn rna_motifs(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("rna-motifs").unwrap();
    for var in [
        "RNA_MOTIF_CONFIG",
        "RNA_MOTIF_CACHE_DAYS",
        "RNA_MOTIF_TIMEOUT_SECS",
        "RNA_MOTIF_SOURCE_MODE",
        "RNA_MOTIF_ATLAS_VERSION",
        "MOTIF_LOG_LEVEL",
        "MOTIF_LOG_OUTPUT",
    ] {
        cmd.env_remove(var);
    }
    cmd.current_dir(root)
        .env("NO_COLOR", "1")
        .env("RNA_MOTIF_DB_DIR", root.join("db"))
        .env("RNA_MOTIF_CACHE_DIR", root.join("cache"));
    cmd
}

fn offline(root: &Path) -> Command {
    let mut cmd = rna_motifs(root);
    cmd.env("RNA_MOTIF_ENABLE_API", "false");
    cmd
}

async fn mount_bgsu(server: &MockServer, pdb_id: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/loops/{}", pdb_id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

// ============================================================================
// Query Tests
// ============================================================================

#[test]
fn test_query_local_table() {
    let root = database();

    offline(root.path())
        .args(["query", "1s72"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1S72: 1 instance(s) in 1 type(s) from atlas"))
        .stdout(predicate::str::contains("HL_1S72_001"))
        .stdout(predicate::str::contains("0:12-14"));
}

#[test]
fn test_query_json_output() {
    let root = database();

    let output = offline(root.path())
        .args(["query", "1S72", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["pdb_id"], "1S72");
    assert_eq!(report["source_used"], "atlas");
    assert_eq!(report["instance_count"], 1);
    assert_eq!(report["motifs"]["HL"][0]["residues"].as_array().unwrap().len(), 3);
}

#[test]
fn test_query_type_filter() {
    let root = database();

    offline(root.path())
        .args(["query", "1S72", "--type", "IL"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No motifs found for 1S72"));
}

#[tokio::test]
async fn test_query_falls_back_to_hub() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "4V9F", BGSU_4V9F).await;
    let config = write_config(root.path(), &server);

    let output = rna_motifs(root.path())
        .arg("--config")
        .arg(&config)
        .args(["query", "4v9f", "-f", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["source_used"], "bgsu_api");
    assert_eq!(report["motifs"]["HL"][0]["instance_id"], "HL_4V9F_001");
}

#[test]
fn test_query_tool_annotations() {
    let root = database();

    offline(root.path())
        .args(["query", "1S72", "--tool", "fr3d"])
        .assert()
        .success()
        .stdout(predicate::str::contains("user (fr3d)"))
        .stdout(predicate::str::contains("KINK_TURN"))
        .stdout(predicate::str::contains("Kt-7"));
}

#[test]
fn test_query_no_motifs() {
    let root = database();

    offline(root.path())
        .args(["query", "9XYZ"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No motifs found for 9XYZ"));
}

// ============================================================================
// Sources Tests
// ============================================================================

#[test]
fn test_sources_table() {
    let root = database();

    offline(root.path())
        .args(["sources", "--pdb", "1s72"])
        .assert()
        .success()
        .stdout(predicate::str::contains("atlas"))
        .stdout(predicate::str::contains("user"))
        .stdout(predicate::str::contains("Has PDB"))
        .stdout(predicate::str::contains("bgsu_api").not());
}

#[test]
fn test_sources_json() {
    let root = database();

    let output = offline(root.path())
        .args(["sources", "--pdb", "1S72", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["mode"], "auto");
    let sources = report["sources"].as_array().unwrap();
    assert_eq!(sources[0]["id"], "atlas");
    assert_eq!(sources[0]["kind"], "local");
    assert_eq!(sources[0]["pdb_count"], 1);
    assert_eq!(sources[0]["has_pdb"], true);
}

// ============================================================================
// Cache Tests
// ============================================================================

#[tokio::test]
async fn test_cache_lifecycle() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "4V9F", BGSU_4V9F).await;
    let config = write_config(root.path(), &server);

    rna_motifs(root.path())
        .arg("--config")
        .arg(&config)
        .args(["query", "4V9F"])
        .assert()
        .success();

    rna_motifs(root.path())
        .args(["cache", "stats"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries:   1"))
        .stdout(predicate::str::contains("bgsu_api"));

    rna_motifs(root.path())
        .args(["cache", "invalidate", "4v9f", "--source", "rfam_api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Invalidated 0 entries for 4V9F"));

    rna_motifs(root.path())
        .args(["cache", "clear"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 1 entry"));

    rna_motifs(root.path())
        .args(["cache", "cleanup"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 0 expired entries"));
}

// ============================================================================
// Error Handling Tests
// ============================================================================

#[test]
fn test_unknown_source_fails() {
    let root = database();

    offline(root.path())
        .args(["query", "1S72", "--source", "pdbe"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown source 'pdbe'"));
}

#[test]
fn test_unknown_tool_fails() {
    let root = database();

    offline(root.path())
        .args(["query", "1S72", "--tool", "dssr"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown tool 'dssr'"));
}

#[test]
fn test_missing_config_file_fails() {
    let root = database();

    offline(root.path())
        .args(["--config", "absent.toml", "sources"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_invalid_env_fails() {
    let root = database();

    offline(root.path())
        .env("RNA_MOTIF_CACHE_DAYS", "forever")
        .args(["cache", "stats"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RNA_MOTIF_CACHE_DAYS"));
}
