//! End-to-end tests for source resolution
//!
//! These tests build a full session over temporary database directories and a
//! mock remote catalog, covering:
//! - Fallback from local directories to the BGSU hub
//! - Combine-all merging across local and remote sources
//! - Cache write-through and force refresh
//! - Degradation when every remote source fails
//! - User tool annotations

use motif_db::converters::ToolExport;
use motif_db::{MotifConfig, MotifSession, SourceMode};
use serde_json::json;
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
            "HL_1S72_001": {"2": "1S72|1|0|A|13", "1": "1S72|1|0|G|12", "3": "1S72|1|0|A|14"}
        }
    }
]"#;

const BGSU_1S72: &str = "\"HL_1S72_001\",\"1S72|1|0|G|12,1S72|1|0|A|13,1S72|1|0|A|14\"\n\
\"IL_1S72_002\",\"1S72|1|0|C|90,1S72|1|0|G|91\"\n";

const BGSU_4V9F: &str = "\"HL_4V9F_001\",\"4V9F|1|0|U|55,4V9F|1|0|G|56\"\n";

/// Database root with an Atlas release and user exports
fn database() -> TempDir {
    let root = tempfile::tempdir().unwrap();
    let atlas = root.path().join("db").join("RNA 3D motif atlas");
    std::fs::create_dir_all(&atlas).unwrap();
    std::fs::write(atlas.join("hl_4.5.json"), ATLAS_HL).unwrap();

    let fr3d = root.path().join("db").join("user_annotations").join("fr3d");
    std::fs::create_dir_all(&fr3d).unwrap();
    std::fs::write(
        fr3d.join("1s72_loops.csv"),
        "Motif type,Positions,Description\nkink turn,1S72|0|1|77-82,Kt-7\nbroken,1S72|0|1|x-y,\n",
    )
    .unwrap();
    root
}

fn config(root: &Path, server: &MockServer) -> MotifConfig {
    MotifConfig {
        db_root: root.join("db"),
        cache_dir: root.join("cache"),
        bgsu_base_url: format!("{}/loops", server.uri()),
        rfam_base_url: server.uri(),
        ..Default::default()
    }
}

async fn mount_bgsu(server: &MockServer, pdb_id: &str, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/loops/{}", pdb_id)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

// ============================================================================
// Fallback Tests
// ============================================================================

#[tokio::test]
async fn test_local_source_answers_first() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "1S72", BGSU_1S72, 0).await;

    let mut session = MotifSession::bootstrap(config(root.path(), &server)).await.unwrap();
    assert_eq!(
        session.selector().available_sources(),
        vec!["atlas", "user", "bgsu_api", "rfam_api"]
    );

    let selection = session.select("1s72", None, false).await;
    assert_eq!(selection.source_used.as_deref(), Some("atlas"));

    let residues = session.get_motif_residues("1S72", "HL", "HL_1S72_001").await;
    let numbers: Vec<i32> = residues.iter().map(|r| r.residue_number).collect();
    assert_eq!(numbers, vec![12, 13, 14]);
}

#[tokio::test]
async fn test_falls_back_to_remote_catalog() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "4V9F", BGSU_4V9F, 1).await;

    let mut session = MotifSession::bootstrap(config(root.path(), &server)).await.unwrap();
    let selection = session.select("4V9F", None, false).await;

    assert_eq!(selection.source_used.as_deref(), Some("bgsu_api"));
    assert_eq!(selection.motifs["HL"][0].instance_id, "HL_4V9F_001");
    assert_eq!(session.selector().last_source_used(), Some("bgsu_api"));
}

#[tokio::test]
async fn test_remote_outage_degrades_to_empty() {
    let root = database();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let mut session = MotifSession::bootstrap(config(root.path(), &server)).await.unwrap();
    let selection = session.select("9XYZ", None, false).await;

    assert!(selection.motifs.is_empty());
    assert_eq!(selection.source_used, None);
    assert!(!session.has_pdb("9XYZ").await);
}

// ============================================================================
// Combine-All Tests
// ============================================================================

#[tokio::test]
async fn test_combine_all_keeps_every_source() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "1S72", BGSU_1S72, 1).await;
    Mock::given(method("GET"))
        .and(path("/motif/RM00008"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "structures": [{"pdb_id": "1S72", "chain": "0", "seq_start": 12, "seq_end": 15}]
        })))
        .mount(&server)
        .await;

    let all = MotifConfig {
        mode: SourceMode::All,
        ..config(root.path(), &server)
    };
    let mut session = MotifSession::bootstrap(all).await.unwrap();
    let selection = session.select("1S72", None, false).await;

    assert_eq!(
        selection.motifs.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["atlas:HL", "bgsu_api:HL", "bgsu_api:IL", "rfam_api:GNRA"]
    );
    assert_eq!(selection.source_used.as_deref(), Some("atlas,bgsu_api,rfam_api"));
    assert_eq!(selection.motifs["rfam_api:GNRA"][0].residues.len(), 4);
}

#[tokio::test]
async fn test_combine_all_with_dedupe() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "1S72", BGSU_1S72, 1).await;

    let all = MotifConfig {
        mode: SourceMode::All,
        dedupe_combined: true,
        ..config(root.path(), &server)
    };
    let mut session = MotifSession::bootstrap(all).await.unwrap();
    let selection = session.select("1S72", None, false).await;

    // The hub's hairpin repeats the Atlas residues exactly
    assert_eq!(
        selection.motifs.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["atlas:HL", "bgsu_api:IL"]
    );
}

// ============================================================================
// Cache Tests
// ============================================================================

#[tokio::test]
async fn test_cache_survives_sessions_until_refresh() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "4V9F", BGSU_4V9F, 2).await;

    let mut first = MotifSession::bootstrap(config(root.path(), &server)).await.unwrap();
    assert!(first.has_pdb("4V9F").await);
    assert!(first.cache().get("4V9F", "bgsu_api", false).is_some());

    // Served from disk, no request
    let mut second = MotifSession::bootstrap(config(root.path(), &server)).await.unwrap();
    let cached = second.select("4V9F", Some("bgsu_api"), false).await;
    assert_eq!(cached.motifs["HL"].len(), 1);

    // Force refresh goes back to the network
    let refreshed = second.select("4V9F", Some("bgsu_api"), true).await;
    assert_eq!(refreshed.motifs, cached.motifs);
}

#[tokio::test]
async fn test_refresh_from_api() {
    let root = database();
    let server = MockServer::start().await;
    mount_bgsu(&server, "1S72", BGSU_1S72, 1).await;

    let mut session = MotifSession::bootstrap(config(root.path(), &server)).await.unwrap();
    let selection = session.selector_mut().refresh_from_api("1S72").await;
    assert_eq!(selection.source_used.as_deref(), Some("bgsu_api"));
    assert_eq!(selection.motifs.len(), 2);

    let availability = session.selector().check_pdb_availability("1S72");
    assert!(availability["atlas"]);
    assert!(availability["bgsu_api"]);
    assert!(!availability["rfam_api"]);
}

// ============================================================================
// User Annotation Tests
// ============================================================================

#[tokio::test]
async fn test_user_annotations_by_tool() {
    let root = database();
    let server = MockServer::start().await;

    let offline = MotifConfig {
        enable_api: false,
        ..config(root.path(), &server)
    };
    let mut session = MotifSession::bootstrap(offline).await.unwrap();

    let fr3d = session.motifs_for_tool("1S72", ToolExport::Fr3d).await;
    assert_eq!(fr3d.keys().map(String::as_str).collect::<Vec<_>>(), vec!["KINK_TURN"]);
    assert_eq!(fr3d["KINK_TURN"][0].residues.len(), 6);
    assert_eq!(fr3d["KINK_TURN"][0].annotation, "Kt-7");
    assert_eq!(fr3d["KINK_TURN"][0].instance_id, "fr3d:1s72_loops.csv:1");

    assert!(session.motifs_for_tool("1S72", ToolExport::RnaMotifScan).await.is_empty());

    let selection = session.select("1S72", Some("user"), false).await;
    assert_eq!(selection.source_used.as_deref(), Some("user"));
}
