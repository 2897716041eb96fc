//! HTTP tests over the in-memory catalog.
//!
//! Drives the options endpoint and a full session walk through the cascade
//! using `fixtures/fitment.yaml`.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use axum_test::TestServer;
use bulb_fitment::catalog::memory::MemoryCatalog;
use bulb_fitment::config::AppConfig;
use bulb_fitment::decision::links::LinkTable;
use bulb_fitment::server::{build_router, build_state};
use serde_json::{Value, json};
use serial_test::serial;

// =============================================================================
// Test Utilities
// =============================================================================

const FIXTURE: &str = "fixtures/fitment.yaml";

fn test_config() -> AppConfig {
    let mut file = tempfile::Builder::new()
        .suffix(".yaml")
        .tempfile()
        .expect("temp config");
    writeln!(
        file,
        "catalog:\n  source: memory\n  fixture_path: {FIXTURE}\nsupport:\n  phone: \"+359 88 000 0000\""
    )
    .expect("write temp config");

    let path = file.path().to_string_lossy().into_owned();
    AppConfig::load_from_args(["bulb-fitment", "--config", path.as_str()])
        .expect("Failed to load test config")
}

fn server() -> TestServer {
    let config = test_config();
    let gateway = Arc::new(MemoryCatalog::from_yaml_file(FIXTURE).expect("fixture"));
    let state = build_state(&config, gateway, LinkTable::builtin());
    TestServer::new(build_router(state, Duration::from_secs(5))).expect("test server")
}

async fn create_session(server: &TestServer) -> String {
    let res = server.post("/api/sessions").add_query_param("wait", true).await;
    res.assert_status(StatusCode::CREATED);
    res.json::<Value>()["id"]
        .as_str()
        .expect("session id")
        .to_string()
}

async fn select(server: &TestServer, id: &str, stage: &str, value: Value) -> Value {
    let res = server
        .put(&format!("/api/sessions/{id}/selection"))
        .add_query_param("wait", true)
        .json(&json!({ "stage": stage, "value": value }))
        .await;
    res.assert_status_ok();
    res.json::<Value>()
}

async fn select_through_model(server: &TestServer, id: &str, brand: &str, model: &str) -> Value {
    select(server, id, "year", json!(2019)).await;
    select(server, id, "brand", json!(brand)).await;
    select(server, id, "model", json!(model)).await
}

// =============================================================================
// Options endpoint
// =============================================================================

#[tokio::test]
#[serial]
async fn test_options_years_with_long_cache() {
    let server = server();
    let res = server.get("/api/fitment/options").await;

    res.assert_status_ok();
    res.assert_json(&json!([2019, 2018]));
    let cache = res.header("cache-control");
    assert_eq!(
        cache.to_str().unwrap(),
        "public, max-age=86400, s-maxage=86400, stale-while-revalidate=86400"
    );
}

#[tokio::test]
#[serial]
async fn test_options_brands_use_short_cache() {
    let server = server();
    let res = server
        .get("/api/fitment/options")
        .add_query_param("level", "brands")
        .add_query_param("year", "2019")
        .await;

    res.assert_status_ok();
    res.assert_json(&json!(["ALFA ROMEO", "AUDI", "BMW", "MERCEDES"]));
    assert!(
        res.header("cache-control")
            .to_str()
            .unwrap()
            .contains("max-age=21600")
    );
}

#[tokio::test]
#[serial]
async fn test_options_missing_upstream_is_empty() {
    let server = server();
    let res = server
        .get("/api/fitment/options")
        .add_query_param("level", "models")
        .add_query_param("year", "2019")
        .add_query_param("brand", "")
        .await;

    res.assert_status_ok();
    res.assert_json(&json!([]));
}

#[tokio::test]
#[serial]
async fn test_options_positions_and_bulbs() {
    let server = server();
    let positions = server
        .get("/api/fitment/options")
        .add_query_param("level", "positions")
        .add_query_param("year", "2019")
        .add_query_param("brand", "BMW")
        .add_query_param("model", "X5")
        .add_query_param("modelType", "xDrive30d")
        .add_query_param("bodyType", "SUV")
        .await;
    positions.assert_status_ok();
    let names: Vec<String> = positions
        .json::<Vec<Value>>()
        .iter()
        .map(|p| p["position"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(names, ["Fog Lamps", "High Beam", "Low Beam"]);

    let bulbs = server
        .get("/api/fitment/options")
        .add_query_param("level", "bulbsByPosition")
        .add_query_param("year", "2019")
        .add_query_param("brand", "BMW")
        .add_query_param("model", "X5")
        .add_query_param("modelType", "xDrive30d")
        .add_query_param("bodyType", "SUV")
        .add_query_param("positionCategory", "")
        .add_query_param("position", "Low Beam")
        .await;
    bulbs.assert_status_ok();
    let parts: Vec<String> = bulbs
        .json::<Vec<Value>>()
        .iter()
        .map(|b| b["bulb_type"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(parts, ["D1S", "H7"]);
}

#[tokio::test]
#[serial]
async fn test_options_invalid_level() {
    let server = server();
    let res = server
        .get("/api/fitment/options")
        .add_query_param("level", "trims")
        .await;

    res.assert_status(StatusCode::BAD_REQUEST);
    res.assert_json(&json!({ "error": "invalid level" }));
}

// =============================================================================
// Sessions
// =============================================================================

#[tokio::test]
#[serial]
async fn test_new_session_lists_years() {
    let server = server();
    let res = server.post("/api/sessions").add_query_param("wait", true).await;

    res.assert_status(StatusCode::CREATED);
    let view = res.json::<Value>();
    assert_eq!(view["options"]["years"], json!([2019, 2018]));
    assert_eq!(view["next_stage"], "year");
    assert_eq!(view["loading"]["years"], false);
    assert!(view["decision"].is_null());
}

#[tokio::test]
#[serial]
async fn test_brands_are_presented_top_first() {
    let server = server();
    let id = create_session(&server).await;

    let view = select(&server, &id, "year", json!(2019)).await;
    assert_eq!(
        view["options"]["brands"],
        json!(["MERCEDES", "BMW", "AUDI", "ALFA ROMEO"])
    );
}

#[tokio::test]
#[serial]
async fn test_binary_color_choice_flow() {
    let server = server();
    let id = create_session(&server).await;

    let view = select_through_model(&server, &id, "BMW", "X5").await;
    let mods = view["options"]["modifications"].as_array().unwrap().clone();
    assert_eq!(mods.len(), 2);
    assert_eq!(mods[0]["label"], "M50i / SUV");

    let view = select(
        &server,
        &id,
        "modification",
        json!({ "model_type_name": "xDrive30d", "body_type": "SUV" }),
    )
    .await;
    let labels: Vec<&str> = view["options"]["positions"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, ["High beam", "Low beam", "Fog lights"]);

    let view = select(
        &server,
        &id,
        "position",
        json!({ "position_category": null, "position": "Low Beam" }),
    )
    .await;
    let decision = &view["decision"];
    assert_eq!(decision["mode"], "binary_color_choice");
    assert_eq!(decision["halogen"]["part_number"], "H7");
    assert_eq!(decision["xenon"]["part_number"], "D1S");
    assert_eq!(decision["halogen"]["color"], "yellow");
    assert_eq!(decision["xenon"]["color"], "white");
    assert!(decision["xenon"]["link"].as_str().unwrap().contains("d1s"));
    assert!(view.get("support_phone").is_none());
}

#[tokio::test]
#[serial]
async fn test_escalation_includes_support_phone() {
    let server = server();
    let id = create_session(&server).await;

    select_through_model(&server, &id, "AUDI", "A4").await;
    select(
        &server,
        &id,
        "modification",
        json!({ "model_type_name": "2.0 TDI", "body_type": "Avant" }),
    )
    .await;
    let view = select(
        &server,
        &id,
        "position",
        json!({ "position_category": null, "position": "Low Beam" }),
    )
    .await;

    assert_eq!(view["decision"]["mode"], "escalate_ambiguous");
    assert_eq!(view["support_phone"], "+359 88 000 0000");
}

#[tokio::test]
#[serial]
async fn test_upstream_change_resets_downstream() {
    let server = server();
    let id = create_session(&server).await;

    select_through_model(&server, &id, "BMW", "X5").await;
    let view = select(&server, &id, "year", json!(2018)).await;

    assert_eq!(view["selection"]["year"], 2018);
    assert!(view["selection"]["brand"].is_null());
    assert!(view["selection"]["model"].is_null());
    assert_eq!(view["options"]["brands"], json!(["TOYOTA"]));
    assert_eq!(view["options"]["models"], json!([]));
}

#[tokio::test]
#[serial]
async fn test_out_of_order_stage_conflicts() {
    let server = server();
    let id = create_session(&server).await;

    let res = server
        .put(&format!("/api/sessions/{id}/selection"))
        .json(&json!({ "stage": "model", "value": "X5" }))
        .await;
    res.assert_status(StatusCode::CONFLICT);
}

#[tokio::test]
#[serial]
async fn test_clear_selection_keeps_years() {
    let server = server();
    let id = create_session(&server).await;
    select_through_model(&server, &id, "BMW", "X3").await;

    let res = server.delete(&format!("/api/sessions/{id}/selection")).await;
    res.assert_status_ok();
    let view = res.json::<Value>();
    assert!(view["selection"]["year"].is_null());
    assert_eq!(view["options"]["years"], json!([2019, 2018]));
    assert_eq!(view["options"]["brands"], json!([]));
}

#[tokio::test]
#[serial]
async fn test_deleted_session_is_gone() {
    let server = server();
    let id = create_session(&server).await;

    server
        .delete(&format!("/api/sessions/{id}"))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get(&format!("/api/sessions/{id}"))
        .await
        .assert_status_not_found();
    server
        .delete(&format!("/api/sessions/{id}"))
        .await
        .assert_status_not_found();
}

#[tokio::test]
#[serial]
async fn test_unknown_session_is_not_found() {
    let server = server();
    server
        .put("/api/sessions/nope/selection")
        .json(&json!({ "stage": "year", "value": 2019 }))
        .await
        .assert_status_not_found();
}
