//! HTTP surface exercised with a real client against an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use evapcool::{routes, MemoryStore, Orchestrator, OrchestratorConfig, RawSnapshot, Settings};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct StateBody {
    state: StateFields,
    averages: AveragesBody,
    connection: ConnectionBody,
    within_schedule: bool,
}

#[derive(Debug, Deserialize)]
struct StateFields {
    inlet_temp: Option<f64>,
    dry_fan_speed: f64,
    is_system_connected: bool,
}

#[derive(Debug, Deserialize)]
struct AveragesBody {
    inlet: f64,
    dry_outlet: f64,
}

#[derive(Debug, Deserialize)]
struct ConnectionBody {
    is_connected: bool,
    reconnect_attempts: u32,
}

async fn serve(orchestrator: Arc<Orchestrator>) -> Result<String> {
    // ---
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
    let addr = listener.local_addr()?;
    let app = routes::router(orchestrator);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{}", addr))
}

fn fixture(connected: bool) -> (Arc<MemoryStore>, Arc<Orchestrator>) {
    // ---
    let store = Arc::new(MemoryStore::new());
    let orch = Arc::new(Orchestrator::new(store.clone(), OrchestratorConfig::default()));
    let snapshot = RawSnapshot {
        is_alive: Some(connected),
        ..RawSnapshot::test_data()
    };
    orch.on_snapshot(&snapshot);
    (store, orch)
}

#[tokio::test]
async fn health_is_ok() -> Result<()> {
    // ---
    let (_, orch) = fixture(true);
    let base = serve(orch).await?;

    let body: serde_json::Value = Client::new()
        .get(format!("{}/health", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(body, json!({ "status": "ok" }));
    Ok(())
}

#[tokio::test]
async fn state_reports_values_and_averages() -> Result<()> {
    // ---
    let (_, orch) = fixture(true);
    orch.update_settings(Settings {
        start_time: "not a time".into(),
        ..Default::default()
    });
    let base = serve(orch).await?;

    let body: StateBody = Client::new()
        .get(format!("{}/state", base))
        .send()
        .await?
        .json()
        .await?;

    assert_eq!(body.state.inlet_temp, Some(32.0));
    assert!(body.state.is_system_connected);
    assert_eq!(body.averages.inlet, 32.0);
    assert_eq!(body.averages.dry_outlet, 20.0);
    assert!(body.connection.is_connected);
    assert_eq!(body.connection.reconnect_attempts, 0);
    assert!(!body.within_schedule);
    Ok(())
}

#[tokio::test]
async fn command_acknowledged_and_reflected() -> Result<()> {
    // ---
    let (store, orch) = fixture(true);
    let base = serve(orch).await?;
    let client = Client::new();

    let resp = client
        .post(format!("{}/commands", base))
        .json(&json!({ "command": "set_fan_speed", "fan": "dry", "speed": 35 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.get("dry-fan"), Some(json!(35.0)));

    let body: StateBody = client.get(format!("{}/state", base)).send().await?.json().await?;
    assert_eq!(body.state.dry_fan_speed, 35.0);
    Ok(())
}

#[tokio::test]
async fn command_status_codes() -> Result<()> {
    // ---
    let (store, orch) = fixture(false);
    let base = serve(orch.clone()).await?;
    let client = Client::new();
    let url = format!("{}/commands", base);

    let resp = client.post(&url).json(&json!({ "command": "toggle_pump" })).send().await?;
    assert_eq!(resp.status(), StatusCode::CONFLICT);

    // Emergency stop ignores the connection guard.
    let resp = client.post(&url).json(&json!({ "command": "emergency_stop" })).send().await?;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    orch.on_snapshot(&RawSnapshot {
        is_alive: Some(true),
        ..Default::default()
    });

    let resp = client
        .post(&url)
        .json(&json!({ "command": "set_fan_speed", "fan": "wet", "speed": 150 }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

    store.fail_writes_to("optimal");
    let resp = client
        .post(&url)
        .json(&json!({ "command": "set_optimal_mode", "enabled": true }))
        .send()
        .await?;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = resp.json().await?;
    assert!(body["error"].as_str().unwrap_or_default().contains("optimal"));
    Ok(())
}

#[tokio::test]
async fn csv_export_download() -> Result<()> {
    // ---
    let (_, orch) = fixture(true);
    let base = serve(orch).await?;

    let resp = Client::new().get(format!("{}/log.csv", base)).send().await?;
    assert_eq!(resp.status(), StatusCode::OK);

    let disposition = resp
        .headers()
        .get("content-disposition")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains("temperature_log_"));

    let text = resp.text().await?;
    let mut lines = text.lines();
    assert!(lines.next().unwrap_or_default().starts_with("Date,Time,Hot Air (Inlet) °C"));
    assert!(lines.next().unwrap_or_default().contains(",ON,300.0,"));
    Ok(())
}

#[tokio::test]
async fn log_json_lists_entries() -> Result<()> {
    // ---
    let (_, orch) = fixture(true);
    let base = serve(orch).await?;

    let entries: Vec<serde_json::Value> = Client::new()
        .get(format!("{}/log", base))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["reading"]["inlet_temp"], json!(32.0));
    assert_eq!(entries[0]["metrics"]["mass_flow_rate"], json!(0.259));
    Ok(())
}
