//! Queue and case inspection endpoints.

use crate::dto::{CaseDetailResponse, QueueResponse};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use sx_core::CaseSummary;
use uuid::Uuid;

/// Current threat queue depth and overflow counter.
pub async fn queue_status(State(state): State<AppState>) -> Json<QueueResponse> {
    Json(QueueResponse {
        depth: state.queue.len(),
        dropped: state.queue.dropped(),
    })
}

/// All cases as summaries, newest first.
pub async fn list_cases(State(state): State<AppState>) -> Json<Vec<CaseSummary>> {
    Json(state.store.list().await)
}

/// Full plan, report, verdict, and history for one case.
pub async fn get_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CaseDetailResponse>, ApiError> {
    let case = state
        .store
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("case {} not found", id)))?;
    Ok(Json(case.into()))
}

#[cfg(test)]
mod tests {
    use crate::test_helpers::{awaiting_case, cradle_event, get_json, test_router};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_queue_status_reflects_pushes() {
        let (router, state) = test_router();
        state.queue.push(cradle_event(1));
        state.queue.push(cradle_event(2));

        let (status, body) = get_json(router, "/queue").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["depth"], 2);
        assert_eq!(body["dropped"], 0);
    }

    #[tokio::test]
    async fn test_list_cases_returns_summaries() {
        let (router, state) = test_router();
        let id = awaiting_case(&state, 42).await;

        let (status, body) = get_json(router, "/cases").await;
        assert_eq!(status, StatusCode::OK);
        let cases = body.as_array().unwrap();
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0]["id"], id.to_string());
        assert_eq!(cases[0]["status"], "awaiting_approval");
        assert_eq!(cases[0]["process_id"], 42);
    }

    #[tokio::test]
    async fn test_get_case_exposes_plan_and_verdict() {
        let (router, state) = test_router();
        let id = awaiting_case(&state, 77).await;

        let (status, body) = get_json(router, &format!("/cases/{}", id)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hostname"], "ws-01");
        assert_eq!(body["event"]["process_id"], 77);
        assert_eq!(body["plan"]["actions"][0]["command"], "kill_process");
        assert_eq!(body["verdict"]["schema_valid"], true);
        assert_eq!(body["verdict"]["policy_compliant"], true);
    }

    #[tokio::test]
    async fn test_unknown_case_is_404() {
        let (router, _state) = test_router();
        let (status, body) =
            get_json(router, "/cases/00000000-0000-0000-0000-000000000000").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }
}
