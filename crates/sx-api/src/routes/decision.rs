//! The human decision surface.
//!
//! A decision is valid only while the case is awaiting approval; anything
//! else is a conflict and leaves the case unchanged. Approval signs the
//! plan and runs the executor before responding, so the caller receives
//! the signed artifact together with the per-action outcomes.

use crate::dto::{DecisionRequest, DecisionResponse};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use sx_observability::AuditEvent;
use tracing::info;
use uuid::Uuid;

pub async fn decide_case(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<DecisionRequest>,
) -> Result<Json<DecisionResponse>, ApiError> {
    let actor = request.actor.unwrap_or_else(|| "operator".to_string());
    let case = state.store.decide(id, request.approve, &actor).await?;
    state.audit.record(AuditEvent::DecisionRecorded {
        case_id: id,
        approved: request.approve,
        actor: actor.clone(),
    });

    if !request.approve {
        info!(case_id = %id, actor = %actor, "Case denied");
        return Ok(Json(DecisionResponse {
            case_id: id,
            status: case.status,
            signed_plan: None,
            execution_log: vec![],
        }));
    }

    // On a signing failure the case stays approved and the error is
    // surfaced; the decision itself is not rolled back.
    let signed = state.executor.execute_case(id).await?;
    let case = state
        .store
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("case {} not found", id)))?;

    Ok(Json(DecisionResponse {
        case_id: id,
        status: case.status,
        signed_plan: Some(signed),
        execution_log: case.execution_log,
    }))
}
