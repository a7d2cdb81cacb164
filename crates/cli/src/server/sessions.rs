use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use foxden_protocol::{PublicSession, StartSessionRequest, StopSessionRequest};

use super::AppState;
use crate::error::ApiError;

pub(super) async fn list(State(state): State<AppState>) -> Json<Vec<PublicSession>> {
	Json(state.supervisor.list())
}

pub(super) async fn start(
	State(state): State<AppState>,
	payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublicSession>), ApiError> {
	let Json(request) = payload?;
	let name = request
		.profile_name
		.as_deref()
		.filter(|name| !name.is_empty())
		.ok_or_else(|| ApiError::Validation("profile_name is required".to_string()))?;

	let profile = state
		.store
		.find(name)?
		.ok_or_else(|| ApiError::NotFound(format!("Profile '{name}' not found")))?;

	let session = state.supervisor.start(&profile, request.screen()).await?;
	Ok((StatusCode::CREATED, Json(session)))
}

pub(super) async fn stop(
	State(state): State<AppState>,
	payload: Result<Json<StopSessionRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
	let Json(request) = payload?;
	let id = request
		.session_id
		.filter(|id| !id.as_str().is_empty())
		.ok_or_else(|| ApiError::Validation("session_id is required".to_string()))?;

	state.supervisor.stop(&id).await?;
	Ok(StatusCode::NO_CONTENT)
}
