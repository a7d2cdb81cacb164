use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use foxden_protocol::Profile;
use tracing::info;

use super::AppState;
use crate::error::ApiError;
use crate::validate::validate_profile;

pub(super) async fn list(State(state): State<AppState>) -> Result<Json<Vec<Profile>>, ApiError> {
	Ok(Json(state.store.list()?))
}

pub(super) async fn get(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Profile>, ApiError> {
	state
		.store
		.find(&name)?
		.map(Json)
		.ok_or_else(|| ApiError::NotFound(format!("Profile '{name}' not found")))
}

pub(super) async fn create(
	State(state): State<AppState>,
	payload: Result<Json<Profile>, JsonRejection>,
) -> Result<(StatusCode, Json<Profile>), ApiError> {
	let Json(profile) = payload?;
	validate_profile(&profile)?;
	state.store.create(profile.clone())?;
	info!(target = "foxden.http", profile = %profile.name, "profile created");
	Ok((StatusCode::CREATED, Json(profile)))
}

pub(super) async fn update(
	State(state): State<AppState>,
	Path(name): Path<String>,
	payload: Result<Json<Profile>, JsonRejection>,
) -> Result<Json<Profile>, ApiError> {
	let Json(profile) = payload?;
	validate_profile(&profile)?;
	state.store.update(&name, profile.clone())?;
	info!(target = "foxden.http", profile = %name, "profile updated");
	Ok(Json(profile))
}

pub(super) async fn delete(State(state): State<AppState>, Path(name): Path<String>) -> Result<StatusCode, ApiError> {
	state.store.delete(&name)?;
	info!(target = "foxden.http", profile = %name, "profile deleted");
	Ok(StatusCode::NO_CONTENT)
}
