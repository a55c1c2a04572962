use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::{HeaderMap, StatusCode, header::AUTHORIZATION},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use sem_service::{Error as ServiceError, RankedResult, SearchRequest};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/search", post(search))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	headers: HeaderMap,
	body: Bytes,
) -> Result<Json<SuccessBody>, ApiError> {
	let authorization = headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok());

	state.service.authenticate(authorization).await?;

	let payload: SearchRequest = serde_json::from_slice(&body)
		.map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, err.to_string()))?;
	let response = state.service.search(payload).await?;

	Ok(Json(SuccessBody {
		success: true,
		data: response.data,
		total_count: response.total_count,
	}))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SuccessBody {
	success: bool,
	data: Vec<RankedResult>,
	total_count: usize,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	success: bool,
	error: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, message: impl Into<String>) -> Self {
		Self { status, message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::Unauthorized { .. } =>
				ApiError::new(StatusCode::UNAUTHORIZED, "Authentication failed"),
			ServiceError::InvalidRequest { message } =>
				ApiError::new(StatusCode::BAD_REQUEST, message),
			ServiceError::Secret { message } => {
				tracing::error!(error = %message, "Secret retrieval failed.");

				ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to load credentials")
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Query execution failed.");

				ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Query execution failed")
			},
			ServiceError::Index { message } => {
				tracing::error!(error = %message, "Index construction failed.");

				ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to index query results")
			},
			ServiceError::DeadlineExceeded { stage } => {
				tracing::warn!(stage, "Search deadline exceeded.");

				ApiError::new(StatusCode::GATEWAY_TIMEOUT, "Search deadline exceeded")
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { success: false, error: self.message };

		(self.status, Json(body)).into_response()
	}
}
