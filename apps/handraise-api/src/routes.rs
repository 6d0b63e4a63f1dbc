use axum::{
	Json, Router,
	extract::{FromRequestParts, Path, Query, State},
	http::{StatusCode, header::AUTHORIZATION, request::Parts},
	response::{IntoResponse, Response},
	routing::{get, post, put},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use handraise_service::{
	AnswerRequest, AnswerView, BalanceResponse, ChatLogRequest, ChatLogResponse,
	CreateDirectQuestionRequest, DepartmentPetsResponse, DepartmentScore, DirectQuestionView,
	Error as ServiceError, ForgotPasswordRequest, ForgotUsernameRequest, LikeResponse,
	ListQuestionsRequest, ListQuestionsResponse, LoginRequest, MarkBestResponse, MarkReadRequest,
	MarkReadResponse, NotificationView, PointTransactionView, PostQuestionRequest, Principal,
	ProfileView, QuestionSuggestion, QuestionView, RedeemRequest, RedeemResponse, RefreshRequest,
	RegisterRequest, ResetPasswordRequest, SearchRequest, SearchResponse, TagView, TokenPair,
	UpdateProfileRequest,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/auth/register", post(register))
		.route("/v1/auth/login", post(login))
		.route("/v1/auth/refresh", post(refresh))
		.route("/v1/auth/forgot-password", post(forgot_password))
		.route("/v1/auth/reset-password", post(reset_password))
		.route("/v1/auth/forgot-username", post(forgot_username))
		.route("/v1/me", get(me).put(update_me))
		.route("/v1/tags", get(tags))
		.route("/v1/questions", get(list_questions).post(post_question))
		.route("/v1/questions/suggest", get(suggest_questions))
		.route("/v1/questions/{id}", get(get_question).delete(delete_question))
		.route("/v1/questions/{id}/answers", get(list_answers).post(answer_question))
		.route("/v1/answers/{id}", put(edit_answer).delete(delete_answer))
		.route("/v1/answers/{id}/like", post(like_answer))
		.route("/v1/answers/{id}/mark-best", post(mark_best_answer))
		.route("/v1/points/balance", get(points_balance))
		.route("/v1/points/transactions", get(point_transactions))
		.route("/v1/points/redeem", post(redeem_points))
		.route("/v1/chats/log", post(log_chat))
		.route("/v1/direct-questions", get(list_direct_questions).post(create_direct_question))
		.route("/v1/direct-questions/{id}", get(get_direct_question))
		.route("/v1/search", get(search))
		.route("/v1/notifications", get(list_notifications))
		.route("/v1/notifications/read", post(mark_notifications_read))
		.route("/v1/leaderboard", get(leaderboard))
		.route("/v1/departments/pets", get(department_pets))
		.with_state(state)
}

/// The caller resolved from an `Authorization: Bearer <token>` header.
pub struct CurrentUser(pub Principal);
impl FromRequestParts<AppState> for CurrentUser {
	type Rejection = ApiError;

	async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, ApiError> {
		let token = parts
			.headers
			.get(AUTHORIZATION)
			.and_then(|value| value.to_str().ok())
			.and_then(bearer_token)
			.ok_or_else(|| {
				json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Missing bearer token.")
			})?;
		let principal = state.service.resolve_session(token).await?;

		Ok(Self(principal))
	}
}

#[derive(Debug, Default, Deserialize)]
struct SuggestQuery {
	#[serde(default)]
	title: String,
}

#[derive(Debug, Serialize)]
struct DetailBody {
	detail: &'static str,
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn register(
	State(state): State<AppState>,
	Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenPair>), ApiError> {
	let response = state.service.register(payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn login(
	State(state): State<AppState>,
	Json(payload): Json<LoginRequest>,
) -> Result<Json<TokenPair>, ApiError> {
	let response = state.service.login(payload).await?;

	Ok(Json(response))
}

async fn refresh(
	State(state): State<AppState>,
	Json(payload): Json<RefreshRequest>,
) -> Result<Json<TokenPair>, ApiError> {
	let response = state.service.refresh(payload).await?;

	Ok(Json(response))
}

async fn forgot_password(
	State(state): State<AppState>,
	Json(payload): Json<ForgotPasswordRequest>,
) -> Result<Json<DetailBody>, ApiError> {
	state.service.forgot_password(payload).await?;

	Ok(Json(DetailBody { detail: "If the email is registered, a reset link has been sent." }))
}

async fn reset_password(
	State(state): State<AppState>,
	Json(payload): Json<ResetPasswordRequest>,
) -> Result<Json<DetailBody>, ApiError> {
	state.service.reset_password(payload).await?;

	Ok(Json(DetailBody { detail: "Password has been reset." }))
}

async fn forgot_username(
	State(state): State<AppState>,
	Json(payload): Json<ForgotUsernameRequest>,
) -> Result<Json<DetailBody>, ApiError> {
	state.service.forgot_username(payload).await?;

	Ok(Json(DetailBody { detail: "If the email is registered, the username has been sent." }))
}

async fn me(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
) -> Result<Json<ProfileView>, ApiError> {
	let response = state.service.get_profile(&principal).await?;

	Ok(Json(response))
}

async fn update_me(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileView>, ApiError> {
	let response = state.service.update_profile(&principal, payload).await?;

	Ok(Json(response))
}

async fn tags(
	State(state): State<AppState>,
	CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<TagView>>, ApiError> {
	let response = state.service.list_tags().await?;

	Ok(Json(response))
}

async fn list_questions(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Query(params): Query<ListQuestionsRequest>,
) -> Result<Json<ListQuestionsResponse>, ApiError> {
	let response = state.service.list_questions(&principal, params).await?;

	Ok(Json(response))
}

async fn post_question(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Json(payload): Json<PostQuestionRequest>,
) -> Result<(StatusCode, Json<QuestionView>), ApiError> {
	let response = state.service.post_question(&principal, payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn suggest_questions(
	State(state): State<AppState>,
	CurrentUser(_): CurrentUser,
	Query(params): Query<SuggestQuery>,
) -> Result<Json<Vec<QuestionSuggestion>>, ApiError> {
	let response = state.service.suggest_questions(&params.title).await?;

	Ok(Json(response))
}

async fn get_question(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
) -> Result<Json<QuestionView>, ApiError> {
	let response = state.service.get_question(&principal, id).await?;

	Ok(Json(response))
}

async fn delete_question(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
	state.service.delete_question(&principal, id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn list_answers(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
) -> Result<Json<Vec<AnswerView>>, ApiError> {
	let response = state.service.list_answers(&principal, id).await?;

	Ok(Json(response))
}

async fn answer_question(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
	Json(payload): Json<AnswerRequest>,
) -> Result<(StatusCode, Json<AnswerView>), ApiError> {
	let response = state.service.answer_question(&principal, id, payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn edit_answer(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
	Json(payload): Json<AnswerRequest>,
) -> Result<Json<AnswerView>, ApiError> {
	let response = state.service.edit_answer(&principal, id, payload).await?;

	Ok(Json(response))
}

async fn delete_answer(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
	state.service.delete_answer(&principal, id).await?;

	Ok(StatusCode::NO_CONTENT)
}

async fn like_answer(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
) -> Result<Json<LikeResponse>, ApiError> {
	let response = state.service.like_answer(&principal, id).await?;

	Ok(Json(response))
}

async fn mark_best_answer(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
) -> Result<Json<MarkBestResponse>, ApiError> {
	let response = state.service.mark_best_answer(&principal, id).await?;

	Ok(Json(response))
}

async fn points_balance(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
) -> Result<Json<BalanceResponse>, ApiError> {
	let response = state.service.points_balance(&principal).await?;

	Ok(Json(response))
}

async fn point_transactions(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<PointTransactionView>>, ApiError> {
	let response = state.service.point_transactions(&principal).await?;

	Ok(Json(response))
}

async fn redeem_points(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Json(payload): Json<RedeemRequest>,
) -> Result<Json<RedeemResponse>, ApiError> {
	let response = state.service.redeem_points(&principal, payload).await?;

	Ok(Json(response))
}

async fn log_chat(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Json(payload): Json<ChatLogRequest>,
) -> Result<Json<ChatLogResponse>, ApiError> {
	let response = state.service.log_chat(&principal, payload).await?;

	Ok(Json(response))
}

async fn list_direct_questions(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<DirectQuestionView>>, ApiError> {
	let response = state.service.list_direct_questions(&principal).await?;

	Ok(Json(response))
}

async fn create_direct_question(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Json(payload): Json<CreateDirectQuestionRequest>,
) -> Result<(StatusCode, Json<DirectQuestionView>), ApiError> {
	let response = state.service.create_direct_question(&principal, payload).await?;

	Ok((StatusCode::CREATED, Json(response)))
}

async fn get_direct_question(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Path(id): Path<i64>,
) -> Result<Json<DirectQuestionView>, ApiError> {
	let response = state.service.get_direct_question(&principal, id).await?;

	Ok(Json(response))
}

async fn search(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	Query(params): Query<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(&principal, params).await?;

	Ok(Json(response))
}

async fn list_notifications(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
) -> Result<Json<Vec<NotificationView>>, ApiError> {
	let response = state.service.list_notifications(&principal).await?;

	Ok(Json(response))
}

async fn mark_notifications_read(
	State(state): State<AppState>,
	CurrentUser(principal): CurrentUser,
	payload: Option<Json<MarkReadRequest>>,
) -> Result<Json<MarkReadResponse>, ApiError> {
	let payload = payload.map(|Json(payload)| payload).unwrap_or_default();
	let response = state.service.mark_notifications_read(&principal, payload).await?;

	Ok(Json(response))
}

async fn leaderboard(
	State(state): State<AppState>,
	CurrentUser(_): CurrentUser,
) -> Result<Json<Vec<DepartmentScore>>, ApiError> {
	let response = state.service.leaderboard().await?;

	Ok(Json(response))
}

async fn department_pets(
	State(state): State<AppState>,
	CurrentUser(_): CurrentUser,
) -> Result<Json<DepartmentPetsResponse>, ApiError> {
	let response = state.service.department_pets().await?;

	Ok(Json(response))
}

fn bearer_token(header: &str) -> Option<&str> {
	let (scheme, token) = header.trim().split_once(' ')?;
	let token = token.trim();

	(scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			ServiceError::Forbidden { message } =>
				json_error(StatusCode::FORBIDDEN, "FORBIDDEN", message),
			ServiceError::NotFound { message } =>
				json_error(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			ServiceError::Conflict { message } =>
				json_error(StatusCode::CONFLICT, "CONFLICT", message),
			ServiceError::Unauthorized { message } =>
				json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", message),
			ServiceError::Provider { message } => {
				tracing::error!(error = %message, "Provider call failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal error.")
			},
			ServiceError::Storage { message } => {
				tracing::error!(error = %message, "Storage operation failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal error.")
			},
			ServiceError::PasswordHash { message } => {
				tracing::error!(error = %message, "Password hashing failed.");

				json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", "Internal error.")
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError::new(status, code, message)
}
