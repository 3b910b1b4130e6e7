//! Login, logout and session identity for both namespaces.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use domain::models::user::{LoginRequest, LoginResponse, Operator, RegisterRequest, User};

use crate::app::AppState;
use crate::extractors::{ProjectOperator, WebUser};
use crate::response::{ApiResponse, ApiResult};
use crate::services::AuthService;

/// Login and registration. Mounted at the root so the rate limiter wraps only them.
pub fn login_router() -> Router<AppState> {
    Router::new()
        .route("/web/user/register", post(web_register))
        .route("/web/user/login", post(web_login))
        .route("/project/user/login", post(project_login))
}

pub fn web_router() -> Router<AppState> {
    Router::new()
        .route("/user/logout", post(web_logout))
        .route("/user/me", get(web_me))
}

pub fn project_router() -> Router<AppState> {
    Router::new()
        .route("/user/logout", post(project_logout))
        .route("/user/me", get(project_me))
}

fn service(state: &AppState) -> AuthService {
    AuthService::new(state.pool.clone(), state.jwt.clone())
}

/// POST /web/user/register
async fn web_register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> ApiResult<LoginResponse> {
    let response = service(&state).register(&request).await?;
    Ok(ApiResponse::with_msg(response, "注册成功"))
}

/// POST /web/user/login
async fn web_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = service(&state).web_login(&request).await?;
    Ok(ApiResponse::with_msg(response, "登录成功"))
}

/// POST /project/user/login
async fn project_login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<LoginResponse> {
    let response = service(&state).project_login(&request).await?;
    Ok(ApiResponse::with_msg(response, "登录成功"))
}

async fn web_logout(State(state): State<AppState>, user: WebUser) -> ApiResult<()> {
    service(&state).logout(&user.claims).await?;
    Ok(ApiResponse::with_msg((), "退出成功"))
}

async fn project_logout(State(state): State<AppState>, op: ProjectOperator) -> ApiResult<()> {
    service(&state).logout(&op.claims).await?;
    Ok(ApiResponse::with_msg((), "退出成功"))
}

async fn web_me(user: WebUser) -> ApiResult<User> {
    Ok(ApiResponse::ok(user.user))
}

async fn project_me(op: ProjectOperator) -> ApiResult<Operator> {
    Ok(ApiResponse::ok(op.operator))
}
