//! Login pass-through to the upstream authentication endpoint

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::{
    errors::{AppError, AppResult},
    web::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub tenant_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub success: bool,
    pub auth_key: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    if request.username.is_empty() || request.password.is_empty() || request.tenant_id.is_empty()
    {
        return Err(AppError::validation(
            "Missing required fields: username, password, or tenantId",
        ));
    }

    let auth_key = state
        .authenticator
        .login(&request.username, &request.password, &request.tenant_id)
        .await?;

    Ok(Json(LoginResponse {
        success: true,
        auth_key,
    }))
}
