//! Account route handlers.

use axum::{
    Form, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use picmaker_core::{Email, UserId};

use crate::error::{AppError, Result};
use crate::middleware::BearerUser;
use crate::models::user::User;
use crate::state::AppState;

/// OAuth2 password-grant form. Extra fields (`grant_type`, `scope`) are ignored.
#[derive(Deserialize)]
pub struct TokenForm {
    /// The account email.
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
}

#[derive(Deserialize)]
pub struct NewUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

/// Public view of an account.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub user_id: UserId,
    pub name: String,
    pub email: Email,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            user_id: user.id,
            name: user.name,
            email: user.email,
        }
    }
}

/// `POST /users/token`: exchange email and password for a bearer token.
#[instrument(skip(state, form))]
pub async fn token(
    State(state): State<AppState>,
    Form(form): Form<TokenForm>,
) -> Result<Json<TokenResponse>> {
    let user = state.auth().login(&form.username, &form.password).await?;
    let access_token = state.auth().issue_token(&user)?;

    tracing::info!(user_id = %user.id, "Token issued");
    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_owned(),
    }))
}

/// `POST /users/new_user`: register an account.
#[instrument(skip(state, payload))]
pub async fn new_user(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewUserRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let user = state
        .auth()
        .register(&request.name, &request.email, &request.password)
        .await?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// `GET /users/myuser`: the account behind the bearer token.
pub async fn my_user(BearerUser(user): BearerUser) -> Json<UserResponse> {
    Json(user.into())
}
