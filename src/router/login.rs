use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::Account;

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, message = "Username must not be empty."))]
    pub username: String,
    #[validate(length(min = 1, message = "Password must not be empty."))]
    pub password: String,
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    /// Public fields only; hash and salt never leave the server.
    pub user: Account,
}

/// Handle login route.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<Json<Response>> {
    let user = state.accounts.login(&body.username, &body.password).await?;

    Ok(Json(Response {
        message: "Login successful".to_owned(),
        user,
    }))
}
