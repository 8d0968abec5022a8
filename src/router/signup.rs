use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::AppState;
use crate::error::Result;
use crate::router::Valid;
use crate::user::{DEFAULT_ACCOUNT_TYPE, NewAccount};

#[derive(Debug, Serialize, Deserialize, Validate)]
pub struct Body {
    #[validate(length(min = 1, max = 255, message = "Name must not be empty."))]
    pub name: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Username must not be empty."
    ))]
    pub username: String,
    #[validate(email(message = "Email must be formatted."))]
    pub email: String,
    #[validate(length(min = 1, message = "Password must not be empty."))]
    pub password: String,
    #[serde(default = "default_account_type")]
    pub acc_type: String,
}

fn default_account_type() -> String {
    DEFAULT_ACCOUNT_TYPE.to_owned()
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub message: String,
    pub user_id: i64,
    pub mongo_id: String,
}

/// Handler to create an account.
pub async fn handler(
    State(state): State<AppState>,
    Valid(body): Valid<Body>,
) -> Result<(StatusCode, Json<Response>)> {
    let outcome = state
        .accounts
        .signup(NewAccount {
            name: body.name,
            username: body.username,
            email: body.email,
            password: body.password,
            account_type: body.acc_type,
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(Response {
            message: "User created successfully".to_owned(),
            user_id: outcome.user_id,
            mongo_id: outcome.identity,
        }),
    ))
}
