use axum::Json;
use axum::extract::{Query, State};
use serde::Deserialize;

use crate::AppState;
use crate::error::Result;
use crate::router::Message;

#[derive(Debug, Deserialize)]
pub struct Params {
    /// Username of the account to remove.
    pub account: String,
}

/// Delete an account from both stores.
pub async fn handler(
    State(state): State<AppState>,
    Query(params): Query<Params>,
) -> Result<Json<Message>> {
    state.accounts.delete(&params.account).await?;

    Ok(Message::new("Account deleted successfully"))
}
