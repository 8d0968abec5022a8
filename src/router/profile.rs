use axum::Json;
use axum::extract::{Path, State};

use crate::AppState;
use crate::error::Result;
use crate::profile::Profile;
use crate::router::Message;

/// Get the profile document of an account.
pub async fn get(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<Profile>> {
    Ok(Json(state.accounts.profile(&identity).await?))
}

/// Append any JSON record to the profile contributions.
pub async fn contribute(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Json(contribution): Json<serde_json::Value>,
) -> Result<Json<Message>> {
    state.accounts.add_contribution(&identity, contribution).await?;

    Ok(Message::new("Contribution added successfully"))
}
