use super::AppState;
use crate::api::models::UserListItem;
use crate::core::error::Result;
use crate::db::models::PublicUser;
use crate::db::repository::Repository;
use axum::{extract::State, Json};

/// Handler for GET /users - All accounts, newest first
pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserListItem>>> {
    let users = state.user_repo.find_all().await?;

    tracing::debug!(count = users.len(), "Listing users");

    Ok(Json(
        users
            .into_iter()
            .map(|user| UserListItem::from(PublicUser::from(user)))
            .collect(),
    ))
}
