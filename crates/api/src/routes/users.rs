//! Agent account routes

use axum::{
    extract::{Extension, Path, State},
    Json,
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::{auth::UserResponse, SuccessResponse};

/// List every agent, oldest first
pub async fn list_users(State(state): State<AppState>) -> ApiResult<Json<Vec<UserResponse>>> {
    let users: Vec<UserResponse> = sqlx::query_as(
        "SELECT id, name, email, created_at FROM users ORDER BY created_at ASC, id ASC",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(users))
}

/// Delete another agent. At least one agent always remains.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<SuccessResponse>> {
    if auth_user.user_id == user_id {
        return Err(ApiError::Validation("Cannot delete yourself".to_string()));
    }

    let mut tx = state.pool.begin().await?;

    // Lock every row so concurrent deletions can't empty the table
    let ids: Vec<Uuid> = sqlx::query_scalar("SELECT id FROM users ORDER BY id FOR UPDATE")
        .fetch_all(&mut *tx)
        .await?;

    if !ids.contains(&user_id) {
        return Err(ApiError::NotFound);
    }
    if ids.len() <= 1 {
        return Err(ApiError::Validation(
            "Cannot delete the only remaining user".to_string(),
        ));
    }

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = %user_id, deleted_by = %auth_user.user_id, "Agent deleted");

    Ok(Json(SuccessResponse::ok()))
}
