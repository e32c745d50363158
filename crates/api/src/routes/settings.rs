//! Workspace settings routes
//!
//! The settings row id doubles as the public `appId` a widget is
//! embedded with.

use axum::{
    extract::{Extension, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

use super::{
    auth::{normalize_email, validate_name},
    extract::ApiJson,
};

const MAX_TITLE_CHARS: usize = 100;
const MAX_WELCOME_CHARS: usize = 500;
const POSITIONS: [&str; 2] = ["bottom-right", "bottom-left"];

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettingsQuery {
    pub app_id: Option<String>,
}

/// What an embedded widget needs to render itself
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PublicSettings {
    pub app_id: Uuid,
    pub widget_title: String,
    pub welcome_message: String,
    pub primary_color: String,
    pub position: String,
    pub collect_customer_name: bool,
}

#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSettings {
    pub id: Uuid,
    pub user_id: Uuid,
    pub widget_title: String,
    pub welcome_message: String,
    pub primary_color: String,
    pub position: String,
    pub collect_customer_name: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Partial update; absent fields are left alone
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub widget_title: Option<String>,
    pub welcome_message: Option<String>,
    pub primary_color: Option<String>,
    pub position: Option<String>,
    pub collect_customer_name: Option<bool>,
    pub name: Option<String>,
    pub email: Option<String>,
}

const SETTINGS_COLUMNS: &str = "id, user_id, widget_title, welcome_message, primary_color, \
                                position, collect_customer_name, updated_at";

// =============================================================================
// Handlers
// =============================================================================

/// `GET /settings?appId=`
pub async fn get_public_settings(
    State(state): State<AppState>,
    Query(query): Query<PublicSettingsQuery>,
) -> ApiResult<Json<PublicSettings>> {
    let app_id = query
        .app_id
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::Validation("appId is required".to_string()))?;
    let app_id = Uuid::parse_str(app_id)
        .map_err(|_| ApiError::Validation("appId must be a UUID".to_string()))?;

    let settings: PublicSettings = sqlx::query_as(
        r#"
        SELECT id AS app_id, widget_title, welcome_message, primary_color,
               position, collect_customer_name
        FROM workspace_settings
        WHERE id = $1
        "#,
    )
    .bind(app_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok(Json(settings))
}

/// `GET /settings/me`, creating defaults on first read
pub async fn get_my_settings(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
) -> ApiResult<Json<WorkspaceSettings>> {
    sqlx::query(
        "INSERT INTO workspace_settings (id, user_id) VALUES ($1, $2) ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(auth_user.user_id)
    .execute(&state.pool)
    .await?;

    let settings: WorkspaceSettings = sqlx::query_as(&format!(
        "SELECT {} FROM workspace_settings WHERE user_id = $1",
        SETTINGS_COLUMNS
    ))
    .bind(auth_user.user_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(settings))
}

/// `POST /settings` updates widget configuration and the agent's profile
pub async fn update_settings(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    ApiJson(req): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Json<WorkspaceSettings>> {
    let update = validate_update(req)?;

    let mut tx = state.pool.begin().await?;

    if update.name.is_some() || update.email.is_some() {
        sqlx::query(
            r#"
            UPDATE users
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(auth_user.user_id)
        .bind(&update.name)
        .bind(&update.email)
        .execute(&mut *tx)
        .await
        .map_err(|e| match ApiError::from(e) {
            ApiError::Conflict(_) => ApiError::Conflict("Email already in use".to_string()),
            other => other,
        })?;
    }

    let settings: WorkspaceSettings = sqlx::query_as(&format!(
        r#"
        INSERT INTO workspace_settings
            (id, user_id, widget_title, welcome_message, primary_color, position, collect_customer_name)
        VALUES (
            $1, $2,
            COALESCE($3, 'Chat with us'),
            COALESCE($4, 'Hi! How can we help you today?'),
            COALESCE($5, '#2563eb'),
            COALESCE($6, 'bottom-right'),
            COALESCE($7, FALSE)
        )
        ON CONFLICT (user_id) DO UPDATE SET
            widget_title = COALESCE($3, workspace_settings.widget_title),
            welcome_message = COALESCE($4, workspace_settings.welcome_message),
            primary_color = COALESCE($5, workspace_settings.primary_color),
            position = COALESCE($6, workspace_settings.position),
            collect_customer_name = COALESCE($7, workspace_settings.collect_customer_name),
            updated_at = NOW()
        RETURNING {}
        "#,
        SETTINGS_COLUMNS
    ))
    .bind(Uuid::new_v4())
    .bind(auth_user.user_id)
    .bind(&update.widget_title)
    .bind(&update.welcome_message)
    .bind(&update.primary_color)
    .bind(&update.position)
    .bind(update.collect_customer_name)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::info!(user_id = %auth_user.user_id, app_id = %settings.id, "Settings updated");

    Ok(Json(settings))
}

// =============================================================================
// Validation
// =============================================================================

fn validate_update(req: UpdateSettingsRequest) -> ApiResult<UpdateSettingsRequest> {
    let widget_title = req
        .widget_title
        .map(|title| {
            let title = title.trim().to_string();
            let len = title.chars().count();
            if len == 0 || len > MAX_TITLE_CHARS {
                return Err(ApiError::Validation(format!(
                    "widgetTitle must be between 1 and {} characters",
                    MAX_TITLE_CHARS
                )));
            }
            Ok(title)
        })
        .transpose()?;

    if let Some(welcome) = &req.welcome_message {
        if welcome.chars().count() > MAX_WELCOME_CHARS {
            return Err(ApiError::Validation(format!(
                "welcomeMessage must be at most {} characters",
                MAX_WELCOME_CHARS
            )));
        }
    }

    if let Some(color) = &req.primary_color {
        if !is_hex_color(color) {
            return Err(ApiError::Validation(
                "primaryColor must look like #rrggbb".to_string(),
            ));
        }
    }

    if let Some(position) = &req.position {
        if !POSITIONS.contains(&position.as_str()) {
            return Err(ApiError::Validation(format!(
                "position must be one of: {}",
                POSITIONS.join(", ")
            )));
        }
    }

    let name = req.name.as_deref().map(validate_name).transpose()?;
    let email = req.email.as_deref().map(normalize_email).transpose()?;

    Ok(UpdateSettingsRequest {
        widget_title,
        welcome_message: req.welcome_message,
        primary_color: req.primary_color.map(|c| c.to_lowercase()),
        position: req.position,
        collect_customer_name: req.collect_customer_name,
        name,
        email,
    })
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].bytes().all(|b| b.is_ascii_hexdigit())
}
