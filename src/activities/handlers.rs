use axum::{
    async_trait,
    extract::{FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    routing::get,
    Json, Router,
};
use tracing::{debug, instrument};
use uuid::Uuid;

use super::{
    dto::{
        ActivityItem, CreateActivityRequest, CreatedActivityResponse, FavoriteItem,
        MessageResponse, Pagination,
    },
    repo_types::Category,
    services,
};
use crate::{
    auth::extractors::AuthUser,
    error::ApiError,
    extract::{ApiJson, ApiQuery},
    state::AppState,
};

pub fn activity_routes() -> Router<AppState> {
    Router::new()
        .route("/activities", get(list_activities).post(create_activity))
        .route("/activities/:id", get(get_activity).delete(delete_activity))
        .route("/activities/favorites/:category_slug", get(get_favorites))
}

pub fn category_routes() -> Router<AppState> {
    Router::new().route("/categories", get(list_categories))
}

/// `:id` path segment; anything that is not a UUID cannot name an activity.
#[derive(Debug, Clone, Copy)]
pub struct ActivityId(pub Uuid);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for ActivityId {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|e| {
                debug!(error = %e, "unparseable activity id");
                ApiError::NotFound("activity")
            })?;
        Ok(ActivityId(id))
    }
}

async fn user_timezone(state: &AppState, user_id: Uuid) -> Result<String, ApiError> {
    state
        .store
        .user_timezone(user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthenticated("user not found".into()))
}

#[instrument(skip(state, payload))]
pub async fn create_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<CreateActivityRequest>,
) -> Result<(StatusCode, Json<CreatedActivityResponse>), ApiError> {
    let tz = user_timezone(&state, user_id).await?;
    let activity = services::create_activity(state.store.as_ref(), user_id, &tz, &payload).await?;
    Ok((
        StatusCode::CREATED,
        Json(CreatedActivityResponse {
            message: format!("Activity {:?} saved", activity.name),
            id: activity.id,
        }),
    ))
}

#[instrument(skip(state))]
pub async fn list_activities(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiQuery(page): ApiQuery<Pagination>,
) -> Result<Json<Vec<ActivityItem>>, ApiError> {
    let tz = user_timezone(&state, user_id).await?;
    let items = services::list_activities(state.store.as_ref(), user_id, &tz, &page).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn get_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ActivityId(id): ActivityId,
) -> Result<Json<ActivityItem>, ApiError> {
    let tz = user_timezone(&state, user_id).await?;
    let item = services::get_activity(state.store.as_ref(), user_id, &tz, id).await?;
    Ok(Json(item))
}

#[instrument(skip(state))]
pub async fn delete_activity(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ActivityId(id): ActivityId,
) -> Result<Json<MessageResponse>, ApiError> {
    services::delete_activity(state.store.as_ref(), user_id, id).await?;
    Ok(Json(MessageResponse {
        message: "Activity deleted".into(),
    }))
}

#[instrument(skip(state))]
pub async fn get_favorites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(category_slug): Path<String>,
) -> Result<Json<Vec<FavoriteItem>>, ApiError> {
    let items = services::list_favorites(state.store.as_ref(), user_id, &category_slug).await?;
    Ok(Json(items))
}

#[instrument(skip(state))]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(services::list_categories(state.store.as_ref()).await?))
}
