use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /activities`. Required fields are optional here so that a
/// missing one is reported as `InvalidInput` rather than a decode failure.
#[derive(Debug, Default, Deserialize)]
pub struct CreateActivityRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    #[serde(default)]
    pub favorite: bool,
    pub description: Option<String>,
    #[serde(default)]
    pub ingredients: Vec<String>,
    pub date: Option<String>, // YYYY-MM-DD, user's zone
    pub time: Option<String>, // HH:MM, user's zone
}

#[derive(Debug, Serialize)]
pub struct CreatedActivityResponse {
    pub message: String,
    pub id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct FavoriteItem {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ingredients: Option<Vec<String>>, // consume category only
}

#[derive(Debug, Serialize)]
pub struct ConsumptionView {
    pub id: Uuid,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub consumed_at: DateTime<Utc>,
    pub date: String, // civil, in the user's zone
    pub time: String,
}

#[derive(Debug, Serialize)]
pub struct ActivityItem {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    pub description: Option<String>,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consumption: Option<ConsumptionView>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    20
}

impl Pagination {
    pub const MAX_LIMIT: i64 = 100;

    pub fn clamped(&self) -> (i64, i64) {
        (self.limit.clamp(1, Self::MAX_LIMIT), self.offset.max(0))
    }
}
