use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Behavior family of a category. Only `consume` carries consumption records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryKind {
    Generic,
    Consumption,
}

impl CategoryKind {
    pub const CONSUME_SLUG: &'static str = "consume";

    pub fn from_slug(slug: &str) -> Self {
        if slug == Self::CONSUME_SLUG {
            CategoryKind::Consumption
        } else {
            CategoryKind::Generic
        }
    }
}

/// Admin-managed reference data.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i32,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: String,
}

impl Category {
    pub fn kind(&self) -> CategoryKind {
        CategoryKind::from_slug(&self.slug)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Activity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub category_id: i32,
    pub category_slug: String, // joined from categories
    pub description: Option<String>,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Activity {
    pub fn kind(&self) -> CategoryKind {
        CategoryKind::from_slug(&self.category_slug)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Consumption {
    pub id: Uuid,
    pub activity_id: Uuid,
    pub description: Option<String>,
    pub ingredients: Option<String>, // newline-delimited
    pub consumed_at: DateTime<Utc>,
}

/// A favorite activity with the ingredients of its latest consumption, if any.
#[derive(Debug, Clone, FromRow)]
pub struct FavoriteRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: Uuid,
    pub name: String,
    pub category_id: i32,
    pub category_slug: String,
    pub description: Option<String>,
    pub favorite: bool,
}

#[derive(Debug, Clone)]
pub struct NewConsumption {
    pub description: Option<String>,
    pub ingredients: Option<String>,
    pub consumed_at: DateTime<Utc>,
}
