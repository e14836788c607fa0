use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::repo_types::{
    Activity, Category, Consumption, FavoriteRow, NewActivity, NewConsumption,
};

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// IANA zone of `user_id`, `None` when the user does not exist.
    async fn user_timezone(&self, user_id: Uuid) -> anyhow::Result<Option<String>>;

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>>;
    async fn find_category(&self, slug: &str) -> anyhow::Result<Option<Category>>;

    /// Favorites of `user_id` in one category, newest first.
    async fn favorites_in_category(
        &self,
        user_id: Uuid,
        category_id: i32,
    ) -> anyhow::Result<Vec<FavoriteRow>>;

    /// Inserts the activity and its optional consumption atomically.
    async fn insert_activity(
        &self,
        activity: NewActivity,
        consumption: Option<NewConsumption>,
    ) -> anyhow::Result<Activity>;

    async fn list_activities(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Activity>>;
    async fn find_activity(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Activity>>;
    async fn consumptions_for(&self, activity_ids: &[Uuid]) -> anyhow::Result<Vec<Consumption>>;

    /// Returns false when nothing owned by `user_id` matched.
    async fn delete_activity(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool>;
}

#[derive(Clone)]
pub struct PgActivityStore {
    db: PgPool,
}

impl PgActivityStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

const ACTIVITY_COLUMNS: &str = r#"
    a.id, a.user_id, a.name, a.category_id, c.slug AS category_slug,
    a.description, a.favorite, a.created_at, a.updated_at
"#;

#[async_trait]
impl ActivityStore for PgActivityStore {
    async fn user_timezone(&self, user_id: Uuid) -> anyhow::Result<Option<String>> {
        let zone = sqlx::query_scalar::<_, String>("SELECT timezone FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("load user timezone")?;
        Ok(zone)
    }

    async fn list_categories(&self) -> anyhow::Result<Vec<Category>> {
        let rows = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, slug, name, description, icon, color
              FROM categories
             ORDER BY name
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list categories")?;
        Ok(rows)
    }

    async fn find_category(&self, slug: &str) -> anyhow::Result<Option<Category>> {
        let row = sqlx::query_as::<_, Category>(
            r#"
            SELECT id, slug, name, description, icon, color
              FROM categories
             WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.db)
        .await
        .context("find category by slug")?;
        Ok(row)
    }

    async fn favorites_in_category(
        &self,
        user_id: Uuid,
        category_id: i32,
    ) -> anyhow::Result<Vec<FavoriteRow>> {
        let rows = sqlx::query_as::<_, FavoriteRow>(
            r#"
            SELECT a.id, a.name, a.description,
                   (SELECT co.ingredients
                      FROM consumptions co
                     WHERE co.activity_id = a.id
                     ORDER BY co.consumed_at DESC
                     LIMIT 1) AS ingredients
              FROM activities a
             WHERE a.user_id = $1 AND a.category_id = $2 AND a.favorite
             ORDER BY a.created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(category_id)
        .fetch_all(&self.db)
        .await
        .context("list favorites in category")?;
        Ok(rows)
    }

    async fn insert_activity(
        &self,
        activity: NewActivity,
        consumption: Option<NewConsumption>,
    ) -> anyhow::Result<Activity> {
        let mut tx = self.db.begin().await.context("begin tx")?;

        let id = Uuid::new_v4();
        let (created_at, updated_at): (DateTime<Utc>, DateTime<Utc>) = sqlx::query_as(
            r#"
            INSERT INTO activities (id, user_id, name, category_id, description, favorite)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(activity.user_id)
        .bind(&activity.name)
        .bind(activity.category_id)
        .bind(&activity.description)
        .bind(activity.favorite)
        .fetch_one(&mut *tx)
        .await
        .context("insert activity")?;

        if let Some(c) = consumption {
            sqlx::query(
                r#"
                INSERT INTO consumptions (id, activity_id, description, ingredients, consumed_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(c.description)
            .bind(c.ingredients)
            .bind(c.consumed_at)
            .execute(&mut *tx)
            .await
            .context("insert consumption")?;
        }

        tx.commit().await.context("commit tx")?;

        Ok(Activity {
            id,
            user_id: activity.user_id,
            name: activity.name,
            category_id: activity.category_id,
            category_slug: activity.category_slug,
            description: activity.description,
            favorite: activity.favorite,
            created_at,
            updated_at,
        })
    }

    async fn list_activities(
        &self,
        user_id: Uuid,
        limit: i64,
        offset: i64,
    ) -> anyhow::Result<Vec<Activity>> {
        let sql = format!(
            r#"
            SELECT {ACTIVITY_COLUMNS}
              FROM activities a
              JOIN categories c ON c.id = a.category_id
             WHERE a.user_id = $1
             ORDER BY a.created_at DESC
             LIMIT $2 OFFSET $3
            "#
        );
        let rows = sqlx::query_as::<_, Activity>(&sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.db)
            .await
            .context("list activities")?;
        Ok(rows)
    }

    async fn find_activity(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<Activity>> {
        let sql = format!(
            r#"
            SELECT {ACTIVITY_COLUMNS}
              FROM activities a
              JOIN categories c ON c.id = a.category_id
             WHERE a.id = $1 AND a.user_id = $2
            "#
        );
        let row = sqlx::query_as::<_, Activity>(&sql)
            .bind(id)
            .bind(user_id)
            .fetch_optional(&self.db)
            .await
            .context("find activity")?;
        Ok(row)
    }

    async fn consumptions_for(&self, activity_ids: &[Uuid]) -> anyhow::Result<Vec<Consumption>> {
        if activity_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, Consumption>(
            r#"
            SELECT id, activity_id, description, ingredients, consumed_at
              FROM consumptions
             WHERE activity_id = ANY($1)
             ORDER BY consumed_at DESC
            "#,
        )
        .bind(activity_ids)
        .fetch_all(&self.db)
        .await
        .context("list consumptions")?;
        Ok(rows)
    }

    async fn delete_activity(&self, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
        // consumptions go with it via ON DELETE CASCADE
        let res = sqlx::query("DELETE FROM activities WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.db)
            .await
            .context("delete activity")?;
        Ok(res.rows_affected() > 0)
    }
}
