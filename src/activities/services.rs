use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{
    dto::{ActivityItem, ConsumptionView, CreateActivityRequest, FavoriteItem, Pagination},
    favorites::{self, dedupe, is_duplicate, Favorite, FavoriteKey, HasFavoriteKey},
    repo::ActivityStore,
    repo_types::{Activity, Category, CategoryKind, Consumption, NewActivity, NewConsumption},
};
use crate::{error::ApiError, tz};

fn required<'a>(value: Option<&'a str>, field: &str) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::InvalidInput(format!("{field} is required")))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// When a consumption happened: the civil `date`/`time` pair in the user's
/// zone, or now when both are absent.
pub fn resolve_consumed_at(
    date: Option<&str>,
    time: Option<&str>,
    user_tz: &str,
) -> Result<DateTime<Utc>, ApiError> {
    match (non_blank(date), non_blank(time)) {
        (None, None) => Ok(Utc::now()),
        (Some(d), Some(t)) => Ok(tz::to_utc_or_utc(&d, &t, user_tz)?),
        _ => Err(ApiError::InvalidInput(
            "date and time must be provided together".into(),
        )),
    }
}

async fn category_by_slug(store: &dyn ActivityStore, slug: &str) -> Result<Category, ApiError> {
    store
        .find_category(slug)
        .await?
        .ok_or_else(|| ApiError::UnknownCategory(slug.to_string()))
}

async fn favorites_of(
    store: &dyn ActivityStore,
    user_id: Uuid,
    category: &Category,
) -> Result<Vec<Favorite>, ApiError> {
    let kind = category.kind();
    let rows = store.favorites_in_category(user_id, category.id).await?;
    Ok(rows
        .into_iter()
        .map(|row| Favorite::from_row(row, kind))
        .collect())
}

pub async fn create_activity(
    store: &dyn ActivityStore,
    user_id: Uuid,
    user_tz: &str,
    req: &CreateActivityRequest,
) -> Result<Activity, ApiError> {
    let name = required(req.name.as_deref(), "name")?;
    let slug = required(req.category.as_deref(), "category")?;
    let category = category_by_slug(store, slug).await?;
    let kind = category.kind();
    let description = non_blank(req.description.as_deref());
    debug!(%user_id, category = %category.slug, "activity validated");

    let consumption = match kind {
        CategoryKind::Consumption => Some(NewConsumption {
            description: description.clone(),
            ingredients: favorites::join_ingredients(&req.ingredients),
            consumed_at: resolve_consumed_at(req.date.as_deref(), req.time.as_deref(), user_tz)?,
        }),
        CategoryKind::Generic => None,
    };

    if req.favorite {
        let candidate = FavoriteKey::new(name, kind, description.as_deref(), &req.ingredients);
        let existing: Vec<FavoriteKey> = favorites_of(store, user_id, &category)
            .await?
            .iter()
            .map(|f| f.favorite_key())
            .collect();
        if is_duplicate(&candidate, &existing) {
            warn!(%user_id, category = %category.slug, activity_name = %name, "duplicate favorite rejected");
            return Err(ApiError::DuplicateFavorite(name.to_string()));
        }
    }

    let activity = store
        .insert_activity(
            NewActivity {
                user_id,
                name: name.to_string(),
                category_id: category.id,
                category_slug: category.slug.clone(),
                description,
                favorite: req.favorite,
            },
            consumption,
        )
        .await?;

    info!(
        activity_id = %activity.id,
        %user_id,
        category = %category.slug,
        favorite = activity.favorite,
        "activity created"
    );
    Ok(activity)
}

pub async fn delete_activity(
    store: &dyn ActivityStore,
    user_id: Uuid,
    id: Uuid,
) -> Result<(), ApiError> {
    if !store.delete_activity(user_id, id).await? {
        return Err(ApiError::NotFound("activity"));
    }
    info!(activity_id = %id, %user_id, "activity deleted");
    Ok(())
}

pub async fn list_favorites(
    store: &dyn ActivityStore,
    user_id: Uuid,
    category_slug: &str,
) -> Result<Vec<FavoriteItem>, ApiError> {
    let category = category_by_slug(store, category_slug.trim()).await?;
    let favorites = dedupe(favorites_of(store, user_id, &category).await?);
    Ok(favorites
        .into_iter()
        .map(|f| FavoriteItem {
            id: f.id,
            name: f.name,
            description: f.description,
            ingredients: match f.kind {
                CategoryKind::Consumption => Some(f.ingredients),
                CategoryKind::Generic => None,
            },
        })
        .collect())
}

pub async fn list_categories(store: &dyn ActivityStore) -> Result<Vec<Category>, ApiError> {
    Ok(store.list_categories().await?)
}

fn to_item(activity: Activity, consumption: Option<Consumption>, user_tz: &str) -> ActivityItem {
    let consumption = consumption.map(|c| {
        let (date, time) = tz::from_utc_or_utc(c.consumed_at, user_tz);
        ConsumptionView {
            id: c.id,
            ingredients: favorites::split_ingredients(c.ingredients.as_deref()),
            description: c.description,
            consumed_at: c.consumed_at,
            date,
            time,
        }
    });
    ActivityItem {
        id: activity.id,
        name: activity.name,
        category: activity.category_slug,
        description: activity.description,
        favorite: activity.favorite,
        created_at: activity.created_at,
        updated_at: activity.updated_at,
        consumption,
    }
}

/// Latest consumption per activity; rows arrive newest first.
fn latest_by_activity(rows: Vec<Consumption>) -> HashMap<Uuid, Consumption> {
    let mut out = HashMap::new();
    for c in rows {
        out.entry(c.activity_id).or_insert(c);
    }
    out
}

pub async fn list_activities(
    store: &dyn ActivityStore,
    user_id: Uuid,
    user_tz: &str,
    page: &Pagination,
) -> Result<Vec<ActivityItem>, ApiError> {
    let (limit, offset) = page.clamped();
    let activities = store.list_activities(user_id, limit, offset).await?;
    let consume_ids: Vec<Uuid> = activities
        .iter()
        .filter(|a| a.kind() == CategoryKind::Consumption)
        .map(|a| a.id)
        .collect();
    let mut consumptions = latest_by_activity(store.consumptions_for(&consume_ids).await?);
    Ok(activities
        .into_iter()
        .map(|a| {
            let c = consumptions.remove(&a.id);
            to_item(a, c, user_tz)
        })
        .collect())
}

pub async fn get_activity(
    store: &dyn ActivityStore,
    user_id: Uuid,
    user_tz: &str,
    id: Uuid,
) -> Result<ActivityItem, ApiError> {
    let activity = store
        .find_activity(user_id, id)
        .await?
        .ok_or(ApiError::NotFound("activity"))?;
    let consumption = store.consumptions_for(&[activity.id]).await?.into_iter().next();
    Ok(to_item(activity, consumption, user_tz))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activities::repo::memory::MemoryStore;

    fn req(name: &str, category: &str) -> CreateActivityRequest {
        CreateActivityRequest {
            name: Some(name.into()),
            category: Some(category.into()),
            ..Default::default()
        }
    }

    fn consume(name: &str, description: &str, ingredients: &[&str], favorite: bool) -> CreateActivityRequest {
        CreateActivityRequest {
            favorite,
            description: Some(description.into()),
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            date: Some("2024-01-15".into()),
            time: Some("14:30".into()),
            ..req(name, "consume")
        }
    }

    #[tokio::test]
    async fn missing_name_or_category_is_invalid_input() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();

        let err = create_activity(&store, user, "UTC", &req("  ", "exercise"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m.contains("name")));

        let no_category = CreateActivityRequest {
            name: Some("Run".into()),
            ..Default::default()
        };
        let err = create_activity(&store, user, "UTC", &no_category)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(ref m) if m.contains("category")));
    }

    #[tokio::test]
    async fn unknown_category_is_rejected() {
        let store = MemoryStore::seeded();
        let err = create_activity(&store, Uuid::new_v4(), "UTC", &req("Nap", "sleep"))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::UnknownCategory(ref s) if s == "sleep"));
    }

    #[tokio::test]
    async fn consumption_time_uses_user_zone() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();
        let a = create_activity(
            &store,
            user,
            "America/Toronto",
            &consume("Coffee", "", &["milk"], false),
        )
        .await
        .unwrap();

        let item = get_activity(&store, user, "America/Toronto", a.id).await.unwrap();
        let c = item.consumption.expect("consumption attached");
        assert_eq!(c.consumed_at.to_rfc3339(), "2024-01-15T19:30:00+00:00");
        assert_eq!((c.date.as_str(), c.time.as_str()), ("2024-01-15", "14:30"));
        assert_eq!(c.ingredients, ["milk"]);
    }

    #[tokio::test]
    async fn unknown_user_zone_treats_input_as_utc() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();
        let a = create_activity(&store, user, "Bogus/Zone", &consume("Tea", "", &[], false))
            .await
            .unwrap();
        let item = get_activity(&store, user, "UTC", a.id).await.unwrap();
        assert_eq!(
            item.consumption.unwrap().consumed_at.to_rfc3339(),
            "2024-01-15T14:30:00+00:00"
        );
    }

    #[tokio::test]
    async fn bad_date_or_half_pair_is_rejected() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();

        let bad = CreateActivityRequest {
            date: Some("15/01/2024".into()),
            ..consume("Tea", "", &[], false)
        };
        let err = create_activity(&store, user, "UTC", &bad).await.unwrap_err();
        assert_eq!(err.kind(), "InvalidDateTimeFormat");

        let half = CreateActivityRequest {
            time: None,
            ..consume("Tea", "", &[], false)
        };
        let err = create_activity(&store, user, "UTC", &half).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
        assert_eq!(store.consumption_count(), 0);
    }

    #[tokio::test]
    async fn generic_activity_has_no_consumption() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();
        let generic = CreateActivityRequest {
            date: Some("nonsense".into()),
            ingredients: vec!["ignored".into()],
            ..req("Run", "exercise")
        };
        let a = create_activity(&store, user, "UTC", &generic).await.unwrap();
        assert_eq!(a.kind(), CategoryKind::Generic);
        assert_eq!(store.consumption_count(), 0);
        let item = get_activity(&store, user, "UTC", a.id).await.unwrap();
        assert!(item.consumption.is_none());
    }

    #[tokio::test]
    async fn duplicate_favorite_is_rejected() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();
        create_activity(&store, user, "UTC", &consume("Latte", "", &["milk", "sugar"], true))
            .await
            .unwrap();

        let err = create_activity(&store, user, "UTC", &consume("latte", " ", &["sugar ", "milk"], true))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::DuplicateFavorite(ref n) if n == "latte"));

        // a variant with a description is a different shortcut
        create_activity(&store, user, "UTC", &consume("Latte", "with oat milk", &["milk", "sugar"], true))
            .await
            .unwrap();

        // without the favorite flag, repeats are just history
        create_activity(&store, user, "UTC", &consume("Latte", "", &["milk", "sugar"], false))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn favorites_are_scoped_per_user_and_category() {
        let store = MemoryStore::seeded();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let fav_run = CreateActivityRequest {
            favorite: true,
            ..req("Run", "exercise")
        };
        create_activity(&store, alice, "UTC", &fav_run).await.unwrap();
        create_activity(&store, bob, "UTC", &fav_run).await.unwrap();
        let fav_work = CreateActivityRequest {
            favorite: true,
            ..req("Run", "work")
        };
        create_activity(&store, alice, "UTC", &fav_work).await.unwrap();
    }

    #[tokio::test]
    async fn favorites_listing_is_deduplicated() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();
        create_activity(&store, user, "UTC", &consume("Oats", "", &["milk", "honey"], true))
            .await
            .unwrap();
        create_activity(&store, user, "UTC", &consume("Toast", "", &[], true))
            .await
            .unwrap();
        // Two concurrent creations can both pass the duplicate check; the
        // listing must still collapse them.
        let consume_category = store.find_category("consume").await.unwrap().unwrap();
        store
            .insert_activity(
                NewActivity {
                    user_id: user,
                    name: "OATS".into(),
                    category_id: consume_category.id,
                    category_slug: consume_category.slug.clone(),
                    description: None,
                    favorite: true,
                },
                Some(NewConsumption {
                    description: None,
                    ingredients: Some("honey\nmilk".into()),
                    consumed_at: Utc::now(),
                }),
            )
            .await
            .unwrap();

        let favs = list_favorites(&store, user, "consume").await.unwrap();
        assert_eq!(favs.len(), 2);
        let oats = favs
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case("oats"))
            .unwrap();
        let mut ingredients = oats.ingredients.clone().unwrap();
        ingredients.sort();
        assert_eq!(ingredients, ["honey", "milk"]);

        let none = list_favorites(&store, user, "exercise").await.unwrap();
        assert!(none.is_empty());

        let err = list_favorites(&store, user, "sleep").await.unwrap_err();
        assert!(matches!(err, ApiError::UnknownCategory(_)));
    }

    #[tokio::test]
    async fn generic_favorites_have_no_ingredients_field() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();
        let fav = CreateActivityRequest {
            favorite: true,
            description: Some("5k".into()),
            ..req("Run", "exercise")
        };
        create_activity(&store, user, "UTC", &fav).await.unwrap();
        let favs = list_favorites(&store, user, "exercise").await.unwrap();
        assert_eq!(favs.len(), 1);
        assert!(favs[0].ingredients.is_none());
        assert_eq!(favs[0].description.as_deref(), Some("5k"));
    }

    #[tokio::test]
    async fn delete_cascades_and_hides_foreign_rows() {
        let store = MemoryStore::seeded();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();
        let a = create_activity(&store, owner, "UTC", &consume("Soup", "", &["leek"], false))
            .await
            .unwrap();
        assert_eq!(store.consumption_count(), 1);

        let err = delete_activity(&store, other, a.id).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
        assert_eq!(store.consumption_count(), 1);

        delete_activity(&store, owner, a.id).await.unwrap();
        assert_eq!(store.consumption_count(), 0);
        assert!(store.consumptions_for(&[a.id]).await.unwrap().is_empty());
        assert!(matches!(
            get_activity(&store, owner, "UTC", a.id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
        assert!(matches!(
            delete_activity(&store, owner, a.id).await.unwrap_err(),
            ApiError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn listing_is_paginated_and_owned() {
        let store = MemoryStore::seeded();
        let user = Uuid::new_v4();
        for i in 0..3 {
            create_activity(&store, user, "UTC", &req(&format!("Walk {i}"), "exercise"))
                .await
                .unwrap();
        }
        create_activity(&store, Uuid::new_v4(), "UTC", &req("Other", "exercise"))
            .await
            .unwrap();
        create_activity(&store, user, "UTC", &consume("Tea", "", &[], false))
            .await
            .unwrap();

        let all = list_activities(&store, user, "UTC", &Pagination { limit: 20, offset: 0 })
            .await
            .unwrap();
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|a| a.name != "Other"));
        let tea = all.iter().find(|a| a.name == "Tea").unwrap();
        assert!(tea.consumption.is_some());

        let page = list_activities(&store, user, "UTC", &Pagination { limit: 2, offset: 3 })
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
    }

    #[tokio::test]
    async fn categories_are_listed_by_name() {
        let store = MemoryStore::seeded();
        let names: Vec<String> = list_categories(&store)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, ["Consume", "Exercise", "Work"]);
    }

    #[test]
    fn absent_date_and_time_means_now() {
        let before = Utc::now();
        let at = resolve_consumed_at(None, Some("  "), "UTC").unwrap();
        assert!(at >= before);
    }
}
