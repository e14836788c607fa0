//! Duplicate detection for favorite activities.
//!
//! Two favorites in the same category are the same shortcut when their
//! normalized keys are equal. Names compare case-insensitively, descriptions
//! after trimming (absent == empty), and for consumption favorites the
//! ingredients compare as an unordered set of trimmed, non-empty strings.

use std::collections::{BTreeSet, HashSet};

use uuid::Uuid;

use super::repo_types::{CategoryKind, FavoriteRow};

pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

pub fn normalize_description(description: Option<&str>) -> String {
    description.map(str::trim).unwrap_or_default().to_string()
}

pub fn normalize_ingredients<I, S>(items: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Splits stored newline-delimited ingredients into trimmed, non-empty lines.
pub fn split_ingredients(text: Option<&str>) -> Vec<String> {
    text.unwrap_or_default()
        .lines()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Inverse of [`split_ingredients`]; `None` when nothing is left after trimming.
pub fn join_ingredients<S: AsRef<str>>(items: &[S]) -> Option<String> {
    let lines: Vec<&str> = items
        .iter()
        .map(|s| s.as_ref().trim())
        .filter(|s| !s.is_empty())
        .collect();
    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FavoriteKey {
    name: String,
    kind: CategoryKind,
    description: String,
    ingredients: BTreeSet<String>,
}

impl FavoriteKey {
    pub fn new<I, S>(name: &str, kind: CategoryKind, description: Option<&str>, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let ingredients = match kind {
            CategoryKind::Consumption => normalize_ingredients(ingredients),
            CategoryKind::Generic => BTreeSet::new(),
        };
        Self {
            name: normalize_name(name),
            kind,
            description: normalize_description(description),
            ingredients,
        }
    }
}

pub trait HasFavoriteKey {
    fn favorite_key(&self) -> FavoriteKey;
}

/// A user's favorite as listed in the shortcut menu.
#[derive(Debug, Clone)]
pub struct Favorite {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub ingredients: Vec<String>,
    pub kind: CategoryKind,
}

impl Favorite {
    pub fn from_row(row: FavoriteRow, kind: CategoryKind) -> Self {
        let ingredients = match kind {
            CategoryKind::Consumption => split_ingredients(row.ingredients.as_deref()),
            CategoryKind::Generic => Vec::new(),
        };
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            ingredients,
            kind,
        }
    }
}

impl HasFavoriteKey for Favorite {
    fn favorite_key(&self) -> FavoriteKey {
        FavoriteKey::new(
            &self.name,
            self.kind,
            self.description.as_deref(),
            &self.ingredients,
        )
    }
}

pub fn is_duplicate(candidate: &FavoriteKey, existing: &[FavoriteKey]) -> bool {
    existing.iter().any(|k| k == candidate)
}

/// Drops later entries whose key was already seen; survivors keep their order.
pub fn dedupe<T: HasFavoriteKey>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .into_iter()
        .filter(|item| seen.insert(item.favorite_key()))
        .collect()
}
