//! Recipe store implementation with a SQLite backend
//!
//! Search predicates are compiled to SQL and evaluated by SQLite; nothing is
//! filtered in process.
use crate::error::{Error, Result, is_unique_violation};
use crate::migration::MigrationManager;
use crate::query;
use crate::repository::RecipeRepository;
use crate::schema::RECIPE_COLUMNS;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use pantry_core::{Predicate, Recipe, RecipeDraft, RecipeId};
use rusqlite::{OptionalExtension, params, params_from_iter};
use serde::{Deserialize, Serialize};
use std::{path::Path, sync::Arc};
use tokio_rusqlite::Connection;
use tracing::instrument;

/// Store statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    /// Total number of recipes
    pub recipe_count: usize,
    /// Recipes flagged vegetarian
    pub vegetarian_count: usize,
    /// Most recent insert or update, if any recipe exists
    pub last_updated: Option<DateTime<Utc>>,
}

/// Result of a write that may hit the name uniqueness constraint
///
/// Inserts carry the new rowid, updates whether a row was touched.
enum WriteOutcome<T> {
    Written(T),
    NameTaken,
}

/// A handle to the recipe store backed by SQLite
///
/// Clones share one connection; calls are serialized on its worker thread.
#[derive(Clone)]
pub struct RecipeStore {
    conn: Arc<Connection>,
}

impl RecipeStore {
    /// Open or create a recipe store at the given path
    #[instrument(skip_all, fields(db_path = %db_path.display()))]
    pub async fn open(db_path: &Path) -> Result<Self> {
        tracing::info!("Opening recipe store at {}", db_path.display());

        let conn = Connection::open(db_path)
            .await
            .map_err(|e| Error::database(format!("Failed to open database: {e}")))?;

        Self::init(conn).await
    }

    /// Open a private, non-persistent store
    pub async fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .await
            .map_err(|e| Error::database(format!("Failed to open in-memory database: {e}")))?;

        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self> {
        conn.call(|conn| {
            query::register_functions(conn)?;
            tracing::debug!("Running migrations");
            let applied =
                MigrationManager::migrate(conn).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
            tracing::trace!(?applied, "Migrations complete");
            Ok::<(), rusqlite::Error>(())
        })
        .await
        .map_err(|e| Error::database(format!("Migration failed: {e}")))?;

        tracing::info!("Recipe store opened successfully");
        Ok(Self { conn: Arc::new(conn) })
    }

    /// Get store statistics
    #[instrument(skip(self))]
    pub async fn stats(&self) -> Result<StoreStats> {
        tracing::debug!("Getting store statistics");

        let stats = self
            .conn
            .call(|conn| {
                let (recipe_count, vegetarian_count, last_updated): (i64, i64, Option<String>) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(is_vegetarian), 0), MAX(updated_at) FROM recipes",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                )?;

                let last_updated = last_updated
                    .map(|raw| {
                        NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S")
                            .map(|naive| naive.and_utc())
                            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
                    })
                    .transpose()?;

                Ok::<_, rusqlite::Error>(StoreStats {
                    recipe_count: recipe_count as usize,
                    vegetarian_count: vegetarian_count as usize,
                    last_updated,
                })
            })
            .await?;

        Ok(stats)
    }
}

fn row_to_recipe(row: &rusqlite::Row<'_>) -> rusqlite::Result<Recipe> {
    let raw_id: i64 = row.get(0)?;
    let id = RecipeId::new(raw_id).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, raw_id))?;

    let ingredients_json: String = row.get(4)?;
    let ingredients: Vec<String> = serde_json::from_str(&ingredients_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(Recipe {
        id,
        name: row.get(1)?,
        is_vegetarian: row.get(2)?,
        servings: row.get(3)?,
        ingredients,
        instructions: row.get(5)?,
    })
}

fn assigned_id(raw: i64) -> Result<RecipeId> {
    RecipeId::new(raw).ok_or_else(|| Error::database(format!("Store assigned invalid id {raw}")))
}

#[async_trait]
impl RecipeRepository for RecipeStore {
    #[instrument(skip(self, draft), fields(name = %draft.name))]
    async fn save(&self, draft: RecipeDraft) -> Result<Recipe> {
        tracing::debug!("Inserting recipe");

        let ingredients_json = serde_json::to_string(&draft.ingredients)?;
        let row = draft.clone();

        let outcome = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r#"
                    INSERT INTO recipes (name, is_vegetarian, servings, ingredients_json, instructions)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    "#,
                )?;

                match stmt.execute(params![
                    &row.name,
                    row.is_vegetarian,
                    row.servings,
                    &ingredients_json,
                    &row.instructions
                ]) {
                    Ok(_) => Ok::<_, rusqlite::Error>(WriteOutcome::Written(conn.last_insert_rowid())),
                    Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::NameTaken),
                    Err(e) => Err(e),
                }
            })
            .await?;

        match outcome {
            WriteOutcome::Written(raw_id) => {
                let id = assigned_id(raw_id)?;
                tracing::info!(%id, "Recipe created");
                Ok(draft.into_recipe(id))
            }
            WriteOutcome::NameTaken => {
                tracing::debug!("Recipe name already taken");
                Err(Error::conflict(draft.name))
            }
        }
    }

    #[instrument(skip(self, draft), fields(%id, name = %draft.name))]
    async fn update(&self, id: RecipeId, draft: RecipeDraft) -> Result<Option<Recipe>> {
        tracing::debug!("Replacing recipe");

        let ingredients_json = serde_json::to_string(&draft.ingredients)?;
        let row = draft.clone();

        let outcome = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(
                    r#"
                    UPDATE recipes SET
                        name = ?1,
                        is_vegetarian = ?2,
                        servings = ?3,
                        ingredients_json = ?4,
                        instructions = ?5,
                        updated_at = datetime('now')
                    WHERE id = ?6
                    "#,
                )?;

                match stmt.execute(params![
                    &row.name,
                    row.is_vegetarian,
                    row.servings,
                    &ingredients_json,
                    &row.instructions,
                    id.get()
                ]) {
                    Ok(rows_affected) => Ok::<_, rusqlite::Error>(WriteOutcome::Written(rows_affected > 0)),
                    Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::NameTaken),
                    Err(e) => Err(e),
                }
            })
            .await?;

        match outcome {
            WriteOutcome::Written(false) => {
                tracing::debug!("No recipe to update");
                Ok(None)
            }
            WriteOutcome::Written(true) => {
                tracing::info!("Recipe updated");
                Ok(Some(draft.into_recipe(id)))
            }
            WriteOutcome::NameTaken => Err(Error::conflict(draft.name)),
        }
    }

    #[instrument(skip(self), fields(%id))]
    async fn find_by_id(&self, id: RecipeId) -> Result<Option<Recipe>> {
        tracing::trace!("Getting recipe");

        let sql = format!("SELECT {} FROM recipes WHERE id = ?1", RECIPE_COLUMNS);
        let recipe = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                let recipe = stmt.query_row(params![id.get()], row_to_recipe).optional()?;
                Ok::<_, rusqlite::Error>(recipe)
            })
            .await?;

        Ok(recipe)
    }

    #[instrument(skip(self), fields(%id))]
    async fn delete_by_id(&self, id: RecipeId) -> Result<bool> {
        tracing::debug!("Deleting recipe");

        let deleted = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached("DELETE FROM recipes WHERE id = ?1")?;
                let rows_affected = stmt.execute(params![id.get()])?;
                Ok::<_, rusqlite::Error>(rows_affected > 0)
            })
            .await?;

        if deleted {
            tracing::info!("Recipe deleted");
        }
        Ok(deleted)
    }

    #[instrument(skip(self, predicate), fields(terms = predicate.term_count()))]
    async fn find(&self, predicate: &Predicate) -> Result<Vec<Recipe>> {
        let compiled = query::compile(predicate);
        let sql = compiled.select_sql();
        tracing::debug!(where_clause = %compiled.where_clause, "Searching recipes");

        let recipes = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare_cached(&sql)?;
                let recipes = stmt
                    .query_map(params_from_iter(compiled.params.iter()), row_to_recipe)?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok::<_, rusqlite::Error>(recipes)
            })
            .await?;

        tracing::debug!("Search returned {} recipes", recipes.len());
        Ok(recipes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::SCHEMA_VERSION;
    use pantry_core::SearchFilters;
    use tempfile::TempDir;

    fn draft(name: &str, veg: bool, servings: u32, ingredients: &[&str], instructions: &str) -> RecipeDraft {
        RecipeDraft {
            name: name.to_string(),
            is_vegetarian: veg,
            servings,
            ingredients: ingredients.iter().map(|s| s.to_string()).collect(),
            instructions: instructions.to_string(),
        }
    }

    fn vada_pav() -> RecipeDraft {
        draft("Vada Pav", true, 4, &["Potato", "Spices"], "Boil Potato and smash it.")
    }

    async fn seeded_store() -> RecipeStore {
        let store = RecipeStore::open_in_memory().await.unwrap();
        store.save(vada_pav()).await.unwrap();
        store
            .save(draft("Ramen", false, 3, &["Chicken", "Noodles", "Kimchi"], "Simmer the broth for hours."))
            .await
            .unwrap();
        store
            .save(draft("Bruschetta", true, 2, &["Tomato", "Basil", "Bread"], "Toast bread, top with tomato."))
            .await
            .unwrap();
        store
            .save(draft("Aloo Tikki", true, 4, &["Potato", "Tomato"], "Boil potatoes, shape and fry."))
            .await
            .unwrap();
        store
            .save(draft("Œufs Brouillés", true, 2, &["Oeuf", "Beurre"], "Faire ÉTAPE une, puis remuer."))
            .await
            .unwrap();
        store
    }

    fn names(recipes: &[Recipe]) -> Vec<&str> {
        recipes.iter().map(|r| r.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_store_open() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let store = RecipeStore::open(&db_path).await;
        assert!(store.is_ok());
    }

    #[tokio::test]
    async fn test_fresh_store_opens_with_correct_version() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let _store = RecipeStore::open(&db_path).await.unwrap();

        let conn = rusqlite::Connection::open(&db_path).unwrap();
        let version = MigrationManager::current_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn test_data_survives_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");

        let id = {
            let store = RecipeStore::open(&db_path).await.unwrap();
            store.save(vada_pav()).await.unwrap().id
        };

        let store = RecipeStore::open(&db_path).await.unwrap();
        let recipe = store.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(recipe.name, "Vada Pav");
        assert_eq!(recipe.ingredients, vec!["Potato", "Spices"]);
    }

    #[tokio::test]
    async fn test_save_assigns_id_and_round_trips() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let saved = store.save(vada_pav()).await.unwrap();
        assert!(saved.id.get() > 0);

        let fetched = store.find_by_id(saved.id).await.unwrap();
        assert_eq!(fetched, Some(saved));
    }

    #[tokio::test]
    async fn test_empty_ingredients_and_instructions() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let saved = store.save(draft("Water", true, 1, &[], "")).await.unwrap();
        let fetched = store.find_by_id(saved.id).await.unwrap().unwrap();
        assert!(fetched.ingredients.is_empty());
        assert_eq!(fetched.instructions, "");
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        store.save(vada_pav()).await.unwrap();

        let err = store.save(vada_pav()).await.unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_unknown_id_is_none() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let result = store.find_by_id(RecipeId::new(999).unwrap()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_delete_twice() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let saved = store.save(vada_pav()).await.unwrap();

        assert!(store.delete_by_id(saved.id).await.unwrap());
        assert!(!store.delete_by_id(saved.id).await.unwrap());
        assert!(store.find_by_id(saved.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ids_are_not_reused() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let first = store.save(vada_pav()).await.unwrap();
        store.delete_by_id(first.id).await.unwrap();

        let second = store.save(vada_pav()).await.unwrap();
        assert!(second.id > first.id);
    }

    #[tokio::test]
    async fn test_update_replaces_all_fields() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let saved = store.save(vada_pav()).await.unwrap();

        let replacement = draft("Masala Pav", false, 6, &["Pav", "Butter"], "Toast pav in butter.");
        let updated = store.update(saved.id, replacement.clone()).await.unwrap().unwrap();
        assert_eq!(updated.id, saved.id);
        assert_eq!(updated, replacement.into_recipe(saved.id));

        let fetched = store.find_by_id(saved.id).await.unwrap().unwrap();
        assert_eq!(fetched, updated);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_none() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let result = store.update(RecipeId::new(5).unwrap(), vada_pav()).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_update_to_taken_name_conflicts() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        store.save(vada_pav()).await.unwrap();
        let other = store.save(draft("Dal", true, 2, &["Lentils"], "Simmer.")).await.unwrap();

        let err = store.update(other.id, vada_pav()).await.unwrap_err();
        assert!(err.is_conflict());

        let unchanged = store.find_by_id(other.id).await.unwrap().unwrap();
        assert_eq!(unchanged.name, "Dal");
    }

    #[tokio::test]
    async fn test_update_keeping_own_name() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let saved = store.save(vada_pav()).await.unwrap();
        let same_name = RecipeDraft { servings: 8, ..vada_pav() };
        let updated = store.update(saved.id, same_name).await.unwrap().unwrap();
        assert_eq!(updated.servings, 8);
    }

    #[tokio::test]
    async fn test_find_all_on_empty_store() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        assert!(store.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_filters_returns_everything() {
        let store = seeded_store().await;
        let all = store.find_all().await.unwrap();
        let found = store.find(&SearchFilters::new().to_predicate()).await.unwrap();
        assert_eq!(found.len(), 5);
        assert_eq!(found, all);
    }

    #[tokio::test]
    async fn test_scenario_filters() {
        let store = seeded_store().await;
        let filters = SearchFilters::new()
            .vegetarian(true)
            .servings(4)
            .include(["Potato"])
            .exclude(["Tomato"])
            .instruction_text("boil");

        let found = store.find(&filters.to_predicate()).await.unwrap();
        assert_eq!(names(&found), vec!["Vada Pav"]);
    }

    #[tokio::test]
    async fn test_exclude_violated() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        store
            .save(draft("Tomato Soup", true, 4, &["Tomato"], "Boil Potato and smash it."))
            .await
            .unwrap();
        let filters = SearchFilters::new()
            .vegetarian(true)
            .servings(4)
            .include(["Potato"])
            .exclude(["Tomato"])
            .instruction_text("boil");

        assert!(store.find(&filters.to_predicate()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sql_agrees_with_in_process_evaluation() {
        let store = seeded_store().await;
        let all = store.find_all().await.unwrap();

        let cases = [
            SearchFilters::new().vegetarian(true),
            SearchFilters::new().vegetarian(false),
            SearchFilters::new().servings(4),
            SearchFilters::new().servings(0),
            SearchFilters::new().include(["Potato"]),
            SearchFilters::new().include(["Potato", "Tomato"]),
            SearchFilters::new().include(["potato"]),
            SearchFilters::new().exclude(["Tomato"]),
            SearchFilters::new().exclude(["Tomato", "Chicken"]),
            SearchFilters::new().instruction_text("BOIL"),
            SearchFilters::new().instruction_text("  "),
            SearchFilters::new().vegetarian(true).include(["Potato"]).instruction_text("fry"),
            SearchFilters::new().instruction_text("étape"),
            SearchFilters::new().instruction_text("ÉTAPE UNE"),
        ];

        for filters in cases {
            let predicate = filters.to_predicate();
            let expected: Vec<Recipe> = all.iter().filter(|r| predicate.matches(r)).cloned().collect();
            let found = store.find(&predicate).await.unwrap();
            assert_eq!(found, expected, "filters {:?}", filters);
        }
    }

    #[tokio::test]
    async fn test_instruction_search_folds_unicode_case() {
        let store = seeded_store().await;
        let found = store
            .find(&SearchFilters::new().instruction_text("étape").to_predicate())
            .await
            .unwrap();
        assert_eq!(names(&found), vec!["Œufs Brouillés"]);

        let found = store
            .find(&SearchFilters::new().instruction_text("FAIRE ÉTAPE").to_predicate())
            .await
            .unwrap();
        assert_eq!(names(&found), vec!["Œufs Brouillés"]);
    }

    #[tokio::test]
    async fn test_empty_include_same_as_omitted() {
        let store = seeded_store().await;
        let with_empty = SearchFilters::new().vegetarian(true).include(Vec::<String>::new());
        let omitted = SearchFilters::new().vegetarian(true);

        let a = store.find(&with_empty.to_predicate()).await.unwrap();
        let b = store.find(&omitted.to_predicate()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 4);
    }

    #[tokio::test]
    async fn test_membership_is_exact() {
        let store = seeded_store().await;
        let found = store.find(&SearchFilters::new().include(["Pot"]).to_predicate()).await.unwrap();
        assert!(found.is_empty());

        let found = store.find(&SearchFilters::new().include(["potato"]).to_predicate()).await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_filter_values_are_not_sql() {
        let store = seeded_store().await;
        let hostile = SearchFilters::new()
            .include(["x') OR 1=1 --"])
            .instruction_text("%' OR '1'='1");
        assert!(store.find(&hostile.to_predicate()).await.unwrap().is_empty());
        assert_eq!(store.find_all().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_repeated_find_is_stable() {
        let store = seeded_store().await;
        let predicate = SearchFilters::new().vegetarian(true).to_predicate();
        let first = store.find(&predicate).await.unwrap();
        let second = store.find(&predicate).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_concurrent_deletes_succeed_once() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let id = store.save(vada_pav()).await.unwrap().id;

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.delete_by_id(id).await.unwrap() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test]
    async fn test_concurrent_creates_with_same_name() {
        let store = RecipeStore::open_in_memory().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.save(vada_pav()).await })
            })
            .collect();

        let mut created = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(e) if e.is_conflict() => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(created, 1);
        assert_eq!(conflicts, 7);
    }

    #[tokio::test]
    async fn test_stats() {
        let store = RecipeStore::open_in_memory().await.unwrap();
        let empty = store.stats().await.unwrap();
        assert_eq!(empty.recipe_count, 0);
        assert!(empty.last_updated.is_none());

        let store = seeded_store().await;
        let stats = store.stats().await.unwrap();
        assert_eq!(stats.recipe_count, 5);
        assert_eq!(stats.vegetarian_count, 4);
        assert!(stats.last_updated.is_some());
    }
}
