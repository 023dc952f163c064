use crate::error::Result;
use async_trait::async_trait;
use pantry_core::{Predicate, Recipe, RecipeDraft, RecipeId};

/// Persistence contract for recipes.
///
/// Filtering is entirely the predicate's business; implementations only
/// execute it. Listing and search return an empty vector when nothing
/// matches, never an error.
#[async_trait]
pub trait RecipeRepository: Send + Sync {
    /// Insert a new recipe and assign its id.
    ///
    /// Fails with [`Error::Conflict`](crate::Error::Conflict) when the name is taken.
    async fn save(&self, draft: RecipeDraft) -> Result<Recipe>;

    /// Replace every field of an existing recipe; `None` when the id is unknown.
    async fn update(&self, id: RecipeId, draft: RecipeDraft) -> Result<Option<Recipe>>;

    async fn find_by_id(&self, id: RecipeId) -> Result<Option<Recipe>>;

    /// `true` if a record existed and was removed.
    async fn delete_by_id(&self, id: RecipeId) -> Result<bool>;

    /// All recipes matching `predicate`, in a stable order.
    async fn find(&self, predicate: &Predicate) -> Result<Vec<Recipe>>;

    async fn find_all(&self) -> Result<Vec<Recipe>> {
        self.find(&Predicate::always()).await
    }
}
