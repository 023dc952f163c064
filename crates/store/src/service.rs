//! Recipe operations on top of a [`RecipeRepository`]
//!
//! Validation happens here, before the repository is touched; a missing id on
//! `get`/`update` becomes [`Error::NotFound`].

use crate::error::{Error, Result};
use crate::repository::RecipeRepository;
use pantry_core::{Recipe, RecipeDraft, RecipeId, SearchFilters};
use tracing::instrument;

pub struct RecipeService<R> {
    repository: R,
}

impl<R: RecipeRepository> RecipeService<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    #[instrument(skip(self, draft), fields(name = %draft.name))]
    pub async fn create(&self, draft: RecipeDraft) -> Result<Recipe> {
        draft.validate()?;
        self.repository.save(draft).await
    }

    /// Full replacement; every field of the draft is written.
    #[instrument(skip(self, draft), fields(%id))]
    pub async fn update(&self, id: RecipeId, draft: RecipeDraft) -> Result<Recipe> {
        draft.validate()?;
        self.repository
            .update(id, draft)
            .await?
            .ok_or_else(|| Error::not_found(id))
    }

    /// Returns `false` when there was nothing to delete.
    #[instrument(skip(self), fields(%id))]
    pub async fn delete(&self, id: RecipeId) -> Result<bool> {
        self.repository.delete_by_id(id).await
    }

    #[instrument(skip(self), fields(%id))]
    pub async fn get(&self, id: RecipeId) -> Result<Recipe> {
        self.repository
            .find_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(id))
    }

    pub async fn list(&self) -> Result<Vec<Recipe>> {
        self.repository.find_all().await
    }

    #[instrument(skip(self, filters))]
    pub async fn search(&self, filters: &SearchFilters) -> Result<Vec<Recipe>> {
        let predicate = filters.to_predicate();
        tracing::debug!(terms = predicate.term_count(), "Built search predicate");
        self.repository.find(&predicate).await
    }
}
