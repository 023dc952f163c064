//! Recipe records and the payload used to create or replace them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Smallest allowed serving count
pub const MIN_SERVINGS: u32 = 1;

/// Largest allowed serving count
pub const MAX_SERVINGS: u32 = 10_000;

/// Store-assigned recipe identifier (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecipeId(i64);

impl RecipeId {
    /// Wrap a raw identifier, rejecting zero and negative values
    pub fn new(raw: i64) -> Option<Self> {
        (raw > 0).then_some(Self(raw))
    }

    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for RecipeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecipeId {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let raw: i64 = s
            .trim()
            .parse()
            .map_err(|_| Error::validation(format!("id: '{}' is not an integer", s)))?;
        Self::new(raw).ok_or_else(|| Error::validation(format!("id: must be positive, got {}", raw)))
    }
}

/// A persisted recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: RecipeId,
    pub name: String,
    pub is_vegetarian: bool,
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
    pub instructions: String,
}

impl Recipe {
    /// Whether `ingredient` is listed verbatim (case-sensitive)
    pub fn has_ingredient(&self, ingredient: &str) -> bool {
        self.ingredients.iter().any(|i| i == ingredient)
    }

    /// Split into id and the replaceable fields
    pub fn into_draft(self) -> (RecipeId, RecipeDraft) {
        let draft = RecipeDraft {
            name: self.name,
            is_vegetarian: self.is_vegetarian,
            servings: self.servings,
            ingredients: self.ingredients,
            instructions: self.instructions,
        };
        (self.id, draft)
    }
}

/// Create/update payload: every recipe field except the id.
///
/// Updates replace all fields; there is no partial patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDraft {
    pub name: String,
    pub is_vegetarian: bool,
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
    pub instructions: String,
}

impl RecipeDraft {
    /// Parse a draft from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Check field constraints, reporting every violation at once
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if self.name.trim().is_empty() {
            violations.push("name: must not be blank".to_string());
        }

        if !(MIN_SERVINGS..=MAX_SERVINGS).contains(&self.servings) {
            violations.push(format!(
                "servings: must be between {} and {}",
                MIN_SERVINGS, MAX_SERVINGS
            ));
        }

        if let Some(pos) = self.ingredients.iter().position(|i| i.trim().is_empty()) {
            violations.push(format!("ingredients[{}]: must not be blank", pos));
        }

        if violations.is_empty() { Ok(()) } else { Err(Error::Validation(violations.join(", "))) }
    }

    /// Attach a store-assigned id
    pub fn into_recipe(self, id: RecipeId) -> Recipe {
        Recipe {
            id,
            name: self.name,
            is_vegetarian: self.is_vegetarian,
            servings: self.servings,
            ingredients: self.ingredients,
            instructions: self.instructions,
        }
    }
}
