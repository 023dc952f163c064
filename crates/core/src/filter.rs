//! Search filters and the predicates they compile into.
//!
//! A [`SearchFilters`] value holds up to five optional criteria. Each one is
//! turned into a [`Predicate`] by its own factory, and only the criteria that
//! were actually supplied are conjoined. With nothing supplied the result is
//! [`Predicate::Always`], which matches every recipe.
//!
//! ```
//! use pantry_core::{Predicate, SearchFilters};
//!
//! let filters = SearchFilters::new().vegetarian(true).include(["Potato"]).exclude(["Tomato"]);
//! let predicate = filters.to_predicate();
//! assert!(!predicate.is_always());
//!
//! assert!(SearchFilters::new().to_predicate().is_always());
//! ```

use crate::recipe::Recipe;
use serde::{Deserialize, Serialize};

/// Optional search criteria; an absent field places no constraint.
///
/// `servings: Some(0)` is a real filter (it matches nothing valid) and is not
/// the same as `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Vegetarian flag must equal this value
    #[serde(default)]
    pub is_vegetarian: Option<bool>,
    /// Serving count must equal this value
    #[serde(default)]
    pub servings: Option<u32>,
    /// Every listed ingredient must be present
    #[serde(default)]
    pub include_ingredients: Option<Vec<String>>,
    /// None of the listed ingredients may be present
    #[serde(default)]
    pub exclude_ingredients: Option<Vec<String>>,
    /// Instructions must contain this text, ignoring case
    #[serde(default)]
    pub instruction_text: Option<String>,
}

type PredicateFactory = fn(&SearchFilters) -> Option<Predicate>;

/// Evaluated in this order: equality checks before membership and substring.
const FACTORIES: &[PredicateFactory] = &[
    vegetarian_predicate,
    servings_predicate,
    include_predicate,
    exclude_predicate,
    instruction_predicate,
];

fn vegetarian_predicate(filters: &SearchFilters) -> Option<Predicate> {
    filters.is_vegetarian.map(Predicate::Vegetarian)
}

fn servings_predicate(filters: &SearchFilters) -> Option<Predicate> {
    filters.servings.map(Predicate::Servings)
}

fn include_predicate(filters: &SearchFilters) -> Option<Predicate> {
    let ingredients = filters.include_ingredients.as_deref()?;
    Predicate::all(ingredients.iter().map(|i| Predicate::HasIngredient(i.clone())))
}

fn exclude_predicate(filters: &SearchFilters) -> Option<Predicate> {
    let ingredients = filters.exclude_ingredients.as_deref()?;
    Predicate::all(ingredients.iter().map(|i| !Predicate::HasIngredient(i.clone())))
}

fn instruction_predicate(filters: &SearchFilters) -> Option<Predicate> {
    let text = filters.instruction_text.as_deref()?;
    if text.trim().is_empty() {
        return None;
    }
    Some(Predicate::InstructionsContain(text.to_lowercase()))
}

impl SearchFilters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vegetarian(mut self, is_vegetarian: bool) -> Self {
        self.is_vegetarian = Some(is_vegetarian);
        self
    }

    pub fn servings(mut self, servings: u32) -> Self {
        self.servings = Some(servings);
        self
    }

    pub fn include<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include_ingredients = Some(ingredients.into_iter().map(Into::into).collect());
        self
    }

    pub fn exclude<I, S>(mut self, ingredients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_ingredients = Some(ingredients.into_iter().map(Into::into).collect());
        self
    }

    pub fn instruction_text(mut self, text: impl Into<String>) -> Self {
        self.instruction_text = Some(text.into());
        self
    }

    /// True when no criterion would constrain the search
    pub fn is_empty(&self) -> bool {
        FACTORIES.iter().all(|factory| factory(self).is_none())
    }

    /// Conjoin the predicates of every supplied criterion
    pub fn to_predicate(&self) -> Predicate {
        FACTORIES
            .iter()
            .filter_map(|factory| factory(self))
            .fold(Predicate::always(), Predicate::and)
    }
}

impl From<&SearchFilters> for Predicate {
    fn from(filters: &SearchFilters) -> Self {
        filters.to_predicate()
    }
}

/// A composable boolean test over a single recipe
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Predicate {
    /// Identity: matches everything
    #[default]
    Always,
    Vegetarian(bool),
    Servings(u32),
    /// Exact, case-sensitive ingredient membership
    HasIngredient(String),
    /// Case-insensitive substring of the instructions; the needle is stored lowercased
    InstructionsContain(String),
    Not(Box<Predicate>),
    /// Conjunction of two or more terms, none of them `Always` or `All`
    All(Vec<Predicate>),
}

impl Predicate {
    pub fn always() -> Self {
        Self::Always
    }

    pub fn is_always(&self) -> bool {
        matches!(self, Self::Always)
    }

    /// Conjoin two predicates, absorbing the identity and flattening nested conjunctions
    pub fn and(self, other: Predicate) -> Predicate {
        match (self, other) {
            (Self::Always, p) | (p, Self::Always) => p,
            (Self::All(mut left), Self::All(right)) => {
                left.extend(right);
                Self::All(left)
            }
            (Self::All(mut left), p) => {
                left.push(p);
                Self::All(left)
            }
            (p, Self::All(mut right)) => {
                right.insert(0, p);
                Self::All(right)
            }
            (a, b) => Self::All(vec![a, b]),
        }
    }

    /// Conjoin a sequence of predicates; `None` when the sequence is empty
    pub fn all<I>(predicates: I) -> Option<Predicate>
    where
        I: IntoIterator<Item = Predicate>,
    {
        predicates.into_iter().reduce(Predicate::and)
    }

    /// Evaluate against a recipe in process
    pub fn matches(&self, recipe: &Recipe) -> bool {
        match self {
            Self::Always => true,
            Self::Vegetarian(flag) => recipe.is_vegetarian == *flag,
            Self::Servings(servings) => recipe.servings == *servings,
            Self::HasIngredient(ingredient) => recipe.has_ingredient(ingredient),
            Self::InstructionsContain(needle) => recipe
                .instructions
                .to_lowercase()
                .contains(&needle.to_lowercase()),
            Self::Not(inner) => !inner.matches(recipe),
            Self::All(terms) => terms.iter().all(|t| t.matches(recipe)),
        }
    }

    /// Number of leaf conditions (0 for `Always`)
    pub fn term_count(&self) -> usize {
        match self {
            Self::Always => 0,
            Self::Not(inner) => inner.term_count(),
            Self::All(terms) => terms.iter().map(Predicate::term_count).sum(),
            _ => 1,
        }
    }
}

impl std::ops::Not for Predicate {
    type Output = Predicate;

    fn not(self) -> Predicate {
        Predicate::Not(Box::new(self))
    }
}
