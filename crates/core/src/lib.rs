//! Domain model, search filters, configuration and logging for Pantry.

pub mod config;
pub mod error;
pub mod filter;
pub mod logging;
pub mod recipe;

pub use config::{Config, ConfigError, FileLoggingConfig, LoggingConfig, StoreConfig};
pub use error::{Error, Result};
pub use filter::{Predicate, SearchFilters};
pub use recipe::{MAX_SERVINGS, MIN_SERVINGS, Recipe, RecipeDraft, RecipeId};
