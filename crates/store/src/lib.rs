//! Recipe store implementation with a SQLite backend
//!
//! Provides durable storage for recipes and evaluates search predicates as
//! parameterised SQL.
//!
//! # Example
//!
//! ```ignore
//! use pantry_core::{RecipeDraft, SearchFilters};
//! use pantry_store::{RecipeService, RecipeStore};
//!
//! let store = RecipeStore::open(&db_path).await?;
//! let service = RecipeService::new(store);
//!
//! let draft = RecipeDraft::from_json(r#"{
//!     "name": "Vada Pav",
//!     "isVegetarian": true,
//!     "servings": 4,
//!     "ingredients": ["Potato", "Spices"],
//!     "instructions": "Boil Potato and smash it."
//! }"#)?;
//! service.create(draft).await?;
//!
//! let filters = SearchFilters::new().vegetarian(true).exclude(["Tomato"]);
//! for recipe in service.search(&filters).await? {
//!     println!("{}: {}", recipe.id, recipe.name);
//! }
//! ```

mod error;
mod migration;
pub mod query;
mod recipe_store;
mod repository;
mod schema;
mod service;

pub use error::{Error, ErrorKind, Result};
pub use recipe_store::{RecipeStore, StoreStats};
pub use repository::RecipeRepository;
pub use service::RecipeService;
