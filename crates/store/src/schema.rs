//! SQLite schema for the recipe store

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Version 1: the `recipes` table (ingredients kept as an ordered JSON array)
/// and an index on the equality-filtered columns
pub const SCHEMA_SQL: &str = include_str!("schema.sql");

/// Ledger of applied schema versions, created before any migration runs
pub const VERSION_TABLE_SQL: &str = "CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
)";

/// Columns selected for every `Recipe` read, in `row_to_recipe` order
pub const RECIPE_COLUMNS: &str = "id, name, is_vegetarian, servings, ingredients_json, instructions";
