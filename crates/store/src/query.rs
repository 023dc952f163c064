//! Translation of [`Predicate`] trees into parameterised SQLite `WHERE` clauses.
//!
//! All values travel as bound parameters; nothing from a filter is spliced
//! into the SQL text.

use crate::schema::RECIPE_COLUMNS;
use pantry_core::Predicate;
use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value;

const TRUE_SQL: &str = "1 = 1";

/// Full Unicode lowercasing; SQLite's built-in `lower()` only folds ASCII.
pub const UNICODE_LOWER: &str = "unicode_lower";

/// Register the SQL functions compiled queries depend on.
///
/// Must run on every connection before [`CompiledQuery::select_sql`] is executed.
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        UNICODE_LOWER,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let text: Option<String> = ctx.get(0)?;
            Ok(text.map(|t| t.to_lowercase()))
        },
    )
}

/// A `WHERE` clause and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub where_clause: String,
    pub params: Vec<Value>,
}

impl CompiledQuery {
    /// Full `SELECT` over the recipes table, ordered by id
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT {} FROM recipes WHERE {} ORDER BY id",
            RECIPE_COLUMNS, self.where_clause
        )
    }
}

/// Compile a predicate into SQL
pub fn compile(predicate: &Predicate) -> CompiledQuery {
    let mut params = Vec::new();
    let where_clause = render(predicate, &mut params);
    CompiledQuery { where_clause, params }
}

fn render(predicate: &Predicate, params: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Always => TRUE_SQL.to_string(),
        Predicate::Vegetarian(flag) => {
            params.push(Value::Integer(i64::from(*flag)));
            "is_vegetarian = ?".to_string()
        }
        Predicate::Servings(servings) => {
            params.push(Value::Integer(i64::from(*servings)));
            "servings = ?".to_string()
        }
        Predicate::HasIngredient(ingredient) => {
            params.push(Value::Text(ingredient.clone()));
            "EXISTS (SELECT 1 FROM json_each(recipes.ingredients_json) WHERE json_each.value = ?)".to_string()
        }
        Predicate::InstructionsContain(needle) => {
            params.push(Value::Text(needle.to_lowercase()));
            format!("instr({}(instructions), ?) > 0", UNICODE_LOWER)
        }
        Predicate::Not(inner) => format!("NOT ({})", render(inner, params)),
        Predicate::All(terms) if terms.is_empty() => TRUE_SQL.to_string(),
        Predicate::All(terms) => terms
            .iter()
            .map(|term| match term {
                Predicate::All(_) => format!("({})", render(term, params)),
                _ => render(term, params),
            })
            .collect::<Vec<_>>()
            .join(" AND "),
    }
}
