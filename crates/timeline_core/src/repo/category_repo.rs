//! Category reference-data repository and membership validator.
//!
//! # Responsibility
//! - Confirm that every requested category id exists (write-path validator).
//! - Provide read access to categories and idempotent seeding.
//!
//! # Invariants
//! - The mutation path only checks existence; it never creates categories.
//! - Validation reports every missing id, sorted, not just the first.
//! - Category names are unique case-insensitively.

use crate::db::functions::register_sql_functions;
use crate::model::category::{
    normalize_category_ids, Category, CategoryId, DEFAULT_CATEGORY_NAMES,
};
use crate::repo::event_repo::{ensure_connection_ready, parse_uuid, RepoError, RepoResult};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use uuid::Uuid;

/// Checks that all `ids` resolve to existing categories.
///
/// # Errors
/// - `RepoError::CategoryNotFound` with all missing ids.
pub fn validate_categories(conn: &Connection, ids: &[CategoryId]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "SELECT EXISTS(
            SELECT 1
            FROM categories
            WHERE uuid = ?1
        );",
    )?;

    let mut missing = Vec::new();
    for id in normalize_category_ids(ids) {
        let exists: i64 = stmt.query_row([id.to_string()], |row| row.get(0))?;
        if exists == 0 {
            missing.push(id);
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(RepoError::CategoryNotFound(missing))
    }
}

/// Repository interface for category reference data.
pub trait CategoryRepository {
    /// Lists all categories sorted by name.
    fn list_categories(&self) -> RepoResult<Vec<Category>>;
    /// Gets one category by id.
    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>>;
    /// Returns the category with `name`, inserting it when absent.
    fn ensure_category(&self, name: &str) -> RepoResult<Category>;
    /// Ensures the default category set exists, in one transaction.
    fn seed_default_categories(&mut self) -> RepoResult<Vec<Category>>;
}

/// SQLite-backed category repository.
pub struct SqliteCategoryRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteCategoryRepository<'conn> {
    /// Constructs a repository from a migrated connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        register_sql_functions(conn)?;
        Ok(Self { conn })
    }
}

impl CategoryRepository for SqliteCategoryRepository<'_> {
    fn list_categories(&self) -> RepoResult<Vec<Category>> {
        let mut stmt = self.conn.prepare(
            "SELECT uuid, name
             FROM categories
             ORDER BY name COLLATE NOCASE ASC, uuid ASC;",
        )?;
        let mut rows = stmt.query([])?;
        let mut categories = Vec::new();
        while let Some(row) = rows.next()? {
            let uuid_text: String = row.get("uuid")?;
            categories.push(Category {
                id: parse_uuid(&uuid_text, "categories.uuid")?,
                name: row.get("name")?,
            });
        }
        Ok(categories)
    }

    fn get_category(&self, id: CategoryId) -> RepoResult<Option<Category>> {
        let name: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM categories WHERE uuid = ?1;",
                [id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name.map(|name| Category { id, name }))
    }

    fn ensure_category(&self, name: &str) -> RepoResult<Category> {
        ensure_category_in(&*self.conn, name)
    }

    fn seed_default_categories(&mut self) -> RepoResult<Vec<Category>> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut seeded = Vec::with_capacity(DEFAULT_CATEGORY_NAMES.len());
        for name in DEFAULT_CATEGORY_NAMES {
            seeded.push(ensure_category_in(&tx, name)?);
        }
        tx.commit()?;
        Ok(seeded)
    }
}

fn ensure_category_in(conn: &Connection, name: &str) -> RepoResult<Category> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(RepoError::BlankCategoryName);
    }

    conn.execute(
        "INSERT OR IGNORE INTO categories (uuid, name) VALUES (?1, ?2);",
        [Uuid::new_v4().to_string().as_str(), trimmed],
    )?;

    let (uuid_text, stored_name): (String, String) = conn.query_row(
        "SELECT uuid, name FROM categories WHERE name = ?1;",
        [trimmed],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    Ok(Category {
        id: parse_uuid(&uuid_text, "categories.uuid")?,
        name: stored_name,
    })
}
