//! SQLite-backed [`Connector`].
//!
//! Every call opens its own connection, so the connector can be shared
//! freely without managing connection lifetime.

use std::path::{Path, PathBuf};

use rusqlite::Connection;

use crate::connectors::{AssertionKind, Connector};
use crate::errors::{SugarError, SugarResult};

/// Schema name SQLite gives the primary database.
pub const DEFAULT_SCHEMA: &str = "main";

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    if text == "~" || text.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let mut expanded = PathBuf::from(home);
            if text.len() > 2 {
                expanded.push(&text[2..]);
            }
            return expanded;
        }
    }
    path.to_path_buf()
}

fn quote_identifier(identifier: &str) -> String {
    format!("\"{}\"", identifier.replace('"', "\"\""))
}

fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_identifier(schema), quote_identifier(table))
}

/// Row-count query whose result is zero when the assertion holds.
fn assertion_sql(kind: AssertionKind, schema: &str, table: &str, column: &str) -> String {
    let table = qualified_table(schema, table);
    let column = quote_identifier(column);
    match kind {
        AssertionKind::Unique => format!(
            "SELECT COUNT(*) FROM (SELECT {column} FROM {table} WHERE {column} IS NOT NULL \
             GROUP BY {column} HAVING COUNT(*) > 1);"
        ),
        AssertionKind::NotNull => {
            format!("SELECT COUNT(*) FROM {table} WHERE {column} IS NULL;")
        }
    }
}

#[derive(Clone, Debug)]
pub struct SqliteConnector {
    db_path: PathBuf,
}

impl SqliteConnector {
    pub fn new(db_path: &Path) -> SugarResult<Self> {
        let db_path = expand_tilde(db_path);
        if !db_path.is_file() {
            return Err(SugarError::Connector(format!(
                "database file {} does not exist",
                db_path.display()
            )));
        }
        Ok(Self { db_path })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> SugarResult<Connection> {
        Ok(Connection::open(&self.db_path)?)
    }
}

impl Connector for SqliteConnector {
    fn list_columns(&self, table: &str, schema: &str) -> SugarResult<Vec<String>> {
        let conn = self.connect()?;
        let sql = format!(
            "PRAGMA {}.table_info({});",
            quote_identifier(schema),
            quote_identifier(table)
        );
        let mut stmt = conn.prepare(&sql)?;
        let columns = stmt
            .query_map([], |row| row.get::<_, String>(1))?
            .collect::<Result<Vec<_>, _>>()?;
        tracing::debug!(schema, table, count = columns.len(), "columns listed");
        Ok(columns)
    }

    fn run_assertion(
        &self,
        kind: AssertionKind,
        schema: &str,
        table: &str,
        column: &str,
    ) -> SugarResult<bool> {
        let conn = self.connect()?;
        let violations: i64 =
            conn.query_row(&assertion_sql(kind, schema, table, column), [], |row| row.get(0))?;
        tracing::debug!(%kind, schema, table, column, violations, "assertion evaluated");
        Ok(violations < 1)
    }
}
