// Schema provisioning SQL for MySQL
//
// Drop/create the shop schema and set the session character set for the import that follows.
// Identifiers are backtick-quoted; names are validated before they reach this module.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Types
// =============================================================================

/// Character set the shop runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CharsetMode {
    Utf8,
    Latin1,
}

impl CharsetMode {
    pub fn as_str(self) -> &'static str {
        match self {
            CharsetMode::Utf8 => "utf8",
            CharsetMode::Latin1 => "latin1",
        }
    }

    pub fn collation(self) -> String {
        format!("{}_general_ci", self.as_str())
    }
}

impl fmt::Display for CharsetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// SQL Generation (safe, backtick-quoted)
// =============================================================================

/// Backtick-quote a MySQL identifier
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

/// Schema-qualified table name, e.g. `` `oxid`.`oxconfig` ``
pub fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(table))
}

/// SQL to check if a schema exists (bind the schema name)
pub fn schema_exists_query() -> &'static str {
    "SELECT COUNT(*) FROM information_schema.SCHEMATA WHERE SCHEMA_NAME = ?"
}

/// ALTER SCHEMA for an existing schema so the drop/create below runs with a matching charset
pub fn alter_schema_charset_stmt(schema: &str, mode: CharsetMode) -> String {
    format!(
        "ALTER SCHEMA {} DEFAULT CHARACTER SET {} COLLATE {}",
        quote_ident(schema),
        mode.as_str(),
        mode.collation()
    )
}

/// Session statements issued before the schema is (re)created.
///
/// UTF-8 mode keeps `CHARACTER SET latin1` for the client side: shop setup scripts are
/// written in Latin-1 while connection, results and server use UTF-8.
pub fn session_charset_statements(mode: CharsetMode) -> Vec<String> {
    match mode {
        CharsetMode::Utf8 => vec![
            "SET NAMES 'utf8'".to_string(),
            "SET character_set_database = utf8".to_string(),
            "SET CHARACTER SET latin1".to_string(),
            "SET character_set_connection = utf8".to_string(),
            "SET character_set_results = utf8".to_string(),
            "SET character_set_server = utf8".to_string(),
        ],
        CharsetMode::Latin1 => vec!["SET CHARACTER SET latin1".to_string()],
    }
}

pub fn drop_schema_stmt(schema: &str) -> String {
    format!("DROP DATABASE IF EXISTS {}", quote_ident(schema))
}

pub fn create_schema_stmt(schema: &str, mode: CharsetMode) -> String {
    format!(
        "CREATE DATABASE {} CHARACTER SET {} COLLATE {}",
        quote_ident(schema),
        mode.as_str(),
        mode.collation()
    )
}

pub fn use_schema_stmt(schema: &str) -> String {
    format!("USE {}", quote_ident(schema))
}

/// Full statement sequence of a schema (re)creation, in execution order.
#[cfg(test)]
pub(crate) fn schema_setup_statements(schema: &str, mode: CharsetMode, exists: bool) -> Vec<String> {
    let mut stmts = Vec::new();
    if exists {
        stmts.push(alter_schema_charset_stmt(schema, mode));
    }
    stmts.extend(session_charset_statements(mode));
    stmts.push(drop_schema_stmt(schema));
    stmts.push(create_schema_stmt(schema, mode));
    stmts
}
