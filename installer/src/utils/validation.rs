// Input validation utilities

use anyhow::Result;
use regex::Regex;

const RESERVED_SCHEMAS: [&str; 4] = ["mysql", "information_schema", "performance_schema", "sys"];

/// Validate a MySQL schema name before it is interpolated as an identifier.
///
/// Only plain identifiers are accepted (letters, digits, underscore; 1-64 chars), and system
/// schemas are refused because `setup_database` drops the target.
pub fn validate_schema_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(anyhow::anyhow!("Database name cannot be empty"));
    }

    if name.len() > 64 {
        return Err(anyhow::anyhow!("Database name cannot exceed 64 characters"));
    }

    let ident_re = Regex::new(r"^[A-Za-z0-9_]+$").map_err(|e| {
        anyhow::anyhow!("Internal error: failed to compile identifier regex: {}", e)
    })?;
    if !ident_re.is_match(name) {
        return Err(anyhow::anyhow!(
            "Database name '{}' may only contain letters, numbers, and underscores",
            name
        ));
    }

    if RESERVED_SCHEMAS
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
    {
        return Err(anyhow::anyhow!("'{}' is a reserved system schema", name));
    }

    Ok(())
}
