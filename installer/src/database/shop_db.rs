// Shop database access
//
// Everything the installer does to the shop schema besides running setup scripts. Statements
// are parameterized; identifiers come from validated settings and are backtick-quoted.

use async_trait::async_trait;
use std::sync::Arc;

use super::connection::{LazyConnection, MySqlConnector};
use super::provisioning::{self, CharsetMode};
use crate::error::{InstallError, Result};
use crate::models::config_entry::{ConfigEntry, VarType};

#[async_trait]
pub trait ShopDatabase: Send + Sync {
    /// Schema the installer provisions.
    fn schema(&self) -> &str;

    /// Session-level statement (`SET ...`) on the installer's connection.
    async fn execute_session(&self, sql: &str) -> Result<()>;

    async fn schema_exists(&self) -> Result<bool>;

    async fn alter_schema_charset(&self, mode: CharsetMode) -> Result<()>;

    async fn drop_schema(&self) -> Result<()>;

    async fn create_schema(&self, mode: CharsetMode) -> Result<()>;

    /// Returns the number of deleted rows.
    async fn delete_config(&self, shop_id: &str, var_names: &[&str]) -> Result<u64>;

    async fn insert_config(&self, rows: &[ConfigEntry]) -> Result<()>;

    async fn config_rows_by_type(&self, types: &[VarType]) -> Result<Vec<ConfigEntry>>;

    async fn find_config(&self, shop_id: &str, var_name: &str) -> Result<Option<ConfigEntry>>;

    async fn update_config_value(&self, id: &str, value: &[u8]) -> Result<()>;

    /// Insert, replacing any row with the same id.
    async fn replace_config(&self, row: &ConfigEntry) -> Result<()>;

    async fn update_shop_serial(&self, serial: &str) -> Result<()>;
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

type ConfigRow = (String, String, String, String, Vec<u8>);

fn entry_from_row((id, shop_id, var_name, var_type, var_value): ConfigRow) -> Option<ConfigEntry> {
    let Some(var_type) = VarType::from_tag(&var_type) else {
        log::warn!(
            "[PHASE: config] Skipping config row {} with unknown type '{}'",
            id,
            var_type
        );
        return None;
    };
    Some(ConfigEntry {
        id,
        shop_id,
        var_name,
        var_type,
        var_value,
    })
}

const CONFIG_COLUMNS: &str = "CAST(OXID AS CHAR), CAST(OXSHOPID AS CHAR), \
     CAST(OXVARNAME AS CHAR), CAST(OXVARTYPE AS CHAR), OXVARVALUE";

/// MySQL implementation over the installer's single connection.
pub struct MySqlShopDatabase {
    conn: Arc<LazyConnection<MySqlConnector>>,
    schema: String,
}

impl MySqlShopDatabase {
    pub fn new(conn: Arc<LazyConnection<MySqlConnector>>, schema: impl Into<String>) -> Self {
        Self {
            conn,
            schema: schema.into(),
        }
    }

    fn table(&self, name: &str) -> String {
        provisioning::qualified_table(&self.schema, name)
    }

    async fn schema_statement(&self, sql: String) -> Result<()> {
        let mut conn = self.conn.acquire().await?;
        log::debug!("[PHASE: database] {}", sql);
        sqlx::Executor::execute(&mut *conn, sql.as_str())
            .await
            .map_err(|source| InstallError::SchemaCreationFailed {
                statement: sql.clone(),
                source,
            })?;
        Ok(())
    }
}

#[async_trait]
impl ShopDatabase for MySqlShopDatabase {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn execute_session(&self, sql: &str) -> Result<()> {
        self.schema_statement(sql.to_string()).await
    }

    async fn schema_exists(&self) -> Result<bool> {
        let mut conn = self.conn.acquire().await?;
        let count: i64 = sqlx::query_scalar(provisioning::schema_exists_query())
            .bind(&self.schema)
            .fetch_one(&mut *conn)
            .await
            .map_err(InstallError::query("schema_exists"))?;
        Ok(count > 0)
    }

    async fn alter_schema_charset(&self, mode: CharsetMode) -> Result<()> {
        self.schema_statement(provisioning::alter_schema_charset_stmt(&self.schema, mode))
            .await
    }

    async fn drop_schema(&self) -> Result<()> {
        self.schema_statement(provisioning::drop_schema_stmt(&self.schema))
            .await
    }

    async fn create_schema(&self, mode: CharsetMode) -> Result<()> {
        self.schema_statement(provisioning::create_schema_stmt(&self.schema, mode))
            .await
    }

    async fn delete_config(&self, shop_id: &str, var_names: &[&str]) -> Result<u64> {
        if var_names.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "DELETE FROM {} WHERE OXSHOPID = ? AND OXVARNAME IN ({})",
            self.table("oxconfig"),
            placeholders(var_names.len())
        );
        let mut query = sqlx::query(&sql).bind(shop_id);
        for name in var_names {
            query = query.bind(*name);
        }

        let mut conn = self.conn.acquire().await?;
        let done = query
            .execute(&mut *conn)
            .await
            .map_err(InstallError::query("delete_config"))?;
        Ok(done.rows_affected())
    }

    async fn insert_config(&self, rows: &[ConfigEntry]) -> Result<()> {
        let sql = format!(
            "INSERT INTO {} (OXID, OXSHOPID, OXMODULE, OXVARNAME, OXVARTYPE, OXVARVALUE) \
             VALUES (?, ?, '', ?, ?, ?)",
            self.table("oxconfig")
        );
        let mut conn = self.conn.acquire().await?;
        for row in rows {
            sqlx::query(&sql)
                .bind(&row.id)
                .bind(&row.shop_id)
                .bind(&row.var_name)
                .bind(row.var_type.as_tag())
                .bind(&row.var_value)
                .execute(&mut *conn)
                .await
                .map_err(InstallError::query("insert_config"))?;
        }
        Ok(())
    }

    async fn config_rows_by_type(&self, types: &[VarType]) -> Result<Vec<ConfigEntry>> {
        if types.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {} FROM {} WHERE OXVARTYPE IN ({}) ORDER BY OXID",
            CONFIG_COLUMNS,
            self.table("oxconfig"),
            placeholders(types.len())
        );
        let mut query = sqlx::query_as::<_, ConfigRow>(&sql);
        for t in types {
            query = query.bind(t.as_tag());
        }

        let mut conn = self.conn.acquire().await?;
        let rows = query
            .fetch_all(&mut *conn)
            .await
            .map_err(InstallError::query("config_rows_by_type"))?;
        Ok(rows.into_iter().filter_map(entry_from_row).collect())
    }

    async fn find_config(&self, shop_id: &str, var_name: &str) -> Result<Option<ConfigEntry>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE OXSHOPID = ? AND OXVARNAME = ? LIMIT 1",
            CONFIG_COLUMNS,
            self.table("oxconfig")
        );
        let mut conn = self.conn.acquire().await?;
        let row = sqlx::query_as::<_, ConfigRow>(&sql)
            .bind(shop_id)
            .bind(var_name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(InstallError::query("find_config"))?;
        Ok(row.and_then(entry_from_row))
    }

    async fn update_config_value(&self, id: &str, value: &[u8]) -> Result<()> {
        let sql = format!(
            "UPDATE {} SET OXVARVALUE = ? WHERE OXID = ?",
            self.table("oxconfig")
        );
        let mut conn = self.conn.acquire().await?;
        sqlx::query(&sql)
            .bind(value)
            .bind(id)
            .execute(&mut *conn)
            .await
            .map_err(InstallError::query("update_config_value"))?;
        Ok(())
    }

    async fn replace_config(&self, row: &ConfigEntry) -> Result<()> {
        let sql = format!(
            "REPLACE INTO {} (OXID, OXSHOPID, OXMODULE, OXVARNAME, OXVARTYPE, OXVARVALUE) \
             VALUES (?, ?, '', ?, ?, ?)",
            self.table("oxconfig")
        );
        let mut conn = self.conn.acquire().await?;
        sqlx::query(&sql)
            .bind(&row.id)
            .bind(&row.shop_id)
            .bind(&row.var_name)
            .bind(row.var_type.as_tag())
            .bind(&row.var_value)
            .execute(&mut *conn)
            .await
            .map_err(InstallError::query("replace_config"))?;
        Ok(())
    }

    async fn update_shop_serial(&self, serial: &str) -> Result<()> {
        let sql = format!("UPDATE {} SET OXSERIAL = ?", self.table("oxshops"));
        let mut conn = self.conn.acquire().await?;
        sqlx::query(&sql)
            .bind(serial)
            .execute(&mut *conn)
            .await
            .map_err(InstallError::query("update_shop_serial"))?;
        Ok(())
    }
}
