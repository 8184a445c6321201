// Test doubles for the installer's collaborators

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::database::importer::SqlImporter;
use crate::database::provisioning::{self, CharsetMode};
use crate::database::shop_db::ShopDatabase;
use crate::error::{ImportError, InstallError, Result};
use crate::licensing::edition::{Edition, EditionResolver};
use crate::licensing::serial::{SerialError, SerialProvisioner};
use crate::models::config_entry::{ConfigEntry, VarType};

fn db_error(message: &str) -> sqlx::Error {
    sqlx::Error::Protocol(message.to_string())
}

#[derive(Debug, Default, Clone)]
pub(crate) struct MemoryState {
    pub schema_exists: bool,
    pub statements: Vec<String>,
    pub rows: Vec<ConfigEntry>,
    pub shop_serial: Option<String>,
    /// Number of row or shop mutations.
    pub mutations: usize,
}

/// In-memory `ShopDatabase`. Statements that contain `fail_on` fail like a server error would.
pub(crate) struct MemoryShopDatabase {
    schema: String,
    state: Mutex<MemoryState>,
    fail_on: Mutex<Option<String>>,
}

impl MemoryShopDatabase {
    pub fn new() -> Self {
        Self {
            schema: "oxid_test".to_string(),
            state: Mutex::new(MemoryState::default()),
            fail_on: Mutex::new(None),
        }
    }

    pub fn with_rows(rows: Vec<ConfigEntry>) -> Self {
        let db = Self::new();
        {
            let mut state = db.state.lock().unwrap();
            state.schema_exists = true;
            state.rows = rows;
        }
        db
    }

    pub fn fail_on(&self, fragment: &str) {
        *self.fail_on.lock().unwrap() = Some(fragment.to_string());
    }

    pub fn snapshot(&self) -> MemoryState {
        self.state.lock().unwrap().clone()
    }

    pub fn rows(&self) -> Vec<ConfigEntry> {
        self.snapshot().rows
    }

    pub fn rows_named(&self, var_name: &str) -> Vec<ConfigEntry> {
        self.rows()
            .into_iter()
            .filter(|r| r.var_name == var_name)
            .collect()
    }

    pub fn row(&self, id: &str) -> Option<ConfigEntry> {
        self.rows().into_iter().find(|r| r.id == id)
    }

    fn check(&self, statement: &str) -> std::result::Result<(), sqlx::Error> {
        match self.fail_on.lock().unwrap().as_deref() {
            Some(fragment) if statement.contains(fragment) => {
                Err(db_error(&format!("simulated failure: {}", statement)))
            }
            _ => Ok(()),
        }
    }

    fn schema_statement(&self, sql: String) -> Result<()> {
        self.check(&sql)
            .map_err(|source| InstallError::SchemaCreationFailed {
                statement: sql.clone(),
                source,
            })?;
        self.state.lock().unwrap().statements.push(sql);
        Ok(())
    }

    fn query(&self, operation: &'static str, statement: String) -> Result<()> {
        self.check(&statement).map_err(InstallError::query(operation))?;
        self.state.lock().unwrap().statements.push(statement);
        Ok(())
    }
}

#[async_trait]
impl ShopDatabase for MemoryShopDatabase {
    fn schema(&self) -> &str {
        &self.schema
    }

    async fn execute_session(&self, sql: &str) -> Result<()> {
        self.schema_statement(sql.to_string())
    }

    async fn schema_exists(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().schema_exists)
    }

    async fn alter_schema_charset(&self, mode: CharsetMode) -> Result<()> {
        self.schema_statement(provisioning::alter_schema_charset_stmt(&self.schema, mode))
    }

    async fn drop_schema(&self) -> Result<()> {
        self.schema_statement(provisioning::drop_schema_stmt(&self.schema))?;
        let mut state = self.state.lock().unwrap();
        state.schema_exists = false;
        state.rows.clear();
        state.shop_serial = None;
        Ok(())
    }

    async fn create_schema(&self, mode: CharsetMode) -> Result<()> {
        self.schema_statement(provisioning::create_schema_stmt(&self.schema, mode))?;
        self.state.lock().unwrap().schema_exists = true;
        Ok(())
    }

    async fn delete_config(&self, shop_id: &str, var_names: &[&str]) -> Result<u64> {
        self.query(
            "delete_config",
            format!("DELETE oxconfig {} {:?}", shop_id, var_names),
        )?;
        let mut state = self.state.lock().unwrap();
        let before = state.rows.len();
        state
            .rows
            .retain(|r| !(r.shop_id == shop_id && var_names.contains(&r.var_name.as_str())));
        let deleted = (before - state.rows.len()) as u64;
        state.mutations += deleted as usize;
        Ok(deleted)
    }

    async fn insert_config(&self, rows: &[ConfigEntry]) -> Result<()> {
        for row in rows {
            self.query(
                "insert_config",
                format!("INSERT oxconfig {} {}", row.id, row.var_name),
            )?;
            let mut state = self.state.lock().unwrap();
            if state.rows.iter().any(|r| r.id == row.id) {
                return Err(InstallError::QueryFailed {
                    operation: "insert_config",
                    source: db_error(&format!("Duplicate entry '{}' for key 'PRIMARY'", row.id)),
                });
            }
            state.rows.push(row.clone());
            state.mutations += 1;
        }
        Ok(())
    }

    async fn config_rows_by_type(&self, types: &[VarType]) -> Result<Vec<ConfigEntry>> {
        let mut rows: Vec<ConfigEntry> = self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .filter(|r| types.contains(&r.var_type))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(rows)
    }

    async fn find_config(&self, shop_id: &str, var_name: &str) -> Result<Option<ConfigEntry>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| r.shop_id == shop_id && r.var_name == var_name)
            .cloned())
    }

    async fn update_config_value(&self, id: &str, value: &[u8]) -> Result<()> {
        self.query("update_config_value", format!("UPDATE oxconfig {}", id))?;
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.rows.iter_mut().find(|r| r.id == id) {
            row.var_value = value.to_vec();
            state.mutations += 1;
        }
        Ok(())
    }

    async fn replace_config(&self, row: &ConfigEntry) -> Result<()> {
        self.query("replace_config", format!("REPLACE oxconfig {}", row.id))?;
        let mut state = self.state.lock().unwrap();
        state.rows.retain(|r| r.id != row.id);
        state.rows.push(row.clone());
        state.mutations += 1;
        Ok(())
    }

    async fn update_shop_serial(&self, serial: &str) -> Result<()> {
        self.query("update_shop_serial", format!("UPDATE oxshops {}", serial))?;
        let mut state = self.state.lock().unwrap();
        state.shop_serial = Some(serial.to_string());
        state.mutations += 1;
        Ok(())
    }
}

/// Records every import; files named in `failing` fail.
#[derive(Default)]
pub(crate) struct RecordingImporter {
    imports: Mutex<Vec<(PathBuf, bool)>>,
    failing: HashSet<String>,
}

impl RecordingImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(file_name: &str) -> Self {
        Self {
            failing: HashSet::from([file_name.to_string()]),
            ..Self::default()
        }
    }

    pub fn imports(&self) -> Vec<(PathBuf, bool)> {
        self.imports.lock().unwrap().clone()
    }

    pub fn imported_files(&self) -> Vec<String> {
        self.imports()
            .iter()
            .filter_map(|(p, _)| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect()
    }
}

#[async_trait]
impl SqlImporter for RecordingImporter {
    async fn import(&self, path: &Path, force_charset: bool) -> Result<()> {
        self.imports
            .lock()
            .unwrap()
            .push((path.to_path_buf(), force_charset));

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.failing.contains(&name) {
            return Err(InstallError::ImportFailed {
                file: path.to_path_buf(),
                source: ImportError::Statement {
                    index: 1,
                    source: db_error("You have an error in your SQL syntax"),
                },
            });
        }
        Ok(())
    }
}

/// Accepts the serials it was given, with fixed limits per serial.
pub(crate) struct ScriptedSerials {
    limits: HashMap<String, (u64, u64, u64)>,
    default_serial: String,
    pub validated: Mutex<Vec<(String, u8)>>,
}

impl ScriptedSerials {
    pub fn new(default_serial: &str) -> Self {
        Self {
            limits: HashMap::new(),
            default_serial: default_serial.to_string(),
            validated: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting(mut self, serial: &str, days: u64, articles: u64, shops: u64) -> Self {
        self.limits
            .insert(serial.to_string(), (days, articles, shops));
        self
    }

    fn limits(&self, serial: &str) -> std::result::Result<(u64, u64, u64), SerialError> {
        self.limits
            .get(serial)
            .copied()
            .ok_or_else(|| SerialError::Malformed(serial.to_string()))
    }
}

impl SerialProvisioner for ScriptedSerials {
    fn validate(&self, serial: &str, edition_code: u8) -> std::result::Result<bool, SerialError> {
        self.validated
            .lock()
            .unwrap()
            .push((serial.to_string(), edition_code));
        Ok(self.limits.contains_key(serial))
    }

    fn max_days(&self, serial: &str, _edition_code: u8) -> std::result::Result<u64, SerialError> {
        Ok(self.limits(serial)?.0)
    }

    fn max_articles(&self, serial: &str, _edition_code: u8) -> std::result::Result<u64, SerialError> {
        Ok(self.limits(serial)?.1)
    }

    fn max_shops(&self, serial: &str, _edition_code: u8) -> std::result::Result<u64, SerialError> {
        Ok(self.limits(serial)?.2)
    }

    fn default_serial(&self) -> String {
        self.default_serial.clone()
    }
}

pub(crate) struct FixedEdition(pub Edition);

impl EditionResolver for FixedEdition {
    fn resolve_edition(&self) -> Result<Edition> {
        Ok(self.0)
    }
}
