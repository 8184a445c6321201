// SQL setup script import
//
// Runs the shop's `.sql` setup scripts statement by statement on the installer's connection.

use async_trait::async_trait;
use sqlx::mysql::MySqlConnection;
use std::path::Path;
use std::sync::Arc;

use super::connection::{LazyConnection, MySqlConnector};
use super::provisioning::{self, CharsetMode};
use crate::encoding::transcode::latin9_to_utf8;
use crate::error::{ImportError, InstallError, Result};

#[async_trait]
pub trait SqlImporter: Send + Sync {
    /// Execute every statement of `path` against the shop schema. With `force_charset` the
    /// session character set is forced to the installation's mode first.
    async fn import(&self, path: &Path, force_charset: bool) -> Result<()>;
}

/// Split a MySQL script into statements on `;`, honoring quotes, backticks and comments.
/// Comments are dropped; empty statements are skipped.
pub fn split_mysql_statements(sql: &str) -> Vec<String> {
    enum State {
        Normal,
        Quoted(char),
        LineComment,
        BlockComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut state = State::Normal;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            State::Normal => match c {
                '\'' | '"' | '`' => {
                    state = State::Quoted(c);
                    current.push(c);
                }
                '#' => state = State::LineComment,
                '-' if chars.peek() == Some(&'-') => {
                    chars.next();
                    // `--` only starts a comment when followed by whitespace
                    match chars.peek() {
                        Some(n) if !n.is_whitespace() => current.push_str("--"),
                        _ => state = State::LineComment,
                    }
                }
                '/' if chars.peek() == Some(&'*') => {
                    chars.next();
                    state = State::BlockComment;
                }
                ';' => {
                    let stmt = current.trim();
                    if !stmt.is_empty() {
                        statements.push(stmt.to_string());
                    }
                    current.clear();
                }
                _ => current.push(c),
            },
            State::Quoted(q) => {
                current.push(c);
                if c == '\\' && q != '`' {
                    if let Some(escaped) = chars.next() {
                        current.push(escaped);
                    }
                } else if c == q {
                    // doubled quote is an escaped quote
                    if chars.peek() == Some(&q) {
                        current.push(q);
                        chars.next();
                    } else {
                        state = State::Normal;
                    }
                }
            }
            State::LineComment => {
                if c == '\n' {
                    current.push('\n');
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    chars.next();
                    current.push(' ');
                    state = State::Normal;
                }
            }
        }
    }

    let stmt = current.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
    statements
}

/// Script text as the driver sends it. Scripts that are not valid UTF-8 are legacy Latin-9.
fn decode_script(bytes: Vec<u8>) -> (String, bool) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, false),
        Err(e) => (latin9_to_utf8(e.as_bytes()), true),
    }
}

pub struct MySqlFileImporter {
    conn: Arc<LazyConnection<MySqlConnector>>,
    schema: String,
    mode: CharsetMode,
}

impl MySqlFileImporter {
    pub fn new(
        conn: Arc<LazyConnection<MySqlConnector>>,
        schema: impl Into<String>,
        mode: CharsetMode,
    ) -> Self {
        Self {
            conn,
            schema: schema.into(),
            mode,
        }
    }

    /// Session statements issued before the script body.
    ///
    /// The client charset is always utf8mb4, also in latin1 mode: script text reaches the server
    /// as UTF-8 and the server converts it to the column charset. MySQL's latin1 is cp1252, so
    /// ISO-8859-15-only characters land as their cp1252 bytes (`€` as `0x80`).
    fn session_statements(&self, force_charset: bool) -> Vec<String> {
        let mut session = vec![provisioning::use_schema_stmt(&self.schema)];
        if force_charset {
            session.push(format!("SET NAMES '{}'", self.mode.as_str()));
        }
        session.push("SET character_set_client = utf8mb4".to_string());
        session
    }
}

async fn read_statements(path: &Path) -> std::result::Result<Vec<String>, ImportError> {
    // The handle is closed when `read` returns, before any statement runs.
    let bytes = tokio::fs::read(path).await?;
    let (text, transcoded) = decode_script(bytes);
    if transcoded {
        log::info!(
            "[PHASE: import] {:?} is not UTF-8; decoded as ISO-8859-15",
            path
        );
    }
    Ok(split_mysql_statements(&text))
}

async fn execute_script(
    conn: &mut MySqlConnection,
    session: &[String],
    statements: &[String],
) -> std::result::Result<(), ImportError> {
    for stmt in session {
        sqlx::Executor::execute(&mut *conn, stmt.as_str())
            .await
            .map_err(ImportError::Session)?;
    }

    for (idx, stmt) in statements.iter().enumerate() {
        sqlx::Executor::execute(&mut *conn, stmt.as_str())
            .await
            .map_err(|source| ImportError::Statement {
                index: idx + 1,
                source,
            })?;
    }
    Ok(())
}

#[async_trait]
impl SqlImporter for MySqlFileImporter {
    async fn import(&self, path: &Path, force_charset: bool) -> Result<()> {
        let failed = |source| InstallError::ImportFailed {
            file: path.to_path_buf(),
            source,
        };

        log::info!("[PHASE: import] Importing {:?}", path);
        let statements = read_statements(path).await.map_err(failed)?;

        let mut conn = self.conn.acquire().await?;
        execute_script(&mut conn, &self.session_statements(force_charset), &statements)
            .await
            .map_err(failed)?;

        log::info!(
            "[PHASE: import] {} statements executed from {:?}",
            statements.len(),
            path
        );
        Ok(())
    }
}
