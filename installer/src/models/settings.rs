// Installer settings
//
// Layered with the `config` crate: built-in defaults, then an optional TOML file, then
// `SHOP_INSTALLER__*` environment variables (double underscore separates nesting, e.g.
// `SHOP_INSTALLER__DATABASE__PASSWORD`). Nothing is read from ambient globals after loading.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::database::provisioning::CharsetMode;
use crate::error::{InstallError, Result};
use crate::security::cipher::DEFAULT_CONFIG_KEY;
use crate::utils::logging::mask_connection_url;
use crate::utils::validation::validate_schema_name;

pub const ENV_PREFIX: &str = "SHOP_INSTALLER";
pub const DEFAULT_SETTINGS_FILE: &str = "shop-installer.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InstallerSettings {
    /// Shop root; the setup directory defaults to `<shop_path>/setup`.
    pub shop_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub setup_dir: Option<PathBuf>,
    /// Appended to `sql` when locating setup scripts (`sql<suffix>/database.sql`); may be empty.
    pub version_suffix: String,
    pub utf_mode: bool,
    pub config_key: String,
    /// Template compile dir cleared by `clear_temp`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compile_dir: Option<PathBuf>,
    /// Serial used by `--serial` when no code is given on the command line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
    pub log_to_stdout: bool,
    pub database: DatabaseSettings,
    pub edition: EditionSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
}

/// Edition indicators. When `enterprise` is set at all, the three flags decide the edition;
/// otherwise `code` (`EE`/`PE`/`CE`) does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EditionSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enterprise: Option<bool>,
    pub professional: bool,
    pub community: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            shop_path: PathBuf::from("."),
            setup_dir: None,
            version_suffix: String::new(),
            utf_mode: true,
            config_key: DEFAULT_CONFIG_KEY.to_string(),
            compile_dir: None,
            serial: None,
            log_dir: None,
            log_to_stdout: true,
            database: DatabaseSettings::default(),
            edition: EditionSettings::default(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 3306,
            user: "root".to_string(),
            password: String::new(),
            name: "oxid".to_string(),
        }
    }
}

impl InstallerSettings {
    /// Load settings from `path` (required when given) or `shop-installer.toml` in the working
    /// directory (optional), then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file_source = match path {
            Some(p) => config::File::from(p).required(true),
            None => config::File::with_name(DEFAULT_SETTINGS_FILE).required(false),
        };

        let settings: InstallerSettings = config::Config::builder()
            .add_source(file_source)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize())
            .map_err(|e| InstallError::InvalidConfiguration(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        validate_schema_name(&self.database.name)
            .map_err(|e| InstallError::InvalidConfiguration(e.to_string()))?;
        if self.database.host.trim().is_empty() {
            return Err(InstallError::InvalidConfiguration(
                "database.host is required".to_string(),
            ));
        }
        if self.config_key.is_empty() {
            return Err(InstallError::InvalidConfiguration(
                "config_key must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn charset_mode(&self) -> CharsetMode {
        if self.utf_mode {
            CharsetMode::Utf8
        } else {
            CharsetMode::Latin1
        }
    }

    pub fn setup_directory(&self) -> PathBuf {
        self.setup_dir
            .clone()
            .unwrap_or_else(|| self.shop_path.join("setup"))
    }

    pub fn compile_directory(&self) -> PathBuf {
        self.compile_dir
            .clone()
            .unwrap_or_else(|| self.shop_path.join("tmp"))
    }

    /// Render as TOML (used for `--print-default-config`). The password is included as-is.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| InstallError::InvalidConfiguration(e.to_string()))
    }
}

impl DatabaseSettings {
    /// Target description that is safe to log.
    pub fn display_target(&self) -> String {
        mask_connection_url(&format!(
            "mysql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.name
        ))
    }
}
