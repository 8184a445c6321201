// Shop installation orchestrator
//
// Runs the installation steps against one database in a fixed order. Each step commits its
// own statements; there is no rollback, so a failed run is redone from `setup_database`.

use log::{error, info, warn};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Instant;

use super::{temp, InstallStep, RunOptions};
use crate::database::config_store::ConfigStore;
use crate::database::importer::SqlImporter;
use crate::database::provisioning;
use crate::database::shop_db::ShopDatabase;
use crate::encoding::serialized::Value;
use crate::encoding::transcode::{latin9_to_utf8, transcode_value};
use crate::error::{InstallError, Result};
use crate::licensing::edition::{Edition, EditionResolver};
use crate::licensing::serial::{SerialLimits, SerialOutcome, SerialProvisioner, SkipReason};
use crate::models::config_entry::{ConfigParam, ConfigValue, VarType};
use crate::models::settings::InstallerSettings;
use crate::security::cipher::Cipher;
use crate::utils::logging::mask_sensitive;

/// Shop scope the reverse-proxy rows are written to, whatever the edition.
const VARNISH_SHOP_ID: &str = "1";

const CURRENCIES_ID: &str = "3c4f033dfb8fd4fe692715dda19ecd28";
const UTF8_MARKER_ID: &str = "utf8converted";
const UTF8_MARKER_NAME: &str = "blUtf8Converted";

/// Config types rewritten by the UTF-8 conversion.
const CONVERTED_TYPES: [VarType; 3] = [VarType::String, VarType::Array, VarType::AssocArray];

fn baseline_params() -> Vec<ConfigParam> {
    vec![
        ConfigParam::new("config1", "iSetUtfMode", ConfigValue::text("0")),
        ConfigParam::new("config2", "blLoadDynContents", ConfigValue::Bool(true)),
        ConfigParam::new("config3", "sShopCountry", ConfigValue::text("de")),
    ]
}

fn varnish_params() -> Vec<ConfigParam> {
    vec![
        ConfigParam::new(
            "35863f223f91930177693956aafe69e6",
            "iLayoutCacheLifeTime",
            ConfigValue::text("3600"),
        ),
        ConfigParam::new(
            "dbcfca66eed01fd43963443d35b109e0",
            "blReverseProxyActive",
            ConfigValue::Bool(true),
        ),
    ]
}

fn serial_params(serial: &str, limits: &SerialLimits, installed_at: i64) -> Vec<ConfigParam> {
    vec![
        ConfigParam::new(
            "serial1",
            "aSerials",
            ConfigValue::Array(Value::Sequence(vec![Value::str(serial)])),
        ),
        ConfigParam::new("serial2", "sTagList", ConfigValue::text(installed_at.to_string())),
        ConfigParam::new("serial3", "IMD", ConfigValue::text(limits.max_days.to_string())),
        ConfigParam::new("serial4", "IMA", ConfigValue::text(limits.max_articles.to_string())),
        ConfigParam::new("serial5", "IMS", ConfigValue::text(limits.max_shops.to_string())),
    ]
}

/// Default currency list: code, rate, decimal separator, thousands separator, sign, decimals.
fn currencies_param() -> ConfigParam {
    let currencies = [
        "EUR@ 1.00@ ,@ .@ €@ 2",
        "GBP@ 0.8565@ .@  @ £@ 2",
        "CHF@ 1.4326@ ,@ .@ <small>CHF</small>@ 2",
        "USD@ 1.2994@ .@  @ $@ 2",
    ];
    ConfigParam::new(
        CURRENCIES_ID,
        "aCurrencies",
        ConfigValue::Array(Value::Sequence(
            currencies.iter().map(|c| Value::str(*c)).collect(),
        )),
    )
}

fn transcode_config_value(value: ConfigValue) -> ConfigValue {
    match value {
        ConfigValue::Str(bytes) => ConfigValue::Str(latin9_to_utf8(&bytes).into_bytes()),
        ConfigValue::Array(v) => ConfigValue::Array(transcode_value(v)),
        ConfigValue::AssocArray(v) => ConfigValue::AssocArray(transcode_value(v)),
        other => other,
    }
}

/// Result of `convert_to_utf`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionReport {
    /// Rows transcoded and written back.
    pub converted: usize,
    /// The shop was already converted; nothing was touched.
    pub skipped: bool,
}

/// What a full run did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub steps: Vec<InstallStep>,
    pub serial: Option<SerialOutcome>,
    pub conversion: Option<ConversionReport>,
    pub temp_entries_removed: Option<usize>,
}

async fn run_step<T, F>(step: InstallStep, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();
    info!("[PHASE: install] [STEP: {}] Started", step);
    match fut.await {
        Ok(v) => {
            info!(
                "[PHASE: install] [STEP: {}] Completed (duration_ms={})",
                step,
                started.elapsed().as_millis()
            );
            Ok(v)
        }
        Err(e) => {
            error!(
                "[PHASE: install] [STEP: {}] Failed after {}ms: {}",
                step,
                started.elapsed().as_millis(),
                e
            );
            Err(InstallError::StepFailed {
                step,
                source: Box::new(e),
            })
        }
    }
}

pub struct ShopInstaller<D: ShopDatabase, I: SqlImporter> {
    settings: InstallerSettings,
    db: D,
    importer: I,
    cipher: Cipher,
    edition: Edition,
    serials: Option<Box<dyn SerialProvisioner>>,
    setup_dir: PathBuf,
}

impl<D: ShopDatabase, I: SqlImporter> ShopInstaller<D, I> {
    /// Resolves the edition once; it stays fixed for the installer's lifetime.
    pub fn new(
        settings: InstallerSettings,
        db: D,
        importer: I,
        editions: &dyn EditionResolver,
    ) -> Result<Self> {
        settings.validate()?;
        let edition = editions.resolve_edition()?;
        let cipher = Cipher::new(&settings.config_key);
        let setup_dir = settings.setup_directory();

        info!(
            "[PHASE: initialization] Edition {} (shop id {}), charset {}, setup dir {:?}",
            edition,
            edition.shop_id(),
            settings.charset_mode(),
            setup_dir
        );

        Ok(Self {
            settings,
            db,
            importer,
            cipher,
            edition,
            serials: None,
            setup_dir,
        })
    }

    /// Wire in serial support; without it `set_serial_number` is a no-op.
    pub fn with_serial_provisioner(mut self, provisioner: Box<dyn SerialProvisioner>) -> Self {
        self.serials = Some(provisioner);
        self
    }

    pub fn set_setup_directory(&mut self, dir: impl Into<PathBuf>) {
        self.setup_dir = dir.into();
    }

    pub fn setup_directory(&self) -> &Path {
        &self.setup_dir
    }

    pub fn edition(&self) -> Edition {
        self.edition
    }

    pub fn shop_id(&self) -> &'static str {
        self.edition.shop_id()
    }

    pub fn settings(&self) -> &InstallerSettings {
        &self.settings
    }

    pub fn database(&self) -> &D {
        &self.db
    }

    pub fn importer(&self) -> &I {
        &self.importer
    }

    /// `<setup dir>/sql<version suffix>/<name>`
    pub fn sql_file(&self, name: &str) -> PathBuf {
        self.setup_dir
            .join(format!("sql{}", self.settings.version_suffix))
            .join(name)
    }

    fn store(&self) -> ConfigStore<'_, D> {
        ConfigStore::new(&self.db, &self.cipher)
    }

    /// Drop and recreate the schema in the configured charset, then import `database.sql`.
    /// Destroys any existing shop data.
    pub async fn setup_database(&self) -> Result<()> {
        let mode = self.settings.charset_mode();
        warn!(
            "[PHASE: install] [STEP: setup_database] Recreating schema {} ({}); existing data is dropped",
            self.db.schema(),
            mode
        );

        if self.db.schema_exists().await? {
            self.db.alter_schema_charset(mode).await?;
        }
        for stmt in provisioning::session_charset_statements(mode) {
            self.db.execute_session(&stmt).await?;
        }
        self.db.drop_schema().await?;
        self.db.create_schema(mode).await?;

        self.import_file(&self.sql_file("database.sql"), false).await
    }

    pub async fn insert_demo_data(&self) -> Result<()> {
        self.import_file(&self.sql_file("demodata.sql"), false).await
    }

    pub async fn convert_to_international(&self) -> Result<()> {
        self.import_file(&self.sql_file("en.sql"), false).await
    }

    pub async fn import_file(&self, path: &Path, force_charset: bool) -> Result<()> {
        info!(
            "[PHASE: install] [STEP: import] {:?} (force_charset={})",
            path, force_charset
        );
        self.importer.import(path, force_charset).await
    }

    /// Reset `iSetUtfMode`, `blLoadDynContents` and `sShopCountry` to their install defaults.
    pub async fn set_configuration_parameters(&self) -> Result<()> {
        self.store()
            .upsert(self.shop_id(), &baseline_params())
            .await
    }

    /// Validate `serial` (or the provisioner's default), store it on the shop and replace the
    /// serial config rows. Nothing is written unless validation and every limit succeed.
    pub async fn set_serial_number(&self, serial: Option<&str>) -> Result<SerialOutcome> {
        let Some(provisioner) = self.serials.as_deref() else {
            info!("[PHASE: install] [STEP: set_serial_number] No serial capability; skipping");
            return Ok(SerialOutcome::Skipped(SkipReason::CapabilityUnavailable));
        };

        let serial = match serial.map(str::trim).filter(|s| !s.is_empty()) {
            Some(s) => s.to_string(),
            None => provisioner.default_serial(),
        };
        let code = self.edition.serial_edition_code();
        let invalid = |reason: String| {
            warn!(
                "[PHASE: install] [STEP: set_serial_number] Serial {} rejected: {}",
                mask_sensitive(&serial),
                reason
            );
            InstallError::SerialInvalid {
                serial: serial.clone(),
            }
        };

        match provisioner.validate(&serial, code) {
            Ok(true) => {}
            Ok(false) => return Err(invalid("validation failed".to_string())),
            Err(e) => return Err(invalid(e.to_string())),
        }
        let limits = SerialLimits::compute(provisioner, &serial, code)
            .map_err(|e| invalid(e.to_string()))?;

        self.db.update_shop_serial(&serial).await?;
        let params = serial_params(&serial, &limits, chrono::Utc::now().timestamp());
        self.store().upsert(self.shop_id(), &params).await?;

        info!(
            "[PHASE: install] [STEP: set_serial_number] Serial {} applied (days={}, articles={}, shops={})",
            mask_sensitive(&serial),
            limits.max_days,
            limits.max_articles,
            limits.max_shops
        );
        Ok(SerialOutcome::Applied { serial, limits })
    }

    /// Convert config values from ISO-8859-15 to UTF-8 and repair the currency list.
    ///
    /// Runs once per shop: a `blUtf8Converted` marker row is written last, and a shop that has
    /// it is skipped. All rows are decoded before the first write. The shop's currency row is
    /// replaced without being decoded, since it may be the corrupt value being repaired.
    pub async fn convert_to_utf(&self) -> Result<ConversionReport> {
        let shop_id = self.shop_id();
        if self.db.find_config(shop_id, UTF8_MARKER_NAME).await?.is_some() {
            warn!(
                "[PHASE: install] [STEP: convert_to_utf] Shop {} is already converted; skipping",
                shop_id
            );
            return Ok(ConversionReport {
                converted: 0,
                skipped: true,
            });
        }

        let store = self.store();
        let converted: Vec<(String, ConfigValue)> = store
            .load_by_types(&CONVERTED_TYPES, |entry| {
                !(entry.id == CURRENCIES_ID && entry.shop_id == shop_id)
            })
            .await?
            .into_iter()
            .map(|(entry, value)| (entry.id, transcode_config_value(value)))
            .collect();

        for (id, value) in &converted {
            store.rewrite(id, value).await?;
        }
        store.replace(shop_id, &currencies_param()).await?;
        store
            .upsert(
                shop_id,
                &[ConfigParam::new(
                    UTF8_MARKER_ID,
                    UTF8_MARKER_NAME,
                    ConfigValue::Bool(true),
                )],
            )
            .await?;

        info!(
            "[PHASE: install] [STEP: convert_to_utf] {} config rows converted",
            converted.len()
        );
        Ok(ConversionReport {
            converted: converted.len(),
            skipped: false,
        })
    }

    /// Enable the reverse proxy with a one-hour layout cache.
    pub async fn turn_varnish_on(&self) -> Result<()> {
        self.store()
            .upsert(VARNISH_SHOP_ID, &varnish_params())
            .await
    }

    pub async fn clear_temp(&self) -> Result<usize> {
        temp::clear_dir(&self.settings.compile_directory()).await
    }

    /// Run the installation in order, stopping at the first failing step.
    pub async fn run_all(&self, options: &RunOptions) -> Result<RunSummary> {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        run_step(InstallStep::SetupDatabase, self.setup_database()).await?;
        summary.steps.push(InstallStep::SetupDatabase);

        if options.demo_data {
            run_step(InstallStep::InsertDemoData, self.insert_demo_data()).await?;
            summary.steps.push(InstallStep::InsertDemoData);
        }

        if options.international {
            run_step(
                InstallStep::ConvertToInternational,
                self.convert_to_international(),
            )
            .await?;
            summary.steps.push(InstallStep::ConvertToInternational);
        }

        run_step(
            InstallStep::SetConfigurationParameters,
            self.set_configuration_parameters(),
        )
        .await?;
        summary.steps.push(InstallStep::SetConfigurationParameters);

        if let Some(serial) = &options.serial {
            let outcome = run_step(
                InstallStep::SetSerialNumber,
                self.set_serial_number(serial.as_deref()),
            )
            .await?;
            summary.steps.push(InstallStep::SetSerialNumber);
            summary.serial = Some(outcome);
        }

        if options.convert_utf {
            let report = run_step(InstallStep::ConvertToUtf, self.convert_to_utf()).await?;
            summary.steps.push(InstallStep::ConvertToUtf);
            summary.conversion = Some(report);
        }

        if options.varnish {
            run_step(InstallStep::TurnVarnishOn, self.turn_varnish_on()).await?;
            summary.steps.push(InstallStep::TurnVarnishOn);
        }

        if options.clear_temp {
            let removed = run_step(InstallStep::ClearTemp, self.clear_temp()).await?;
            summary.steps.push(InstallStep::ClearTemp);
            summary.temp_entries_removed = Some(removed);
        }

        info!(
            "[PHASE: install] Installation finished: {} steps in {}ms",
            summary.steps.len(),
            started.elapsed().as_millis()
        );
        Ok(summary)
    }
}
