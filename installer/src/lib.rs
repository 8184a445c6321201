// Shop database installer
// Main library entry point

pub mod database;
pub mod encoding;
pub mod error;
pub mod installation;
pub mod licensing;
pub mod models;
pub mod security;
pub mod utils;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use log::{error, info};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use database::connection::{LazyConnection, MySqlConnector};
use database::importer::MySqlFileImporter;
use database::shop_db::MySqlShopDatabase;
use installation::orchestrator::RunSummary;
use licensing::edition::SettingsEditionResolver;
use models::settings::InstallerSettings;

pub use error::{InstallError, Result};
pub use installation::{InstallStep, RunOptions, ShopInstaller};

/// Initialize logging system with dual format (JSON + human-readable)
pub fn init_logging(
    configured_dir: Option<&Path>,
    with_stdout: bool,
) -> std::result::Result<PathBuf, Box<dyn std::error::Error>> {
    let log_dir = utils::path_resolver::resolve_log_folder(configured_dir)?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");

    // JSON log file for structured parsing
    let json_log_file = log_dir.join(format!("installer-{}.log", timestamp));

    // Human-readable log file (.txt)
    let txt_log_file = log_dir.join(format!("installer-{}.txt", timestamp));

    let mut dispatch = fern::Dispatch::new().level(log::LevelFilter::Debug);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .level(log::LevelFilter::Info)
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        None,
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(txt_log_file)?),
        );

    dispatch.apply()?;

    log::info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(log_dir)
}

/// Install against the MySQL server named in `settings`.
///
/// No serial provisioner is wired here; library callers that have one build their own
/// `ShopInstaller` and call `with_serial_provisioner`.
pub async fn install(settings: InstallerSettings, options: &RunOptions) -> anyhow::Result<RunSummary> {
    info!(
        "[PHASE: initialization] Target database {}",
        settings.database.display_target()
    );
    info!(
        "[PHASE: initialization] Config key fingerprint {}",
        security::crypto::secret_fingerprint(&settings.config_key)
    );

    let conn = Arc::new(LazyConnection::new(MySqlConnector::from_settings(
        &settings.database,
    )));
    let db = MySqlShopDatabase::new(Arc::clone(&conn), settings.database.name.clone());
    let importer = MySqlFileImporter::new(
        conn,
        settings.database.name.clone(),
        settings.charset_mode(),
    );
    let editions = SettingsEditionResolver::new(settings.edition.clone());

    let installer = ShopInstaller::new(settings, db, importer, &editions)
        .context("Invalid installer configuration")?;
    installer
        .run_all(options)
        .await
        .context("Installation failed")
}

/// Command-line run: load settings, start logging, install on a current-thread runtime.
/// Returns the process exit code.
pub fn run_cli(config_path: Option<&Path>, mut options: RunOptions) -> i32 {
    let settings = match InstallerSettings::load(config_path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("shop-installer: {}", e);
            return 1;
        }
    };

    if let Err(e) = init_logging(settings.log_dir.as_deref(), settings.log_to_stdout) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] Installer starting at {}",
        chrono::Utc::now()
    );

    if matches!(options.serial, Some(None)) {
        options.serial = Some(settings.serial.clone());
    }

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            error!("[PHASE: initialization] Failed to build runtime: {}", e);
            eprintln!("shop-installer: failed to start runtime: {}", e);
            return 1;
        }
    };

    match runtime.block_on(install(settings, &options)) {
        Ok(summary) => {
            let steps: Vec<&str> = summary.steps.iter().map(|s| s.as_str()).collect();
            info!("[PHASE: install] Completed steps: {}", steps.join(", "));
            if let Some(outcome) = &summary.serial {
                info!("[PHASE: install] [STEP: set_serial_number] {:?}", outcome);
            }
            0
        }
        Err(e) => {
            error!("[PHASE: install] {:#}", e);
            eprintln!("shop-installer: {:#}", e);
            1
        }
    }
}
