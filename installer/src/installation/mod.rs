// Installation steps
//
// `ShopInstaller` runs the shop's database installation: schema setup, script imports,
// config rows, serials and one-shot upgrade conversions. `temp` clears compiled templates.

pub mod orchestrator;
pub mod temp;

use std::fmt;

pub use orchestrator::{ConversionReport, RunSummary, ShopInstaller};

/// One step of a full installation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    SetupDatabase,
    InsertDemoData,
    ConvertToInternational,
    SetConfigurationParameters,
    SetSerialNumber,
    ConvertToUtf,
    TurnVarnishOn,
    ClearTemp,
}

impl InstallStep {
    pub fn as_str(self) -> &'static str {
        match self {
            InstallStep::SetupDatabase => "setup_database",
            InstallStep::InsertDemoData => "insert_demo_data",
            InstallStep::ConvertToInternational => "convert_to_international",
            InstallStep::SetConfigurationParameters => "set_configuration_parameters",
            InstallStep::SetSerialNumber => "set_serial_number",
            InstallStep::ConvertToUtf => "convert_to_utf",
            InstallStep::TurnVarnishOn => "turn_varnish_on",
            InstallStep::ClearTemp => "clear_temp",
        }
    }
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Optional parts of a full run. Schema setup and baseline config always run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    pub demo_data: bool,
    pub international: bool,
    /// `Some(None)` provisions the provisioner's default serial.
    pub serial: Option<Option<String>>,
    pub convert_utf: bool,
    pub varnish: bool,
    pub clear_temp: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            demo_data: true,
            international: false,
            serial: None,
            convert_utf: false,
            varnish: false,
            clear_temp: false,
        }
    }
}
