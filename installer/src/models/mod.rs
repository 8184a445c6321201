pub mod config_entry;
pub mod settings;
