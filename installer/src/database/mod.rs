pub mod config_store;
pub mod connection;
pub mod importer;
pub mod provisioning;
pub mod shop_db;
