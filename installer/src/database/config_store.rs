// Encrypted config store over `oxconfig`
//
// Values are sealed with the shop's cipher before they reach the database and opened after
// they come back. Writes of named values are delete-then-insert so a shop scope never holds
// two rows for one name.

use super::shop_db::ShopDatabase;
use crate::error::{InstallError, Result};
use crate::models::config_entry::{ConfigEntry, ConfigParam, ConfigValue, VarType};
use crate::security::cipher::Cipher;

pub struct ConfigStore<'a, D: ShopDatabase + ?Sized> {
    db: &'a D,
    cipher: &'a Cipher,
}

impl<'a, D: ShopDatabase + ?Sized> ConfigStore<'a, D> {
    pub fn new(db: &'a D, cipher: &'a Cipher) -> Self {
        Self { db, cipher }
    }

    pub fn seal(&self, value: &ConfigValue) -> Vec<u8> {
        self.cipher.encrypt(&value.to_plaintext())
    }

    pub fn open(&self, entry: &ConfigEntry) -> Result<ConfigValue> {
        let plaintext = self.cipher.decrypt(&entry.var_value);
        ConfigValue::from_plaintext(entry.var_type, plaintext).map_err(|e| {
            InstallError::EncodingFailed {
                value: entry.var_name.clone(),
                reason: e.to_string(),
            }
        })
    }

    pub fn entry(&self, shop_id: &str, param: &ConfigParam) -> ConfigEntry {
        ConfigEntry {
            id: param.id.clone(),
            shop_id: shop_id.to_string(),
            var_name: param.var_name.clone(),
            var_type: param.value.var_type(),
            var_value: self.seal(&param.value),
        }
    }

    /// Delete every row carrying one of the names in `shop_id`, then insert `params`.
    pub async fn upsert(&self, shop_id: &str, params: &[ConfigParam]) -> Result<()> {
        let names: Vec<&str> = params.iter().map(|p| p.var_name.as_str()).collect();
        self.upsert_replacing(shop_id, &names, params).await
    }

    /// Like `upsert`, but clears `names` (which may include names not re-inserted).
    pub async fn upsert_replacing(
        &self,
        shop_id: &str,
        names: &[&str],
        params: &[ConfigParam],
    ) -> Result<()> {
        let deleted = self.db.delete_config(shop_id, names).await?;
        log::debug!(
            "[PHASE: config] Removed {} rows for {:?} in shop {}",
            deleted,
            names,
            shop_id
        );

        let rows: Vec<ConfigEntry> = params.iter().map(|p| self.entry(shop_id, p)).collect();
        self.db.insert_config(&rows).await
    }

    pub async fn load(&self, shop_id: &str, var_name: &str) -> Result<Option<ConfigValue>> {
        match self.db.find_config(shop_id, var_name).await? {
            Some(entry) => self.open(&entry).map(Some),
            None => Ok(None),
        }
    }

    /// Decode every row of `types` that `keep` accepts. Rejected rows are never decoded.
    pub async fn load_by_types<F>(
        &self,
        types: &[VarType],
        keep: F,
    ) -> Result<Vec<(ConfigEntry, ConfigValue)>>
    where
        F: Fn(&ConfigEntry) -> bool,
    {
        let rows = self.db.config_rows_by_type(types).await?;
        rows.into_iter()
            .filter(|entry| keep(entry))
            .map(|entry| {
                let value = self.open(&entry)?;
                Ok((entry, value))
            })
            .collect()
    }

    /// Overwrite the value of an existing row in place.
    pub async fn rewrite(&self, id: &str, value: &ConfigValue) -> Result<()> {
        self.db.update_config_value(id, &self.seal(value)).await
    }

    /// Insert `param`, replacing whatever row has its id.
    pub async fn replace(&self, shop_id: &str, param: &ConfigParam) -> Result<()> {
        self.db.replace_config(&self.entry(shop_id, param)).await
    }
}
