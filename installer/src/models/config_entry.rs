// Config table rows (`oxconfig`)

use std::fmt;

use crate::encoding::serialized::{self, SerializedError, Value};

/// Type tag stored in `OXVARTYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarType {
    String,
    Bool,
    Array,
    AssocArray,
}

impl VarType {
    pub fn as_tag(self) -> &'static str {
        match self {
            VarType::String => "str",
            VarType::Bool => "bool",
            VarType::Array => "arr",
            VarType::AssocArray => "aarr",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim() {
            "str" => Some(VarType::String),
            "bool" => Some(VarType::Bool),
            "arr" => Some(VarType::Array),
            "aarr" => Some(VarType::AssocArray),
            _ => None,
        }
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// One stored row. `var_value` is always cipher output, never plaintext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub id: String,
    pub shop_id: String,
    pub var_name: String,
    pub var_type: VarType,
    pub var_value: Vec<u8>,
}

/// Decoded plaintext of a config value.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Str(Vec<u8>),
    Bool(bool),
    Array(Value),
    AssocArray(Value),
}

impl ConfigValue {
    pub fn text(s: impl Into<Vec<u8>>) -> Self {
        ConfigValue::Str(s.into())
    }

    pub fn var_type(&self) -> VarType {
        match self {
            ConfigValue::Str(_) => VarType::String,
            ConfigValue::Bool(_) => VarType::Bool,
            ConfigValue::Array(_) => VarType::Array,
            ConfigValue::AssocArray(_) => VarType::AssocArray,
        }
    }

    /// Bytes handed to the cipher. Composites use the serialized format, `true` is `"1"` and
    /// `false` the empty string.
    pub fn to_plaintext(&self) -> Vec<u8> {
        match self {
            ConfigValue::Str(s) => s.clone(),
            ConfigValue::Bool(true) => b"1".to_vec(),
            ConfigValue::Bool(false) => Vec::new(),
            ConfigValue::Array(v) | ConfigValue::AssocArray(v) => serialized::serialize(v),
        }
    }

    pub fn from_plaintext(var_type: VarType, plaintext: Vec<u8>) -> Result<Self, SerializedError> {
        Ok(match var_type {
            VarType::String => ConfigValue::Str(plaintext),
            VarType::Bool => ConfigValue::Bool(plaintext == b"1" || plaintext == b"true"),
            VarType::Array => ConfigValue::Array(serialized::deserialize(&plaintext)?),
            VarType::AssocArray => ConfigValue::AssocArray(serialized::deserialize(&plaintext)?),
        })
    }
}

/// A value to be written under a fixed row id.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigParam {
    pub id: String,
    pub var_name: String,
    pub value: ConfigValue,
}

impl ConfigParam {
    pub fn new(id: impl Into<String>, var_name: impl Into<String>, value: ConfigValue) -> Self {
        Self {
            id: id.into(),
            var_name: var_name.into(),
            value,
        }
    }
}
