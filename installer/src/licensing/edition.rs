// Shop edition resolution
//
// The edition is resolved once when the installer is built and stays fixed for the run. It
// decides the shop id every config row is written under and whether serials apply.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{InstallError, Result};
use crate::models::settings::EditionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edition {
    Community,
    /// Professional build with professional features (`PE_PE`).
    ProfessionalBase,
    /// Professional build running the community feature set (`PE_CE`).
    ProfessionalCommunity,
    Enterprise,
}

impl Edition {
    /// Short code the shop uses for the edition.
    pub fn code(self) -> &'static str {
        match self {
            Edition::Enterprise => "EE",
            Edition::ProfessionalBase => "PE",
            Edition::Community | Edition::ProfessionalCommunity => "CE",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code.trim().to_ascii_uppercase().as_str() {
            "EE" => Some(Edition::Enterprise),
            "PE" => Some(Edition::ProfessionalBase),
            "CE" => Some(Edition::Community),
            _ => None,
        }
    }

    /// Shop scope for config rows.
    pub fn shop_id(self) -> &'static str {
        match self {
            Edition::Enterprise => "1",
            _ => "oxbaseshop",
        }
    }

    /// Edition number handed to serial computations.
    pub fn serial_edition_code(self) -> u8 {
        match self {
            Edition::Enterprise => 2,
            _ => 1,
        }
    }
}

impl fmt::Display for Edition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Edition::Community => "Community",
            Edition::ProfessionalBase => "Professional",
            Edition::ProfessionalCommunity => "Professional (community features)",
            Edition::Enterprise => "Enterprise",
        };
        f.write_str(name)
    }
}

pub trait EditionResolver: Send + Sync {
    fn resolve_edition(&self) -> Result<Edition>;
}

/// Resolves from the build flags the shop was packaged with.
///
/// The flags are applied in a fixed order, each set flag replacing the previous result:
/// enterprise, then professional, then community. With no flag set the result is Community.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlagEditionResolver {
    pub enterprise: bool,
    pub professional: bool,
    pub community: bool,
}

impl EditionResolver for FlagEditionResolver {
    fn resolve_edition(&self) -> Result<Edition> {
        let mut edition = Edition::Community;
        if self.enterprise {
            edition = Edition::Enterprise;
        }
        if self.professional {
            edition = Edition::ProfessionalBase;
        }
        if self.community {
            edition = Edition::ProfessionalCommunity;
        }
        Ok(edition)
    }
}

/// Resolves from `[edition]` settings: build flags when `enterprise` is present, else `code`.
pub struct SettingsEditionResolver {
    settings: EditionSettings,
}

impl SettingsEditionResolver {
    pub fn new(settings: EditionSettings) -> Self {
        Self { settings }
    }
}

impl EditionResolver for SettingsEditionResolver {
    fn resolve_edition(&self) -> Result<Edition> {
        if let Some(enterprise) = self.settings.enterprise {
            return FlagEditionResolver {
                enterprise,
                professional: self.settings.professional,
                community: self.settings.community,
            }
            .resolve_edition();
        }

        match self.settings.code.as_deref() {
            None => Ok(Edition::Community),
            Some(code) => Edition::from_code(code).ok_or_else(|| {
                InstallError::InvalidConfiguration(format!(
                    "unknown edition code '{}' (expected EE, PE or CE)",
                    code
                ))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flags(enterprise: bool, professional: bool, community: bool) -> Edition {
        FlagEditionResolver {
            enterprise,
            professional,
            community,
        }
        .resolve_edition()
        .unwrap()
    }

    #[test]
    fn flags_resolve_in_fixed_order() {
        assert_eq!(flags(false, false, false), Edition::Community);
        assert_eq!(flags(true, false, false), Edition::Enterprise);
        assert_eq!(flags(false, true, false), Edition::ProfessionalBase);
        assert_eq!(flags(false, false, true), Edition::ProfessionalCommunity);
        // later flags override earlier ones
        assert_eq!(flags(true, true, false), Edition::ProfessionalBase);
        assert_eq!(flags(true, true, true), Edition::ProfessionalCommunity);
    }

    #[test]
    fn shop_id_depends_on_enterprise_only() {
        assert_eq!(Edition::Enterprise.shop_id(), "1");
        assert_eq!(Edition::Community.shop_id(), "oxbaseshop");
        assert_eq!(Edition::ProfessionalBase.shop_id(), "oxbaseshop");
        assert_eq!(Edition::ProfessionalCommunity.shop_id(), "oxbaseshop");
    }

    #[test]
    fn serial_edition_codes() {
        assert_eq!(Edition::Enterprise.serial_edition_code(), 2);
        assert_eq!(Edition::ProfessionalBase.serial_edition_code(), 1);
    }

    #[test]
    fn settings_use_code_without_flags() {
        let resolver = SettingsEditionResolver::new(EditionSettings {
            code: Some("ee".to_string()),
            ..EditionSettings::default()
        });
        assert_eq!(resolver.resolve_edition().unwrap(), Edition::Enterprise);

        let resolver = SettingsEditionResolver::new(EditionSettings::default());
        assert_eq!(resolver.resolve_edition().unwrap(), Edition::Community);
    }

    #[test]
    fn settings_flags_take_precedence_over_code() {
        let resolver = SettingsEditionResolver::new(EditionSettings {
            enterprise: Some(true),
            professional: true,
            community: false,
            code: Some("CE".to_string()),
        });
        assert_eq!(resolver.resolve_edition().unwrap(), Edition::ProfessionalBase);
    }

    #[test]
    fn unknown_code_is_a_configuration_error() {
        let resolver = SettingsEditionResolver::new(EditionSettings {
            code: Some("XE".to_string()),
            ..EditionSettings::default()
        });
        assert!(matches!(
            resolver.resolve_edition(),
            Err(InstallError::InvalidConfiguration(_))
        ));
    }
}
