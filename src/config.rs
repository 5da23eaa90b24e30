//! Configuration for the model engine
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (models.toml)
//! - Environment variables (MODELS__*)
//!
//! ## Example config file (models.toml):
//! ```toml
//! [defaults]
//! strict = false
//! extra = "ignore"
//! coercion = "safe"
//! case_sensitive = true
//! error_format = "detailed"
//!
//! [render]
//! ref_mode = "reference"
//! provider = "restricted"
//!
//! [providers.restricted]
//! max_union_variants = 4
//! unsupported_formats = ["uri", "ipv4"]
//! max_depth = 5
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Result, SchemaError};
use crate::resolve::{ProviderProfile, RefMode, ResolveOptions};
use crate::schema::ModelConfig;

/// Main configuration for the engine and its CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Applied to schemas loaded from files that carry no config of their own
    #[serde(default)]
    pub defaults: ModelConfig,

    /// Document rendering settings
    #[serde(default)]
    pub render: RenderConfig,

    /// Named consumer profiles
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderProfile>,
}

/// Rendering configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    #[serde(default)]
    pub ref_mode: RefMode,

    /// Name of an entry in `providers`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl EngineConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["models.toml", ".models.toml", "config/models.toml"];
        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "models") {
            let xdg_config = config_dir.config_dir().join("models.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("MODELS")
                .separator("__")
                .try_parsing(true),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.check()?;
        Ok(config)
    }

    /// Reject inconsistent settings
    pub fn check(&self) -> Result<()> {
        self.defaults.check()?;
        if let Some(name) = &self.render.provider {
            if !self.providers.contains_key(name) {
                return Err(SchemaError::InvalidConfig(format!(
                    "render.provider '{}' is not defined under [providers]",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Look up a provider profile by name
    pub fn provider(&self, name: &str) -> Option<ProviderProfile> {
        self.providers.get(name).map(|p| ProviderProfile {
            name: name.to_string(),
            ..p.clone()
        })
    }

    /// Rendering options; `provider` overrides `render.provider`
    pub fn resolve_options(&self, provider: Option<&str>) -> Result<ResolveOptions> {
        let mut options = ResolveOptions {
            ref_mode: self.render.ref_mode,
            provider: None,
        };
        if let Some(name) = provider.or(self.render.provider.as_deref()) {
            let profile = self.provider(name).ok_or_else(|| {
                SchemaError::InvalidConfig(format!("unknown provider profile '{}'", name))
            })?;
            options.provider = Some(profile);
        }
        Ok(options)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::CoercionPolicy;
    use crate::report::ErrorFormat;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert!(!config.defaults.strict);
        assert!(config.defaults.case_sensitive);
        assert_eq!(config.render.ref_mode, RefMode::Reference);
    }

    #[test]
    fn test_serialize_config() {
        let config = EngineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[defaults]"));
        assert!(toml_str.contains("[render]"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[defaults]
coercion = "safe"
error_format = "simple"

[render]
provider = "restricted"

[providers.restricted]
max_union_variants = 2
unsupported_formats = ["uri"]
"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap().to_string();
        let config = EngineConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.defaults.coercion, CoercionPolicy::Safe);
        assert_eq!(config.defaults.error_format, ErrorFormat::Simple);

        let options = config.resolve_options(None).unwrap();
        let provider = options.provider.unwrap();
        assert_eq!(provider.name, "restricted");
        assert_eq!(provider.max_union_variants, Some(2));
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let config = EngineConfig::default();
        assert!(config.resolve_options(Some("missing")).is_err());
    }
}
