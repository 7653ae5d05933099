use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CasebridgeError;
use crate::schema::FieldSchema;

pub const DEFAULT_ICA_BASE_URL: &str = "https://ica.illumina.com";
pub const DEFAULT_PLATFORM_URL: &str = "https://platform.login.illumina.com";
pub const DEFAULT_APPLICATION_NAME: &str = "connectedinsights";

/// `casebridge.json`: endpoint URLs and optional per-deployment field-schema
/// customization. Everything here can also be supplied (and overridden) on
/// the command line.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub ica_base_url: Option<String>,
    #[serde(default)]
    pub platform_url: Option<String>,
    #[serde(default)]
    pub application_name: Option<String>,
    #[serde(default)]
    pub domain_url: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default)]
    pub fields: Option<FieldOverrides>,
}

/// Field-schema customization. Aliases are declared as `[source, canonical]`
/// pairs so declaration order is preserved.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct FieldOverrides {
    #[serde(default)]
    pub mandatory: Option<Vec<String>>,
    #[serde(default)]
    pub optional: Option<Vec<String>>,
    #[serde(default)]
    pub aliases: Option<Vec<(String, String)>>,
    #[serde(default)]
    pub ignore: Option<Vec<String>>,
    #[serde(default)]
    pub user_defined_container: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub ica_base_url: String,
    pub platform_url: String,
    pub application_name: String,
    pub domain_url: Option<String>,
    pub api_key_file: Option<String>,
    pub schema: FieldSchema,
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Resolve from an explicit path, or from `casebridge.json` when present.
    /// No config file at the default location just means defaults; an
    /// explicit path that cannot be read is an error.
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, CasebridgeError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from("casebridge.json"),
        };

        if path.is_none() && !config_path.exists() {
            return Self::resolve_config(Config::default());
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| CasebridgeError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| CasebridgeError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, CasebridgeError> {
        let defaults = FieldSchema::default_clarity();
        let schema = match config.fields {
            None => defaults,
            Some(fields) => FieldSchema::new(
                fields
                    .mandatory
                    .unwrap_or_else(|| defaults.mandatory().to_vec()),
                fields
                    .optional
                    .unwrap_or_else(|| defaults.optional().to_vec()),
                fields
                    .aliases
                    .unwrap_or_else(|| vec![("id".to_string(), "Sample_ID".to_string())]),
                fields.ignore.unwrap_or_else(|| vec!["container".to_string()]),
                fields
                    .user_defined_container
                    .unwrap_or_else(|| "userDefinedFields".to_string()),
            )?,
        };

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            ica_base_url: config
                .ica_base_url
                .unwrap_or_else(|| DEFAULT_ICA_BASE_URL.to_string()),
            platform_url: config
                .platform_url
                .unwrap_or_else(|| DEFAULT_PLATFORM_URL.to_string()),
            application_name: config
                .application_name
                .unwrap_or_else(|| DEFAULT_APPLICATION_NAME.to_string()),
            domain_url: config.domain_url,
            api_key_file: config.api_key_file,
            schema,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_resolves_to_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved.schema_version, 1);
        assert_eq!(resolved.ica_base_url, DEFAULT_ICA_BASE_URL);
        assert_eq!(resolved.application_name, DEFAULT_APPLICATION_NAME);
        assert_eq!(
            resolved.schema.mandatory(),
            ["Sample_ID", "Tumor_Type", "Case_ID"]
        );
    }

    #[test]
    fn field_overrides_build_a_custom_schema() {
        let config = Config {
            fields: Some(FieldOverrides {
                mandatory: Some(vec!["Subject_ID".to_string(), "Tumor_Type".to_string()]),
                optional: Some(vec!["Cohort".to_string()]),
                aliases: Some(vec![("id".to_string(), "Subject_ID".to_string())]),
                ignore: None,
                user_defined_container: None,
            }),
            ..Config::default()
        };

        let resolved = ConfigLoader::resolve_config(config).unwrap();
        assert_eq!(resolved.schema.mandatory(), ["Subject_ID", "Tumor_Type"]);
        assert_eq!(resolved.schema.optional(), ["Cohort"]);
    }

    #[test]
    fn conflicting_overrides_are_rejected() {
        let config = Config {
            fields: Some(FieldOverrides {
                mandatory: Some(vec!["Sample_ID".to_string()]),
                optional: Some(vec!["Sample_ID".to_string()]),
                ..FieldOverrides::default()
            }),
            ..Config::default()
        };

        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, CasebridgeError::SchemaConflict(_));
    }
}
