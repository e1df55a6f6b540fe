//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON configuration files
//! - Validate configuration legality
//! - Apply environment overrides for secrets
//! - Generate `PipelineBlueprint`
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let blueprint = ConfigLoader::load_from_path(Path::new("fetchpipe.toml")).unwrap();
//! println!("Workers: {}", blueprint.pipeline.workers);
//! ```

mod parser;
mod validator;

pub use contracts::PipelineBlueprint;
pub use parser::ConfigFormat;

use contracts::ContractError;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineBlueprint, ContractError> {
        let format = ConfigFormat::from_path(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load configuration from string
    ///
    /// # Errors
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        Self::parse_and_validate(content, format)
    }

    /// Fill secrets that are never written into config files
    ///
    /// `api_key_var` is read from the environment and, when set, replaces the
    /// search API key. Returns true when a key was applied.
    pub fn apply_env_overrides(blueprint: &mut PipelineBlueprint, api_key_var: &str) -> bool {
        let Ok(key) = std::env::var(api_key_var) else {
            return false;
        };
        if key.trim().is_empty() {
            return false;
        }
        match blueprint.search.as_mut() {
            Some(search) => {
                search.api_key = Some(key);
                true
            }
            None => false,
        }
    }

    /// Validate a blueprint that was changed after loading
    pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
        validator::validate(blueprint)
    }

    /// Serialize PipelineBlueprint to TOML string
    pub fn to_toml(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        toml::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize PipelineBlueprint to JSON string
    pub fn to_json(blueprint: &PipelineBlueprint) -> Result<String, ContractError> {
        serde_json::to_string_pretty(blueprint)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }
}

impl ConfigLoader {
    /// Read configuration file content
    fn read_file(path: &Path) -> Result<String, ContractError> {
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse and validate configuration content
    fn parse_and_validate(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineBlueprint, ContractError> {
        let blueprint = parser::parse(content, format)?;
        validator::validate(&blueprint)?;
        Ok(blueprint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL_TOML: &str = r#"
[pipeline]
workers = 2
inbound_capacity = 8

[fetch]
timeout_ms = 5000
max_attempts = 2

[source]
queries = ["colombo", "colombo", "matara"]

[search]
endpoint = "https://unsplash.com/napi/search/photos"

[storage]
base_dir = "images"

[[consumers]]
name = "log"
kind = "log"
"#;

    #[test]
    fn test_load_from_str_toml() {
        let result = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml);
        assert!(result.is_ok(), "Failed: {:?}", result.err());
        let bp = result.unwrap();
        assert_eq!(bp.pipeline.workers, 2);
        assert_eq!(bp.fetch.max_attempts, 2);
    }

    #[test]
    fn test_round_trip_toml() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let serialized = ConfigLoader::to_toml(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&serialized, ConfigFormat::Toml).unwrap();
        assert_eq!(bp.pipeline.workers, bp2.pipeline.workers);
        assert_eq!(bp.source.queries, bp2.source.queries);
        assert_eq!(bp.consumers[0].name, bp2.consumers[0].name);
    }

    #[test]
    fn test_round_trip_json() {
        let bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&bp).unwrap();
        let bp2 = ConfigLoader::load_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(bp.fetch.timeout_ms, bp2.fetch.timeout_ms);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let content = r#"
[pipeline]
mode = "static"

[source]
queries = ["colombo"]

[search]
endpoint = "https://unsplash.com/napi/search/photos"
"#;
        let result = ConfigLoader::load_from_str(content, ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("static mode"));
    }

    #[test]
    fn test_load_from_path_detects_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fetchpipe.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(MINIMAL_TOML.as_bytes()).unwrap();

        let bp = ConfigLoader::load_from_path(&path).unwrap();
        assert_eq!(bp.source.queries.len(), 3);

        let bad = dir.path().join("fetchpipe.yaml");
        std::fs::write(&bad, MINIMAL_TOML).unwrap();
        let err = ConfigLoader::load_from_path(&bad).unwrap_err().to_string();
        assert!(err.contains("unsupported config format"), "got: {err}");
    }

    #[test]
    fn test_apply_env_overrides() {
        let mut bp = ConfigLoader::load_from_str(MINIMAL_TOML, ConfigFormat::Toml).unwrap();
        let var = "FETCHPIPE_TEST_API_KEY_OVERRIDE";
        assert!(!ConfigLoader::apply_env_overrides(&mut bp, var));

        std::env::set_var(var, "abc123");
        assert!(ConfigLoader::apply_env_overrides(&mut bp, var));
        assert_eq!(
            bp.search.as_ref().and_then(|s| s.api_key.as_deref()),
            Some("abc123")
        );
        std::env::remove_var(var);
    }
}
