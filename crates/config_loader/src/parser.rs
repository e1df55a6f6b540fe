//! Pipeline config parsing
//!
//! TOML is the primary format, JSON is accepted for generated configs.
//! Parse errors name the line and the `[section]` of the pipeline config
//! they occurred in, so a bad query or template points at `[source]`.

use std::path::Path;

use contracts::{ContractError, PipelineBlueprint};

/// Config file format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Format of a config file, from its extension
    pub fn from_path(path: &Path) -> Result<Self, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse(format!(
                "{}: cannot tell the config format, expected a .toml or .json file",
                path.display()
            ))
        })?;

        Self::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!(
                "{}: unsupported config format .{ext}, expected .toml or .json",
                path.display()
            ))
        })
    }
}

pub fn parse_toml(content: &str) -> Result<PipelineBlueprint, ContractError> {
    toml::from_str(content).map_err(|e| {
        let location = e.span().map(|span| Location::of(content, span.start));
        let message = match location {
            Some(Location {
                line,
                section: Some(section),
            }) => format!("TOML error at line {line} in [{section}]: {}", e.message()),
            Some(Location {
                line,
                section: None,
            }) => format!("TOML error at line {line}: {}", e.message()),
            None => format!("TOML error: {}", e.message()),
        };
        ContractError::ConfigParse {
            message,
            source: Some(Box::new(e)),
        }
    })
}

pub fn parse_json(content: &str) -> Result<PipelineBlueprint, ContractError> {
    serde_json::from_str(content).map_err(|e| {
        let what = match e.classify() {
            serde_json::error::Category::Data => "invalid pipeline setting",
            serde_json::error::Category::Eof => "truncated JSON",
            _ => "malformed JSON",
        };
        ContractError::ConfigParse {
            message: format!("{what}: {e}"),
            source: Some(Box::new(e)),
        }
    })
}

pub fn parse(content: &str, format: ConfigFormat) -> Result<PipelineBlueprint, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

/// Where in a TOML document an error starts
#[derive(Debug, PartialEq, Eq)]
struct Location {
    line: usize,
    section: Option<String>,
}

impl Location {
    fn of(content: &str, offset: usize) -> Self {
        let before = content.get(..offset).unwrap_or(content);
        let line = before.matches('\n').count() + 1;
        let section = before.lines().rev().find_map(|line| {
            let header = line.trim();
            let name = header.strip_prefix('[')?.strip_suffix(']')?;
            let name = name.trim_start_matches('[').trim_end_matches(']').trim();
            (!name.is_empty()).then(|| name.to_string())
        });
        Self { line, section }
    }
}
